//! Target machine naming.

use rand::RngCore;
use vcbox_shared::constants::{envs, naming};

/// Who is provisioning, and from where. Part of auto-generated names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamingContext {
    pub invoking_user: String,
    pub local_hostname: String,
}

impl NamingContext {
    pub fn new(invoking_user: impl Into<String>, local_hostname: impl Into<String>) -> Self {
        Self {
            invoking_user: invoking_user.into(),
            local_hostname: local_hostname.into(),
        }
    }

    /// Read the login name and hostname of the current process.
    pub fn from_environment() -> Self {
        Self::new(current_user(), current_hostname())
    }
}

fn current_user() -> String {
    [envs::USER, envs::LOGNAME]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .or_else(|| {
            nix::unistd::User::from_uid(nix::unistd::getuid())
                .ok()
                .flatten()
                .map(|u| u.name)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn current_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read hostname");
            "localhost".to_string()
        }
    }
}

/// Random hex suffix, two characters per byte.
pub fn random_suffix() -> String {
    let mut bytes = [0u8; naming::SUFFIX_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Name the clone is created under.
///
/// With auto-naming off this is `machine_name` verbatim. Otherwise it is
/// `Vagrant-<user>-<machine>-<hostname>-<suffix>` with a lowercased hostname
/// and a fresh random suffix, so concurrent runs never collide.
pub fn target_name(context: &NamingContext, machine_name: &str, auto_name: bool) -> String {
    if !auto_name {
        return machine_name.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        naming::AUTO_NAME_PREFIX,
        context.invoking_user,
        machine_name,
        context.local_hostname.to_lowercase(),
        random_suffix()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim_without_auto_name() {
        let ctx = NamingContext::new("alice", "Build-Host");
        assert_eq!(target_name(&ctx, "web01", false), "web01");
    }

    #[test]
    fn test_auto_name_format() {
        let ctx = NamingContext::new("alice", "Build-Host");
        let name = target_name(&ctx, "web01", true);

        let prefix = "Vagrant-alice-web01-build-host-";
        assert!(name.starts_with(prefix), "unexpected name {}", name);
        let suffix = &name[prefix.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_environment_context_is_populated() {
        let ctx = NamingContext::from_environment();
        assert!(!ctx.invoking_user.is_empty());
        assert!(!ctx.local_hostname.is_empty());
    }
}
