//! Placement resolution: datacenter, compute resource, pool, folder, template.

use vcbox_shared::errors::{VcboxError, VcboxResult};

use crate::inventory::{ComputeResource, Inventory, InventoryHandle};
use crate::types::PlacementNames;

/// Where a clone comes from and where it lands.
#[derive(Clone, Debug)]
pub struct Placement {
    pub datacenter: InventoryHandle,
    pub compute_resource: ComputeResource,
    pub pool: InventoryHandle,
    pub template: InventoryHandle,
    /// Search path the template was found under.
    pub template_path: String,
}

/// Result of create-or-get on the destination folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderOutcome {
    /// This run created the folder.
    Created(InventoryHandle),
    /// The folder was already there, or another run created it first.
    Existing(InventoryHandle),
}

impl FolderOutcome {
    pub fn handle(&self) -> &InventoryHandle {
        match self {
            FolderOutcome::Created(h) | FolderOutcome::Existing(h) => h,
        }
    }

    pub fn into_handle(self) -> InventoryHandle {
        match self {
            FolderOutcome::Created(h) | FolderOutcome::Existing(h) => h,
        }
    }
}

/// Template name for a box identifier: `org/base` becomes `org-base`.
pub fn template_name(box_name: &str) -> String {
    box_name.replace('/', "-")
}

/// Inventory path the template is searched under.
pub fn template_path(template_folder: Option<&str>, box_name: &str) -> String {
    let name = template_name(box_name);
    match template_folder {
        Some(folder) if !folder.is_empty() => format!("{}/{}", folder.trim_end_matches('/'), name),
        _ => name,
    }
}

/// Resolves placement names to handles. Nothing is cached between calls.
pub struct PlacementResolver<'a> {
    inventory: &'a dyn Inventory,
}

impl<'a> PlacementResolver<'a> {
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self { inventory }
    }

    /// Resolve everything except the destination folder.
    pub async fn resolve(&self, names: &PlacementNames, box_name: &str) -> VcboxResult<Placement> {
        let datacenter = self.datacenter(&names.datacenter).await?;
        let compute_resource = self
            .compute_resource(&datacenter, &names.compute_resource)
            .await?;
        let pool = self
            .resource_pool(&compute_resource, names.resource_pool.as_deref())
            .await?;

        let template_path = template_path(names.template_folder.as_deref(), box_name);
        let template = self
            .inventory
            .find_vm(&datacenter, &template_path)
            .await?
            .ok_or_else(|| VcboxError::NotFound(format!("template '{}'", template_path)))?;

        tracing::debug!(
            datacenter = %datacenter,
            pool = %pool,
            template = %template_path,
            "Resolved placement"
        );

        Ok(Placement {
            datacenter,
            compute_resource,
            pool,
            template,
            template_path,
        })
    }

    pub async fn datacenter(&self, name: &str) -> VcboxResult<InventoryHandle> {
        self.inventory
            .find_datacenter(name)
            .await?
            .ok_or_else(|| VcboxError::NotFound(format!("datacenter '{}'", name)))
    }

    pub async fn compute_resource(
        &self,
        datacenter: &InventoryHandle,
        name: &str,
    ) -> VcboxResult<ComputeResource> {
        self.inventory
            .find_compute_resource(datacenter, name)
            .await?
            .ok_or_else(|| {
                VcboxError::NotFound(format!("compute resource '{}' in {}", name, datacenter))
            })
    }

    /// Named child of the root pool, or the root pool itself.
    pub async fn resource_pool(
        &self,
        compute_resource: &ComputeResource,
        name: Option<&str>,
    ) -> VcboxResult<InventoryHandle> {
        let Some(name) = name else {
            return Ok(compute_resource.root_pool.clone());
        };
        self.inventory
            .child_resource_pools(&compute_resource.root_pool)
            .await?
            .into_iter()
            .find(|pool| pool.name() == name)
            .ok_or_else(|| {
                VcboxError::NotFound(format!(
                    "resource pool '{}' in {}",
                    name, compute_resource.handle
                ))
            })
    }

    /// Destination folder, created when named and absent.
    ///
    /// Without a path the datacenter's root VM folder is used.
    pub async fn folder(
        &self,
        datacenter: &InventoryHandle,
        path: Option<&str>,
    ) -> VcboxResult<FolderOutcome> {
        let root = self.inventory.root_vm_folder(datacenter).await?;
        match path {
            Some(path) if !path.trim_matches('/').is_empty() => {
                self.create_or_get_folder(&root, path).await
            }
            _ => Ok(FolderOutcome::Existing(root)),
        }
    }

    async fn create_or_get_folder(
        &self,
        root: &InventoryHandle,
        path: &str,
    ) -> VcboxResult<FolderOutcome> {
        if let Some(existing) = self.inventory.find_folder(root, path).await? {
            return Ok(FolderOutcome::Existing(existing));
        }

        match self.inventory.create_folder(root, path).await {
            Ok(created) => {
                tracing::info!(folder = %path, "Created destination folder");
                Ok(FolderOutcome::Created(created))
            }
            Err(e) if e.is_already_exists() => {
                // Lost the race to another run. The winner's folder is taken
                // as-is; its type and creator are not checked.
                tracing::debug!(folder = %path, "Folder created concurrently, looking it up");
                self.inventory
                    .find_folder(root, path)
                    .await?
                    .map(FolderOutcome::Existing)
                    .ok_or_else(|| VcboxError::NotFound(format!("folder '{}'", path)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Fault, SimulatedInventory};

    fn inventory() -> SimulatedInventory {
        SimulatedInventory::builder()
            .datacenter("DC1")
            .compute_resource("Cluster1")
            .resource_pool("Pool1")
            .folder("templates")
            .template("templates/org-base", 1)
            .build()
    }

    fn names() -> PlacementNames {
        PlacementNames {
            datacenter: "DC1".into(),
            compute_resource: "Cluster1".into(),
            template_folder: Some("templates".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_template_path() {
        assert_eq!(template_name("org/base"), "org-base");
        assert_eq!(template_path(None, "org/base"), "org-base");
        assert_eq!(template_path(Some("templates"), "base"), "templates/base");
        assert_eq!(template_path(Some("templates/"), "a/b/c"), "templates/a-b-c");
        assert_eq!(template_path(Some(""), "base"), "base");
    }

    #[tokio::test]
    async fn test_resolve_defaults_to_root_pool() {
        let inv = inventory();
        let placement = PlacementResolver::new(&inv)
            .resolve(&names(), "org/base")
            .await
            .unwrap();
        assert_eq!(placement.pool, placement.compute_resource.root_pool);
        assert_eq!(placement.template_path, "templates/org-base");
        assert_eq!(placement.template.name(), "org-base");
    }

    #[tokio::test]
    async fn test_resolve_named_pool() {
        let inv = inventory();
        let mut names = names();
        names.resource_pool = Some("Pool1".into());
        let placement = PlacementResolver::new(&inv)
            .resolve(&names, "org/base")
            .await
            .unwrap();
        assert_eq!(placement.pool.name(), "Pool1");
    }

    #[tokio::test]
    async fn test_missing_entities_name_themselves() {
        let inv = inventory();
        let resolver = PlacementResolver::new(&inv);

        let mut bad = names();
        bad.datacenter = "DC9".into();
        let err = resolver.resolve(&bad, "org/base").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("DC9"));

        let mut bad = names();
        bad.compute_resource = "Cluster9".into();
        let err = resolver.resolve(&bad, "org/base").await.unwrap_err();
        assert!(err.to_string().contains("Cluster9"));

        let mut bad = names();
        bad.resource_pool = Some("Pool9".into());
        let err = resolver.resolve(&bad, "org/base").await.unwrap_err();
        assert!(err.to_string().contains("Pool9"));

        let err = resolver.resolve(&names(), "other").await.unwrap_err();
        assert!(err.to_string().contains("templates/other"));
    }

    #[tokio::test]
    async fn test_folder_created_then_reused() {
        let inv = inventory();
        let resolver = PlacementResolver::new(&inv);
        let dc = resolver.datacenter("DC1").await.unwrap();

        let first = resolver.folder(&dc, Some("vagrant")).await.unwrap();
        assert!(matches!(first, FolderOutcome::Created(_)));
        let second = resolver.folder(&dc, Some("vagrant")).await.unwrap();
        assert_eq!(second, FolderOutcome::Existing(first.into_handle()));
    }

    #[tokio::test]
    async fn test_folder_none_is_root() {
        let inv = inventory();
        let resolver = PlacementResolver::new(&inv);
        let dc = resolver.datacenter("DC1").await.unwrap();
        let outcome = resolver.folder(&dc, None).await.unwrap();
        assert_eq!(outcome.handle().name(), "vm");
    }

    #[tokio::test]
    async fn test_folder_race_falls_back_to_lookup() {
        let inv = inventory();
        inv.inject_fault(Fault::FolderCreateRace);
        let resolver = PlacementResolver::new(&inv);
        let dc = resolver.datacenter("DC1").await.unwrap();

        let outcome = resolver.folder(&dc, Some("raced")).await.unwrap();
        assert!(matches!(outcome, FolderOutcome::Existing(_)));
        assert_eq!(outcome.handle().name(), "raced");
    }
}
