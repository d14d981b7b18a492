//! Platform constants shared by host-side crates.

/// Naming of provisioned machines.
pub mod naming {
    /// Prefix of auto-generated machine names.
    pub const AUTO_NAME_PREFIX: &str = "Vagrant";

    /// Random bytes in the auto-name suffix (rendered as 8 hex chars).
    pub const SUFFIX_BYTES: usize = 4;
}

/// Guest customization defaults.
pub mod customization {
    /// Full name and organization written into Windows sysprep user data.
    pub const SYSPREP_OWNER: &str = "Vagrant";

    /// Sysprep time zone index (Pacific Standard Time).
    pub const SYSPREP_TIME_ZONE: i32 = 4;
}

/// Virtual NIC defaults.
pub mod nic {
    /// Network type value that selects distributed switch port binding.
    pub const DISTRIBUTED_PORT_TYPE: &str = "DistributedVirtualSwitchPort";

    /// Device key for newly added devices (platform assigns the real one).
    pub const NEW_DEVICE_KEY: i32 = 0;
}

/// Remote access defaults.
pub mod ssh {
    pub const PORT: u16 = 22;
}

/// Environment variables read by the host tools.
pub mod envs {
    pub const USER: &str = "USER";
    pub const LOGNAME: &str = "LOGNAME";
}
