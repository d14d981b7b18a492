pub mod plan;
pub mod ssh_info;
pub mod up;
