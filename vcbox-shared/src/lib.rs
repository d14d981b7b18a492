//! vcbox shared code
//!
//! Error types and platform constants used by the provisioning core,
//! the CLI, and the test utilities.

pub mod constants;
pub mod errors;

pub use errors::{VcboxError, VcboxResult};
