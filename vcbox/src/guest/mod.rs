//! Guest-side state of provisioned machines.

pub mod address;

pub use address::{GuestAddressResolver, PrimaryInterface, resolve_address};
