//! vcbox - provision virtual machines by cloning templates.
//!
//! The core resolves placement in a virtualization inventory, prepares
//! template disks for linked cloning, builds the clone request with guest
//! customization, runs the clone, and later resolves the guest's address for
//! remote access.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vcbox::inventory::SimulatedInventory;
//! use vcbox::options::ProviderOptions;
//! use vcbox::Provisioner;
//!
//! # tokio_test_block(async {
//! let inventory = SimulatedInventory::builder()
//!     .datacenter("DC1")
//!     .compute_resource("Cluster1")
//!     .template("base", 1)
//!     .build();
//!
//! let options = ProviderOptions::builder()
//!     .datacenter("DC1")
//!     .compute_resource("Cluster1")
//!     .build();
//! let request = options.to_request("web01", "base", Vec::new()).unwrap();
//!
//! let outcome = Provisioner::new(Arc::new(inventory))
//!     .provision(&request)
//!     .await
//!     .unwrap();
//! assert!(!outcome.uuid.as_str().is_empty());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod guest;
pub mod inventory;
pub mod options;
pub mod provision;
pub mod spec;
pub mod types;
pub mod util;

pub use guest::{GuestAddressResolver, PrimaryInterface};
pub use inventory::{Inventory, InventoryHandle, SimulatedInventory};
pub use options::{ProviderOptions, ProviderOptionsBuilder};
pub use provision::{ProvisioningPlan, Provisioner};
pub use spec::{CloneSpec, CloneSpecBuilder};
pub use types::{
    AdapterKind, CloneMode, CloneOutcome, CustomizationRequest, MachineUuid, NetworkAssignment,
    NetworkAttachment, ProvisioningRequest, SshInfo,
};
pub use vcbox_shared::errors::{VcboxError, VcboxResult};
