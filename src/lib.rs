//! A pure Rust SCSI ALUA target port group subsystem
//!
//! This library implements the Asymmetric Logical Unit Access core of a
//! target-mode storage stack: a registry of target port groups, per-device
//! access state tracking, and byte-exact construction of the REPORT TARGET
//! GROUPS response a SCSI initiator expects. Management layers (sysfs-style
//! attribute trees, CLIs) drive it through the [`AluaRegistry`] entry
//! points; command dispatch hands REPORT TARGET GROUPS CDBs to
//! [`handle_report_target_groups`].
//!
//! # Example
//!
//! ```
//! use alua_target::{AluaRegistry, AluaState, CancelToken};
//!
//! # fn main() -> Result<(), alua_target::AluaError> {
//! let registry = AluaRegistry::new();
//! let cancel = CancelToken::new();
//!
//! // Two controllers, one target port group each
//! registry.create_group_with_id("controller_a", 0x0001, &cancel)?;
//! registry.create_group_with_id("controller_b", 0x0002, &cancel)?;
//! registry.add_target("controller_a", "iqn.2025-12.local:ctrl-a.p1", 0x0101)?;
//! registry.add_target("controller_b", "iqn.2025-12.local:ctrl-b.p1", 0x0201)?;
//!
//! // disk1 is optimized behind controller A, degraded behind B
//! registry.add_device_state("controller_a", "disk1", AluaState::ActiveOptimized)?;
//! registry.add_device_state("controller_b", "disk1", AluaState::ActiveNonOptimized)?;
//!
//! // Two descriptors of one port each: 4 + 2 * (8 + 4) bytes
//! let response = registry.report_target_groups("disk1", 0)?;
//! assert_eq!(response.len(), 28);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod group;
pub mod registry;
pub mod report;
pub mod state;

pub use error::{AluaError, AluaResult};
pub use group::{TargetGroupInfo, TgDev, TgTarget};
pub use registry::{AluaRegistry, CancelToken};
pub use report::handle_report_target_groups;
pub use state::AluaState;

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
