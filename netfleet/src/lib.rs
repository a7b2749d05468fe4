//! # Netfleet
//!
//! Async fleet automation toolkit for heterogeneous network devices.
//!
//! Netfleet dispatches tasks across a fleet of Cisco IOS, Juniper JunOS,
//! MikroTik RouterOS and Qtech devices, parses their raw CLI output into
//! structured records, and plans idempotent RouterOS firmware updates.
//!
//! ## Features
//!
//! - Bounded concurrent fan-out with per-host timeouts and failure isolation
//! - Declarative output templates (named value patterns over a state machine)
//! - Uniform task contract per dialect behind [`executor::DialectExecutor`]
//! - Hostname-keyed record merging into per-device summary views
//! - Hash-gated package cache and a per-device firmware update planner
//! - Scoped file transfers and timestamped config backups
//!
//! The wire mechanics stay behind the [`transport::CommandRunner`] and
//! [`transfer::FileTransport`] capability traits; netfleet never opens a
//! socket itself. Logging goes through the `log` facade, the subscriber is
//! the caller's to set up.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netfleet::executor::{DialectExecutor, RouterOsExecutor};
//! use netfleet::inventory::{Credentials, Device, Dialect, FlagStore};
//! use netfleet::template::TemplateRegistry;
//! # use netfleet::transport::CommandRunner;
//! # fn ssh_runner() -> Arc<dyn CommandRunner> { unimplemented!() }
//!
//! # async fn run() -> Result<(), netfleet::Error> {
//! let fleet = vec![Device::new(
//!     "gw-1",
//!     "10.20.0.1",
//!     Dialect::RouterOs,
//!     Credentials::new("admin", "secret"),
//! )];
//!
//! let executor = RouterOsExecutor::new(
//!     ssh_runner(),
//!     Arc::new(TemplateRegistry::builtin()),
//!     FlagStore::new(),
//! );
//! for record in executor.get_info(&fleet).await? {
//!     println!("{}: {:?}", record.hostname, record.str_field("version"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod record;
pub mod template;
pub mod transfer;
pub mod transport;
pub mod update;
pub mod workflow;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use executor::{DialectExecutor, FanOut, Payload, TaskOutcome, UserOptions};
pub use inventory::{Credentials, Device, Dialect, FlagStore, HostFlags, Inventory};
pub use record::{merge_by_hostname, InfoRecord, PackageRecord, SummaryRecord, UserRecord};
pub use template::{Template, TemplateRegistry};
pub use transfer::{FileTransport, TransferGateway};
pub use transport::{CommandResult, CommandRunner};
pub use update::{FirmwareVersion, PackageCache, UpdatePlanner, UpdateState};
