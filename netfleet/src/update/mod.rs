//! RouterOS firmware update planning.
//!
//! A per-device state machine drives each router from a version check through
//! download gating, memory sizing and package transfer. The package cache and
//! its checksum state are single-writer: one process, one invocation at a
//! time, no file locking.

mod cache;
mod checksum;
mod planner;
mod version;

pub use cache::{HttpFetcher, PackageCache, PackageFetcher};
pub use checksum::{fetch_checksums, parse_checksum_page, ChecksumMap};
pub use planner::{UpdatePlanner, UpdateState, FREE_MEMORY_LIMIT};
pub use version::FirmwareVersion;
