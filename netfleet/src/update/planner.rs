//! Per-device firmware update state machine.

use log::{info, warn};

use crate::inventory::{Device, FlagStore};
use crate::record::SummaryRecord;
use crate::transfer::TransferGateway;

use super::{ChecksumMap, FirmwareVersion, PackageCache, PackageFetcher};

/// Free memory a device must retain after receiving its packages, in bytes.
pub const FREE_MEMORY_LIMIT: u64 = 50 * 1024 * 1024;

/// Terminal state of one device's pass through the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    /// Installed version already equals the target.
    UpToDate,

    /// Transfer would leave less than the free-memory margin; device left
    /// untouched and flagged for manual handling.
    MemoryInsufficient { needed: u64, free: u64 },

    /// Packages pushed; per-file failures already logged. There is no
    /// aggregate success record beyond these counts.
    Transferred { pushed: usize, failed: usize },

    /// The device could not be processed at all this pass.
    Aborted { reason: String },
}

/// Drives devices from a version check through download gating, memory sizing
/// and package transfer. One planner per invocation; the cache directory it
/// writes is not safe for concurrent invocations.
pub struct UpdatePlanner {
    cache: PackageCache,
    target: FirmwareVersion,
    memory_margin: u64,
}

impl UpdatePlanner {
    pub fn new(cache: PackageCache, target: FirmwareVersion) -> Self {
        Self {
            cache,
            target,
            memory_margin: FREE_MEMORY_LIMIT,
        }
    }

    /// Override the free-memory margin (bytes).
    pub fn with_memory_margin(mut self, margin: u64) -> Self {
        self.memory_margin = margin;
        self
    }

    fn abort(&self, flags: &FlagStore, hostname: &str, reason: impl Into<String>) -> UpdateState {
        let reason = reason.into();
        warn!("Skipping {hostname}: {reason}");
        flags.set_error(hostname, true);
        UpdateState::Aborted { reason }
    }

    /// Run one device through the state machine.
    ///
    /// The summary must carry the device's `version`, `arch`, `freememory`
    /// and package fields (the merged info + package view). Every early exit
    /// leaves the device untouched.
    pub async fn process_device(
        &self,
        device: &Device,
        summary: &SummaryRecord,
        checksums: &ChecksumMap,
        fetcher: &dyn PackageFetcher,
        gateway: &TransferGateway,
        flags: &FlagStore,
    ) -> UpdateState {
        let hostname = &device.hostname;

        let current: FirmwareVersion = match summary
            .str_field("version")
            .map(str::parse)
        {
            Some(Ok(version)) => version,
            Some(Err(e)) => return self.abort(flags, hostname, e.to_string()),
            None => return self.abort(flags, hostname, "no version in summary"),
        };
        if current == self.target {
            info!("{hostname} already at {current}");
            return UpdateState::UpToDate;
        }

        let Some(arch) = summary.str_field("arch") else {
            return self.abort(flags, hostname, "no architecture in summary");
        };

        let bundle_name = PackageCache::bundle_name(self.target, arch);
        let Some(expected_md5) = checksums.get(&bundle_name) else {
            return self.abort(
                flags,
                hostname,
                format!("no upstream digest for {bundle_name}"),
            );
        };
        match self
            .cache
            .ensure_bundle(self.target, arch, expected_md5, fetcher)
            .await
        {
            Ok(Some(bundle)) => {
                if let Err(e) = self.cache.unpack_bundle(&bundle) {
                    return self.abort(flags, hostname, format!("unpack failed: {e}"));
                }
            }
            Ok(None) => {}
            Err(e) => return self.abort(flags, hostname, format!("download failed: {e}")),
        }

        let packages = summary.package_names();
        if packages.is_empty() {
            return self.abort(flags, hostname, "no package inventory in summary");
        }
        let paths = self.cache.package_paths(&packages, self.target, arch);
        let needed = match PackageCache::total_size(&paths) {
            Ok(total) => total,
            Err(e) => return self.abort(flags, hostname, format!("missing package file: {e}")),
        };

        let Some(free) = summary.free_memory_bytes() else {
            return self.abort(flags, hostname, "no free-memory figure in summary");
        };
        // Strict: a device landing exactly on the margin is not updated.
        if free.saturating_sub(needed) <= self.memory_margin {
            warn!(
                "{hostname}: {needed} bytes needed would leave under the {} byte margin (free {free})",
                self.memory_margin
            );
            flags.set_error(hostname, true);
            return UpdateState::MemoryInsufficient { needed, free };
        }

        let files: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let remote = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (path, remote)
            })
            .collect();
        let reports = gateway.push_files(device, &files).await;
        let pushed = reports.iter().filter(|r| r.ok).count();
        let failed = reports.len() - pushed;
        info!("{hostname}: pushed {pushed} package(s), {failed} failed");
        UpdateState::Transferred { pushed, failed }
    }
}
