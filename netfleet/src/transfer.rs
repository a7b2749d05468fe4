//! Scoped file transfer gateway.
//!
//! File movement to and from devices goes through an opaque `FileTransport`
//! capability (the SCP mechanics live behind it). The gateway guarantees the
//! session is closed whatever the operation did, and turns per-file failures
//! into log lines instead of batch aborts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::TransferError;
use crate::inventory::Device;

/// One open file-movement session against a device.
#[async_trait]
pub trait TransferSession: Send {
    /// Copy a remote file to a local path.
    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), TransferError>;

    /// Copy a local file to a remote path.
    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), TransferError>;

    /// Tear the session down. Errors here are logged, never surfaced.
    async fn close(&mut self) -> Result<(), TransferError>;
}

/// Capability: open transfer sessions against devices.
#[async_trait]
pub trait FileTransport: Send + Sync {
    async fn open(&self, device: &Device) -> Result<Box<dyn TransferSession>, TransferError>;
}

/// Outcome of one file operation, kept for logging only.
#[derive(Debug)]
pub struct TransferReport {
    pub path: PathBuf,
    pub ok: bool,
}

/// Session-scoping wrapper over a `FileTransport`.
///
/// Every operation opens a session, runs, and closes the session even when the
/// operation failed. Failures are logged and reported, never propagated as
/// errors to the caller.
pub struct TransferGateway {
    transport: Arc<dyn FileTransport>,
}

impl TransferGateway {
    pub fn new(transport: Arc<dyn FileTransport>) -> Self {
        Self { transport }
    }

    async fn close_quietly(device: &Device, session: &mut Box<dyn TransferSession>) {
        if let Err(e) = session.close().await {
            warn!("Failed to close transfer session to {}: {e}", device.hostname);
        }
    }

    /// Fetch one remote file. Returns whether the fetch succeeded.
    pub async fn fetch_file(&self, device: &Device, remote: &str, local: &Path) -> bool {
        let mut session = match self.transport.open(device).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open transfer session to {}: {e}", device.hostname);
                return false;
            }
        };
        let ok = match session.get(remote, local).await {
            Ok(()) => {
                debug!("Fetched {remote} from {}", device.hostname);
                true
            }
            Err(e) => {
                warn!("Failed to fetch {remote} from {}: {e}", device.hostname);
                false
            }
        };
        Self::close_quietly(device, &mut session).await;
        ok
    }

    /// Push one local file. Returns whether the push succeeded.
    pub async fn push_file(&self, device: &Device, local: &Path, remote: &str) -> bool {
        let reports = self.push_files(device, &[(local.to_path_buf(), remote.to_string())]).await;
        reports.first().is_some_and(|r| r.ok)
    }

    /// Push a batch of files over one session. A failed file is logged and the
    /// rest continue; the per-file reports exist for the caller's log only.
    pub async fn push_files(
        &self,
        device: &Device,
        files: &[(PathBuf, String)],
    ) -> Vec<TransferReport> {
        let mut session = match self.transport.open(device).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open transfer session to {}: {e}", device.hostname);
                return files
                    .iter()
                    .map(|(local, _)| TransferReport {
                        path: local.clone(),
                        ok: false,
                    })
                    .collect();
            }
        };

        let mut reports = Vec::with_capacity(files.len());
        for (local, remote) in files {
            let ok = match session.put(local, remote).await {
                Ok(()) => {
                    debug!("Pushed {} to {}:{remote}", local.display(), device.hostname);
                    true
                }
                Err(e) => {
                    warn!(
                        "Failed to push {} to {}: {e}",
                        local.display(),
                        device.hostname
                    );
                    false
                }
            };
            reports.push(TransferReport {
                path: local.clone(),
                ok,
            });
        }
        Self::close_quietly(device, &mut session).await;
        reports
    }
}
