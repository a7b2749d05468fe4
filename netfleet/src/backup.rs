//! Configuration backups.
//!
//! Text-config dialects dump their running configuration to a timestamped
//! `.cfg` file; RouterOS additionally produces a binary `.backup` and a
//! plain-text export fetched through the transfer gateway. Per-host failures
//! flag the host and never abort the batch.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use md5::{Digest, Md5};

use crate::error::Result;
use crate::executor::{FanOut, Payload};
use crate::inventory::{Device, Dialect, FlagStore};
use crate::transfer::TransferGateway;

const DUMP_TIMEOUT: Duration = Duration::from_secs(120);

/// Scheduler-made backup artifacts on the device side.
const ROUTEROS_BACKUP_NAME: &str = "autosave";
const ROUTEROS_EXPORT_NAME: &str = "autoexport";

/// Command that dumps the full text configuration, per dialect. RouterOS has
/// no single text dump; it goes through [`backup_routeros_configs`].
pub fn text_config_command(dialect: Dialect) -> Option<&'static str> {
    match dialect {
        Dialect::Ios => Some("show running-config"),
        Dialect::Junos => Some("show configuration"),
        Dialect::Qtech => Some("show run"),
        Dialect::RouterOs => None,
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d_%H%M%S").to_string()
}

fn backup_path(dir: &Path, hostname: &str, stamp: &str, extension: &str) -> PathBuf {
    dir.join(format!("{hostname}_{stamp}.{extension}"))
}

/// Dump each host's text configuration into `dir` as `<host>_<ts>.cfg`.
///
/// Returns the files written. Hosts that fail the dump or the write are
/// flagged and skipped.
pub async fn backup_text_configs(
    engine: &FanOut,
    hosts: &[Device],
    command: &str,
    dir: &Path,
    flags: &FlagStore,
) -> Vec<PathBuf> {
    let stamp = timestamp();
    let results = engine
        .run(hosts, Payload::Command(command.to_string()), DUMP_TIMEOUT)
        .await;

    let mut written = Vec::new();
    for result in results {
        if result.failed {
            warn!(
                "Config dump failed on {}: {}",
                result.host,
                result.error.as_deref().unwrap_or("command failed")
            );
            flags.set_error(&result.host, true);
            continue;
        }
        let path = backup_path(dir, &result.host, &stamp, "cfg");
        match tokio::fs::write(&path, &result.output).await {
            Ok(()) => {
                info!("Saved config of {} to {}", result.host, path.display());
                written.push(path);
            }
            Err(e) => {
                warn!("Failed to write {}: {e}", path.display());
                flags.set_error(&result.host, true);
            }
        }
    }
    written
}

/// RouterOS backup pass: a binary `.backup` plus a text export per host.
///
/// The device first writes both artifacts locally (`system backup save`,
/// `export compact`), then each is fetched through the gateway. Any failing
/// step flags the host; the other artifact and the other hosts continue.
pub async fn backup_routeros_configs(
    engine: &FanOut,
    gateway: &TransferGateway,
    hosts: &[Device],
    dir: &Path,
    flags: &FlagStore,
) -> Vec<PathBuf> {
    let stamp = timestamp();
    let prepare = vec![
        format!("system backup save dont-encrypt=yes name={ROUTEROS_BACKUP_NAME}"),
        format!("export compact file={ROUTEROS_EXPORT_NAME}"),
    ];
    let results = engine
        .run(hosts, Payload::Config(prepare), DUMP_TIMEOUT)
        .await;

    let mut written = Vec::new();
    for result in results {
        if result.failed {
            warn!(
                "Backup preparation failed on {}: {}",
                result.host,
                result.error.as_deref().unwrap_or("command failed")
            );
            flags.set_error(&result.host, true);
            continue;
        }
        let Some(device) = hosts.iter().find(|d| d.hostname == result.host) else {
            continue;
        };

        let fetches = [
            (format!("{ROUTEROS_BACKUP_NAME}.backup"), "backup"),
            (format!("{ROUTEROS_EXPORT_NAME}.rsc"), "cfg"),
        ];
        for (remote, extension) in fetches {
            let path = backup_path(dir, &result.host, &stamp, extension);
            if gateway.fetch_file(device, &remote, &path).await {
                info!("Saved {remote} of {} to {}", result.host, path.display());
                written.push(path);
            } else {
                flags.set_error(&result.host, true);
            }
        }
    }
    written
}

/// Remove duplicate backups from `dir`, keeping the first of each set.
///
/// Text exports (`.cfg`, `.rsc`) are hashed with `#`-prefixed lines skipped,
/// so two exports differing only in the generated header comment count as the
/// same backup. Every other file is hashed byte for byte. Files scan in name
/// order; an unreadable file is logged and left alone. Returns the removed
/// paths.
pub fn dedupe_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut removed = Vec::new();
    for path in files {
        let digest = match backup_digest(&path) {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Failed to hash {}: {e}", path.display());
                continue;
            }
        };
        if let Some(kept) = seen.get(&digest) {
            info!(
                "Removing {} (duplicate of {})",
                path.display(),
                kept.display()
            );
            fs::remove_file(&path)?;
            removed.push(path);
        } else {
            seen.insert(digest, path);
        }
    }
    Ok(removed)
}

/// Content digest used for duplicate detection.
fn backup_digest(path: &Path) -> io::Result<String> {
    let text = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "cfg" | "rsc"));

    let mut hasher = Md5::new();
    if text {
        let body = fs::read_to_string(path)?;
        for line in body.lines().filter(|l| !l.starts_with('#')) {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
    } else {
        let mut file = fs::File::open(path)?;
        let mut buffer = [0u8; 4096];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}
