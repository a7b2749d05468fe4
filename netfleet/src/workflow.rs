//! Sequential fleet workflows.
//!
//! Each workflow is a fixed-order pipeline over one flag store: a stage sets
//! flags, the next stage filters its host subset by them. No stage failure
//! propagates out as an error; failed hosts drop out of later stages and the
//! caller reads the outcome from the returned sets and the flag store.

use log::{info, warn};

use crate::error::Result;
use crate::executor::{DialectExecutor, RouterOsExecutor, TaskOutcome, UserOptions};
use crate::inventory::{Device, FlagStore};
use crate::record::merge_by_hostname;
use crate::transfer::TransferGateway;
use crate::update::{ChecksumMap, PackageFetcher, UpdatePlanner, UpdateState};

/// Create a user across a host set, idempotently.
///
/// Hosts already carrying the username are flagged and skipped, so re-running
/// after a partial failure only touches the hosts that still need the user.
/// After creation the change is committed or saved where the dialect requires
/// it, then re-read to verify the user actually exists.
pub async fn provision_user(
    executor: &dyn DialectExecutor,
    hosts: &[Device],
    username: &str,
    password: &str,
    options: &UserOptions,
    flags: &FlagStore,
) -> Result<TaskOutcome> {
    // Pre-check: an existing user means this host was already provisioned.
    for record in executor.get_users(hosts).await? {
        if record.has_user(username) {
            warn!("User '{username}' already exists on {}", record.hostname);
            flags.set_error(&record.hostname, true);
        }
    }

    let candidates = flags.hosts_where(hosts, |f| !f.error);
    let mut outcome = TaskOutcome::new();
    for excluded in hosts
        .iter()
        .filter(|d| !candidates.iter().any(|c| c.hostname == d.hostname))
    {
        outcome.add_failed(&excluded.hostname);
    }
    if candidates.is_empty() {
        info!("No hosts left to provision '{username}' on");
        return Ok(outcome);
    }

    outcome.absorb(
        executor
            .create_user(&candidates, username, password, options)
            .await?,
    );

    let created = flags.hosts_where(&candidates, |f| !f.error);
    if executor.supports_commit() && !created.is_empty() {
        outcome.absorb(executor.commit(&created).await?);
    }
    if executor.supports_save() && !created.is_empty() {
        outcome.absorb(executor.save_config(&created).await?);
    }

    // Post-check: trust the device's own user table, not the command echo.
    let verified = flags.hosts_where(&created, |f| !f.error);
    for record in executor.get_users(&verified).await? {
        if record.has_user(username) {
            info!("User '{username}' verified on {}", record.hostname);
        } else {
            warn!("User '{username}' missing on {} after creation", record.hostname);
            flags.set_error(&record.hostname, true);
            outcome.add_failed(&record.hostname);
        }
    }
    Ok(outcome)
}

/// Plan (and execute) package updates for a RouterOS fleet.
///
/// Collects the merged info + package view per device, then runs each device
/// through the update planner. Returns each device's terminal state in host
/// order.
pub async fn plan_firmware_updates(
    executor: &RouterOsExecutor,
    hosts: &[Device],
    planner: &UpdatePlanner,
    checksums: &ChecksumMap,
    fetcher: &dyn PackageFetcher,
    gateway: &TransferGateway,
    flags: &FlagStore,
) -> Result<Vec<(String, UpdateState)>> {
    let info = executor.get_info(hosts).await?;
    let packages = executor.get_packages(hosts).await?;
    let summaries = merge_by_hostname(&info, &packages);

    let mut states = Vec::with_capacity(summaries.len());
    for summary in &summaries {
        let Some(device) = hosts.iter().find(|d| d.hostname == summary.hostname) else {
            continue;
        };
        let state = planner
            .process_device(device, summary, checksums, fetcher, gateway, flags)
            .await;
        info!("{}: {state:?}", summary.hostname);
        states.push((summary.hostname.clone(), state));
    }
    Ok(states)
}

/// Flash routerboard firmware where the board reports a newer one staged.
///
/// Reads the routerboard state, flags hosts whose current firmware is older
/// than the staged upgrade, and runs the upgrade on exactly that subset.
pub async fn apply_routerboard_upgrades(
    executor: &RouterOsExecutor,
    hosts: &[Device],
    flags: &FlagStore,
) -> Result<TaskOutcome> {
    use crate::update::FirmwareVersion;

    for record in executor.get_routerboard(hosts).await? {
        let current = record
            .str_field("currentfirmware")
            .and_then(|s| s.parse::<FirmwareVersion>().ok());
        let upgrade = record
            .str_field("upgradefirmware")
            .and_then(|s| s.parse::<FirmwareVersion>().ok());
        match (current, upgrade) {
            (Some(current), Some(upgrade)) if current < upgrade => {
                info!(
                    "{}: routerboard firmware {current} behind staged {upgrade}",
                    record.hostname
                );
                flags.set_needs_update(&record.hostname, true);
            }
            (Some(_), Some(_)) => {}
            _ => {
                warn!("{}: unreadable routerboard firmware versions", record.hostname);
                flags.set_error(&record.hostname, true);
            }
        }
    }

    let pending = flags.hosts_where(hosts, |f| f.needs_update && !f.error);
    if pending.is_empty() {
        info!("No routerboard upgrades pending");
        return Ok(TaskOutcome::new());
    }
    let outcome = executor.upgrade_firmware(&pending).await;
    for host in &outcome.completed {
        info!("{host}: routerboard upgrade issued");
    }
    for host in &outcome.failed {
        warn!("{host}: routerboard upgrade failed");
    }
    Ok(outcome)
}

/// Schedule reboots for every host that has not yet rebooted this round.
pub async fn schedule_reboots(
    executor: &RouterOsExecutor,
    hosts: &[Device],
    timeout_secs: u64,
    flags: &FlagStore,
) -> TaskOutcome {
    let pending = flags.hosts_where(hosts, |f| !f.reboot_last);
    if pending.is_empty() {
        info!("Every host already rebooted this round");
        return TaskOutcome::new();
    }
    let outcome = executor.schedule_reboot(&pending, timeout_secs).await;
    for host in &outcome.completed {
        flags.set_reboot_last(host, true);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::inventory::{Credentials, Dialect};
    use crate::template::TemplateRegistry;
    use crate::transport::CommandRunner;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted device: answers per command prefix, optionally hangs.
    struct FleetRunner {
        // (hostname, command prefix) -> output
        responses: HashMap<(String, String), String>,
        slow: Vec<String>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl FleetRunner {
        fn respond(&mut self, host: &str, prefix: &str, output: &str) {
            self.responses
                .insert((host.to_string(), prefix.to_string()), output.to_string());
        }

        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                slow: Vec::new(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FleetRunner {
        async fn send_command(
            &self,
            device: &Device,
            command: &str,
        ) -> std::result::Result<String, TransportError> {
            if self.slow.contains(&device.hostname) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.sent
                .lock()
                .unwrap()
                .push((device.hostname.clone(), command.to_string()));
            self.responses
                .iter()
                .find(|((host, prefix), _)| host == &device.hostname && command.starts_with(prefix.as_str()))
                .map(|(_, output)| output.clone())
                .ok_or(TransportError::Disconnected)
        }
    }

    fn device(hostname: &str) -> Device {
        Device::new(
            hostname,
            "10.20.0.1",
            Dialect::RouterOs,
            Credentials::new("admin", "secret"),
        )
    }

    fn routeros(runner: impl CommandRunner + 'static, flags: &FlagStore) -> RouterOsExecutor {
        RouterOsExecutor::new(
            Arc::new(runner),
            Arc::new(TemplateRegistry::builtin()),
            flags.clone(),
        )
    }

    /// Mock device with an actual user table: `user add` mutates it and
    /// `user export` renders it, so the post-check sees real state.
    struct UserStoreRunner {
        users: Mutex<HashMap<String, Vec<String>>>,
        slow: Vec<String>,
    }

    impl UserStoreRunner {
        fn new(seed: &[(&str, &[&str])], slow: &[&str]) -> Self {
            Self {
                users: Mutex::new(
                    seed.iter()
                        .map(|(host, users)| {
                            (host.to_string(), users.iter().map(|u| u.to_string()).collect())
                        })
                        .collect(),
                ),
                slow: slow.iter().map(|h| h.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for UserStoreRunner {
        async fn send_command(
            &self,
            device: &Device,
            command: &str,
        ) -> std::result::Result<String, TransportError> {
            if self.slow.contains(&device.hostname) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let mut users = self.users.lock().unwrap();
            let table = users.entry(device.hostname.clone()).or_default();
            if command.starts_with("user export") {
                Ok(table
                    .iter()
                    .map(|u| format!("add name={u} group=full\n"))
                    .collect())
            } else if let Some(rest) = command.strip_prefix("user add name=") {
                let name = rest.split_whitespace().next().unwrap_or_default();
                table.push(name.to_string());
                Ok(String::new())
            } else {
                Err(TransportError::Disconnected)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provision_user_partitions_outcome_on_timeout() {
        let runner = UserStoreRunner::new(&[("a", &["admin"]), ("c", &["admin"])], &["b"]);
        let flags = FlagStore::new();
        let executor = routeros(runner, &flags);
        let hosts = vec![device("a"), device("b"), device("c")];

        let outcome = provision_user(
            &executor,
            &hosts,
            "backup",
            "pw",
            &UserOptions::default(),
            &flags,
        )
        .await
        .unwrap();

        assert!(outcome.completed.contains("a"));
        assert!(outcome.completed.contains("c"));
        assert!(outcome.failed.contains("b"));
        assert!(outcome.covers(&hosts));
        assert!(flags.get("b").error);
        assert!(!flags.get("a").error);
    }

    #[tokio::test]
    async fn test_provision_user_skips_hosts_with_existing_user() {
        let runner = UserStoreRunner::new(&[("a", &["backup"]), ("b", &["admin"])], &[]);
        let flags = FlagStore::new();
        let executor = routeros(runner, &flags);
        let hosts = vec![device("a"), device("b")];

        let outcome = provision_user(
            &executor,
            &hosts,
            "backup",
            "pw",
            &UserOptions::default(),
            &flags,
        )
        .await
        .unwrap();

        // Pre-check catches the existing user; only the other host proceeds.
        assert!(outcome.failed.contains("a"));
        assert!(outcome.completed.contains("b"));
        assert!(flags.get("a").error);
    }

    #[tokio::test]
    async fn test_routerboard_upgrade_targets_only_stale_boards() {
        let mut runner = FleetRunner::new();
        runner.respond(
            "stale",
            "system routerboard print",
            "  model: RBM33G\n  current-firmware: 6.45.9\n  upgrade-firmware: 6.46.5\n",
        );
        runner.respond(
            "fresh",
            "system routerboard print",
            "  model: RBM33G\n  current-firmware: 6.46.5\n  upgrade-firmware: 6.46.5\n",
        );
        runner.respond("stale", "system routerboard upgrade", "");
        runner.respond("stale", "y", "");
        let flags = FlagStore::new();
        let executor = routeros(runner, &flags);
        let hosts = vec![device("stale"), device("fresh")];

        let outcome = apply_routerboard_upgrades(&executor, &hosts, &flags)
            .await
            .unwrap();

        assert!(outcome.completed.contains("stale"));
        assert!(!outcome.completed.contains("fresh"));
        assert!(flags.get("stale").needs_update);
        assert!(!flags.get("fresh").needs_update);
    }

    #[tokio::test]
    async fn test_schedule_reboots_skips_already_rebooted() {
        let mut runner = FleetRunner::new();
        runner.respond("a", "system scheduler", "");
        let flags = FlagStore::new();
        flags.set_reboot_last("b", true);
        let executor = routeros(runner, &flags);
        let hosts = vec![device("a"), device("b")];

        let outcome = schedule_reboots(&executor, &hosts, 300, &flags).await;

        assert!(outcome.completed.contains("a"));
        assert!(!outcome.completed.contains("b"));
        assert!(!outcome.failed.contains("b"));
        assert!(flags.get("a").reboot_last);
    }
}
