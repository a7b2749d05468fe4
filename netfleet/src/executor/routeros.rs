//! MikroTik RouterOS executor.
//!
//! Beyond the uniform task set, RouterOS carries the firmware-update surface:
//! package inventory, routerboard firmware state, upgrade-source registration,
//! scheduled reboots and the routerboard upgrade itself. Configuration
//! persists automatically, so there is no save or commit here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use crate::error::Result;
use crate::inventory::{Device, Dialect, FlagStore};
use crate::record::{InfoRecord, PackageRecord, UserRecord};
use crate::template::{names, TemplateRegistry};
use crate::transport::CommandRunner;

use super::{DialectExecutor, ExecutorCore, Payload, TaskOutcome, UserOptions};

/// Error markers RouterOS prints on a rejected command.
const FAILURE_MARKERS: &[&str] = &[
    "bad command name",
    "syntax error",
    "expected end of command",
    "failure:",
    "input does not match any value",
];

/// Scheduler entry used for one-shot reboots; removed before re-adding so the
/// task stays idempotent.
const REBOOT_SCHEDULE_NAME: &str = "System_autoreboot";

const SHOW_TIMEOUT: Duration = Duration::from_secs(30);
const CONFIG_TIMEOUT: Duration = Duration::from_secs(60);
// `user export` walks the whole config tree.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Wall-clock trigger for a reboot `timeout_secs` from `now`, as `HH:MM:SS`.
///
/// The device's scheduler reads the trigger against its own wall clock, so
/// `now` must come from the same local clock the fleet is set to, never UTC.
/// The date is discarded: a trigger that crosses midnight fires on the wrong
/// side of it. Callers keep the timeout short enough not to care.
pub fn reboot_trigger_time<Tz>(now: DateTime<Tz>, timeout_secs: u64) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let trigger = now + chrono::Duration::seconds(timeout_secs as i64);
    trigger.format("%H:%M:%S").to_string()
}

pub struct RouterOsExecutor {
    core: ExecutorCore,
}

impl RouterOsExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        templates: Arc<TemplateRegistry>,
        flags: FlagStore,
    ) -> Self {
        Self {
            core: ExecutorCore::new(runner, templates, flags),
        }
    }

    /// Installed package table per host (`system package print terse`).
    pub async fn get_packages(&self, hosts: &[Device]) -> Result<Vec<PackageRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                "system package print terse",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::ROUTEROS_SYSTEM_PACKAGE,
            )
            .await?;
        Ok(parsed
            .into_iter()
            .map(|(host, rows)| PackageRecord::from_rows(host, &rows, "name"))
            .collect())
    }

    /// Routerboard firmware state per host (current vs upgrade firmware).
    pub async fn get_routerboard(&self, hosts: &[Device]) -> Result<Vec<InfoRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                "system routerboard print",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::ROUTEROS_SYSTEM_ROUTERBOARD,
            )
            .await?;
        Ok(parsed
            .into_iter()
            .filter_map(|(host, rows)| {
                let row = rows.first()?;
                Some(InfoRecord::from_row(host, row))
            })
            .collect())
    }

    /// Register the host packages are fetched from during an upgrade. The
    /// password goes on its own line because the CLI prompts for it.
    pub async fn add_update_source(
        &self,
        hosts: &[Device],
        address: &str,
        username: &str,
        password: &str,
    ) -> TaskOutcome {
        let lines = vec![
            format!("system upgrade upgrade-package-source add address={address} user={username}"),
            password.to_string(),
        ];
        self.core
            .run_outcome(hosts, Payload::Config(lines), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await
    }

    /// Schedule a one-shot reboot `timeout_secs` from now. Any previous
    /// schedule of the same name is removed first.
    pub async fn schedule_reboot(&self, hosts: &[Device], timeout_secs: u64) -> TaskOutcome {
        let start_time = reboot_trigger_time(Local::now(), timeout_secs);
        let lines = vec![
            format!("system scheduler remove [find name=\"{REBOOT_SCHEDULE_NAME}\"]"),
            format!(
                "system scheduler add name=\"{REBOOT_SCHEDULE_NAME}\" start-time={start_time} interval=0 on-event=\"/system reboot\""
            ),
        ];
        self.core
            .run_outcome(hosts, Payload::Config(lines), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await
    }

    /// Flash the routerboard firmware staged by the OS upgrade. The command
    /// asks for confirmation; the `y` rides along as a second line.
    pub async fn upgrade_firmware(&self, hosts: &[Device]) -> TaskOutcome {
        let lines = vec!["system routerboard upgrade".to_string(), "y".to_string()];
        self.core
            .run_outcome(hosts, Payload::Config(lines), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await
    }
}

#[async_trait]
impl DialectExecutor for RouterOsExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::RouterOs
    }

    async fn get_info(&self, hosts: &[Device]) -> Result<Vec<InfoRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                "system resource print",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::ROUTEROS_SYSTEM_RESOURCE,
            )
            .await?;
        Ok(parsed
            .into_iter()
            .filter_map(|(host, rows)| {
                let address = hosts
                    .iter()
                    .find(|d| d.hostname == host)
                    .map(|d| d.address.clone())?;
                let row = rows.first()?;
                Some(InfoRecord::from_row(host, row).with_field("address", address))
            })
            .collect())
    }

    async fn get_users(&self, hosts: &[Device]) -> Result<Vec<UserRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                // compact keeps each `add name=...` on one line for the template
                "user export verbose compact",
                EXPORT_TIMEOUT,
                FAILURE_MARKERS,
                names::ROUTEROS_USER_EXPORT,
            )
            .await?;
        Ok(parsed
            .into_iter()
            .map(|(host, rows)| UserRecord::from_rows(host, &rows, "username"))
            .collect())
    }

    async fn create_user(
        &self,
        hosts: &[Device],
        username: &str,
        password: &str,
        options: &UserOptions,
    ) -> Result<TaskOutcome> {
        let command = format!(
            "user add name={username} group={} password=\"{password}\"",
            options.group
        );
        Ok(self
            .core
            .run_outcome(hosts, Payload::Command(command), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await)
    }
}
