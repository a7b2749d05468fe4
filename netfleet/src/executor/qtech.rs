//! Qtech executor.
//!
//! Qtech boxes speak an IOS-like CLI with a few renamed verbs (`write running`
//! instead of `copy run start`, plaintext `password 0` instead of `secret`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::inventory::{Device, Dialect, FlagStore};
use crate::record::{InfoRecord, UserRecord};
use crate::template::{names, TemplateRegistry};
use crate::transport::CommandRunner;

use super::{DialectExecutor, ExecutorCore, Payload, TaskOutcome, UserOptions};

const FAILURE_MARKERS: &[&str] = &["% Invalid input", "% Unknown command", "% Incomplete command"];

const SHOW_TIMEOUT: Duration = Duration::from_secs(30);
const CONFIG_TIMEOUT: Duration = Duration::from_secs(60);
const SAVE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct QtechExecutor {
    core: ExecutorCore,
}

impl QtechExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        templates: Arc<TemplateRegistry>,
        flags: FlagStore,
    ) -> Self {
        Self {
            core: ExecutorCore::new(runner, templates, flags),
        }
    }
}

#[async_trait]
impl DialectExecutor for QtechExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Qtech
    }

    async fn get_info(&self, hosts: &[Device]) -> Result<Vec<InfoRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                "show version",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::QTECH_SHOW_VERSION,
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
                "show startup | include username",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::QTECH_STARTUP_USERNAME,
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
        let line = format!(
            "username {username} privilege {} password 0 {password}",
            options.privilege
        );
        Ok(self
            .core
            .run_outcome(hosts, Payload::Config(vec![line]), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await)
    }

    fn supports_save(&self) -> bool {
        true
    }

    async fn save_config(&self, hosts: &[Device]) -> Result<TaskOutcome> {
        Ok(self
            .core
            .run_outcome(
                hosts,
                Payload::Command("write running".to_string()),
                SAVE_TIMEOUT,
                FAILURE_MARKERS,
            )
            .await)
    }
}
