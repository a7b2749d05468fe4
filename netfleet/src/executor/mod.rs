//! Task executors, one per device dialect.
//!
//! Every executor shares one shape: fan a command out to a host set, classify
//! per-host success/failure, update the flag store, and parse successful
//! outputs into records. Transport failures and command-syntax failures are
//! not distinguished; both surface as a failed host with the raw error text
//! kept only for the log.

mod engine;
mod ios;
mod junos;
mod qtech;
mod routeros;

pub use engine::{FanOut, Payload};
pub use ios::IosExecutor;
pub use junos::JunosExecutor;
pub use qtech::QtechExecutor;
pub use routeros::RouterOsExecutor;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use crate::error::{Result, TaskError};
use crate::inventory::{Device, Dialect, FlagStore};
use crate::record::{InfoRecord, UserRecord};
use crate::template::{Record, TemplateRegistry};
use crate::transport::{CommandResult, CommandRunner};

/// Per-host outcome sets of one mutating task.
///
/// A hostname appears in at most one set, and every submitted host appears in
/// exactly one — hosts are never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub completed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl TaskOutcome {
    /// Empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a host as completed, clearing any earlier failure.
    pub fn add_completed(&mut self, hostname: impl Into<String>) {
        let hostname = hostname.into();
        self.failed.remove(&hostname);
        self.completed.insert(hostname);
    }

    /// Record a host as failed, clearing any earlier success.
    pub fn add_failed(&mut self, hostname: impl Into<String>) {
        let hostname = hostname.into();
        self.completed.remove(&hostname);
        self.failed.insert(hostname);
    }

    /// Fold another outcome in (used when a workflow spans dialects).
    pub fn absorb(&mut self, other: TaskOutcome) {
        for host in other.completed {
            self.add_completed(host);
        }
        for host in other.failed {
            self.add_failed(host);
        }
    }

    /// Whether every listed host landed in exactly one set.
    pub fn covers(&self, hosts: &[Device]) -> bool {
        hosts.iter().all(|d| {
            self.completed.contains(&d.hostname) != self.failed.contains(&d.hostname)
        })
    }
}

/// Dialect-specific knobs for user creation.
#[derive(Debug, Clone)]
pub struct UserOptions {
    /// IOS/Qtech privilege level.
    pub privilege: u8,

    /// RouterOS group.
    pub group: String,

    /// JunOS login class.
    pub class: String,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            privilege: 15,
            group: "full".to_string(),
            class: "super-user".to_string(),
        }
    }
}

/// Uniform task contract, one implementation per dialect.
///
/// `commit` and `save_config` are optional capabilities: RouterOS persists
/// automatically, JunOS requires commit, IOS and Qtech require an explicit
/// save. Callers check the capability flags before invoking.
#[async_trait]
pub trait DialectExecutor: Send + Sync {
    /// Dialect this executor speaks.
    fn dialect(&self) -> Dialect;

    /// Issue the version query and parse per-host info records.
    async fn get_info(&self, hosts: &[Device]) -> Result<Vec<InfoRecord>>;

    /// Issue the users listing and parse per-host user records.
    async fn get_users(&self, hosts: &[Device]) -> Result<Vec<UserRecord>>;

    /// Create a user on every host.
    ///
    /// Partially applied config on a failed host is left in place; the host
    /// is reported failed without rollback.
    async fn create_user(
        &self,
        hosts: &[Device],
        username: &str,
        password: &str,
        options: &UserOptions,
    ) -> Result<TaskOutcome>;

    /// Whether the dialect persists config via an explicit save.
    fn supports_save(&self) -> bool {
        false
    }

    /// Persist running config to startup config.
    async fn save_config(&self, _hosts: &[Device]) -> Result<TaskOutcome> {
        Err(TaskError::Unsupported {
            dialect: self.dialect(),
            operation: "save_config",
        }
        .into())
    }

    /// Whether the dialect stages config changes behind a commit.
    fn supports_commit(&self) -> bool {
        false
    }

    /// Commit staged configuration.
    async fn commit(&self, _hosts: &[Device]) -> Result<TaskOutcome> {
        Err(TaskError::Unsupported {
            dialect: self.dialect(),
            operation: "commit",
        }
        .into())
    }
}

/// Shared internals of every dialect executor.
pub(crate) struct ExecutorCore {
    pub engine: FanOut,
    pub templates: Arc<TemplateRegistry>,
    pub flags: FlagStore,
}

impl ExecutorCore {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        templates: Arc<TemplateRegistry>,
        flags: FlagStore,
    ) -> Self {
        Self {
            engine: FanOut::new(runner),
            templates,
            flags,
        }
    }

    /// Classify raw results against the dialect's failure markers, updating
    /// the flag store. Returns the successful results and the full outcome.
    pub fn classify(
        &self,
        results: Vec<CommandResult>,
        markers: &[&str],
    ) -> (Vec<CommandResult>, TaskOutcome) {
        let mut outcome = TaskOutcome::new();
        let mut successes = Vec::new();

        for result in results {
            let marker_hit = markers.iter().find(|m| result.output.contains(*m));
            if result.failed || marker_hit.is_some() {
                let reason = result
                    .error
                    .as_deref()
                    .or(marker_hit.copied())
                    .unwrap_or("command failed");
                warn!("Failed task on device {}: {}", result.host, reason);
                self.flags.set_error(&result.host, true);
                outcome.add_failed(&result.host);
            } else {
                self.flags.set_error(&result.host, false);
                outcome.add_completed(&result.host);
                successes.push(result);
            }
        }
        (successes, outcome)
    }

    /// Fan a payload out and classify, for tasks that only need the outcome.
    pub async fn run_outcome(
        &self,
        hosts: &[Device],
        payload: Payload,
        timeout: Duration,
        markers: &[&str],
    ) -> TaskOutcome {
        let results = self.engine.run(hosts, payload, timeout).await;
        let (_, outcome) = self.classify(results, markers);
        outcome
    }

    /// Fan a command out, classify, and parse each successful output with the
    /// named template. Hosts whose output parses to zero records (or halts the
    /// template) are logged and flagged, never fatal; a missing template is a
    /// configuration error and fails the call.
    pub async fn run_parsed(
        &self,
        hosts: &[Device],
        command: &str,
        timeout: Duration,
        markers: &[&str],
        template_name: &str,
    ) -> Result<Vec<(String, Vec<Record>)>> {
        let template = self.templates.get(template_name)?;
        let results = self
            .engine
            .run(hosts, Payload::Command(command.to_string()), timeout)
            .await;
        let (successes, _) = self.classify(results, markers);

        let mut parsed = Vec::with_capacity(successes.len());
        for result in successes {
            match template.parse_text(&result.output) {
                Ok(rows) if rows.is_empty() => {
                    warn!(
                        "No '{template_name}' records in output from {}",
                        result.host
                    );
                    self.flags.set_error(&result.host, true);
                }
                Ok(rows) => parsed.push((result.host, rows)),
                Err(e) => {
                    warn!("Parse failed for {} with '{template_name}': {e}", result.host);
                    self.flags.set_error(&result.host, true);
                }
            }
        }
        Ok(parsed)
    }
}
