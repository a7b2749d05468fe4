//! Juniper JunOS executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::inventory::{Device, Dialect, FlagStore};
use crate::record::{InfoRecord, UserRecord};
use crate::template::{names, TemplateRegistry};
use crate::transport::CommandRunner;

use super::{DialectExecutor, ExecutorCore, Payload, TaskOutcome, UserOptions};

/// Error markers JunOS prints on a rejected command.
const FAILURE_MARKERS: &[&str] = &[
    "syntax error",
    "unknown command",
    "missing argument",
    "error:",
];

const SHOW_TIMEOUT: Duration = Duration::from_secs(30);
const CONFIG_TIMEOUT: Duration = Duration::from_secs(60);
// commit can take a while on loaded boxes.
const COMMIT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct JunosExecutor {
    core: ExecutorCore,
}

impl JunosExecutor {
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
impl DialectExecutor for JunosExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Junos
    }

    async fn get_info(&self, hosts: &[Device]) -> Result<Vec<InfoRecord>> {
        let parsed = self
            .core
            .run_parsed(
                hosts,
                "show version",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::JUNOS_SHOW_VERSION,
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
                "show configuration system login",
                SHOW_TIMEOUT,
                FAILURE_MARKERS,
                names::JUNOS_SYSTEM_LOGIN,
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
        let lines = vec![
            format!("set system login user {username} class {}", options.class),
            format!(
                "set system login user {username} authentication plain-text-password-value {password}"
            ),
        ];
        Ok(self
            .core
            .run_outcome(hosts, Payload::Config(lines), CONFIG_TIMEOUT, FAILURE_MARKERS)
            .await)
    }

    fn supports_commit(&self) -> bool {
        true
    }

    async fn commit(&self, hosts: &[Device]) -> Result<TaskOutcome> {
        Ok(self
            .core
            .run_outcome(
                hosts,
                Payload::Command("commit and-quit".to_string()),
                COMMIT_TIMEOUT,
                FAILURE_MARKERS,
            )
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::inventory::Credentials;
    use std::collections::HashMap;

    struct CannedRunner {
        outputs: HashMap<String, String>,
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn send_command(
            &self,
            device: &Device,
            _command: &str,
        ) -> std::result::Result<String, TransportError> {
            self.outputs
                .get(&device.hostname)
                .cloned()
                .ok_or(TransportError::Disconnected)
        }
    }

    fn device(hostname: &str) -> Device {
        Device::new(
            hostname,
            "192.0.2.20",
            Dialect::Junos,
            Credentials::new("admin", "secret"),
        )
    }

    fn executor(outputs: HashMap<String, String>) -> (JunosExecutor, FlagStore) {
        let flags = FlagStore::new();
        let executor = JunosExecutor::new(
            Arc::new(CannedRunner { outputs }),
            Arc::new(TemplateRegistry::builtin()),
            flags.clone(),
        );
        (executor, flags)
    }

    #[tokio::test]
    async fn test_get_info_parses_model_and_version() {
        let output = "Hostname: fw-edge-1\nModel: srx300\nJunos: 19.2R1.8\n";
        let (executor, _) = executor(HashMap::from([(
            "fw-edge-1".to_string(),
            output.to_string(),
        )]));
        let records = executor.get_info(&[device("fw-edge-1")]).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str_field("model"), Some("srx300"));
        assert_eq!(records[0].str_field("version"), Some("19.2R1.8"));
    }

    #[tokio::test]
    async fn test_get_users_parses_login_stanzas() {
        let output = "user admin {\n    uid 2000;\n    class super-user;\n}\nuser ro {\n    uid 2001;\n    class read-only;\n}\n";
        let (executor, _) = executor(HashMap::from([(
            "fw-edge-1".to_string(),
            output.to_string(),
        )]));
        let records = executor.get_users(&[device("fw-edge-1")]).await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].has_user("admin"));
        assert_eq!(records[0].users["ro"]["class"], "read-only");
    }

    #[tokio::test]
    async fn test_syntax_error_output_fails_host() {
        let (executor, flags) = executor(HashMap::from([(
            "fw-edge-1".to_string(),
            "syntax error, expecting <command>.".to_string(),
        )]));
        let outcome = executor.commit(&[device("fw-edge-1")]).await.unwrap();

        assert!(outcome.failed.contains("fw-edge-1"));
        assert!(flags.get("fw-edge-1").error);
    }
}
