//! Bounded concurrent fan-out of one command to many hosts.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::inventory::Device;
use crate::transport::{CommandResult, CommandRunner};

/// Default cap on simultaneously in-flight hosts.
const DEFAULT_CONCURRENCY: usize = 8;

/// What to dispatch to each host.
#[derive(Debug, Clone)]
pub enum Payload {
    /// One operational command.
    Command(String),

    /// A batch applied in configuration mode.
    Config(Vec<String>),
}

impl Payload {
    /// Short description for logs.
    fn describe(&self) -> String {
        match self {
            Payload::Command(command) => command.clone(),
            Payload::Config(commands) => format!("config batch ({} commands)", commands.len()),
        }
    }
}

/// Worker-pool dispatcher: sends the same payload to every host and blocks
/// until all hosts reply or exhaust their timeout. Per-host execution is
/// failure-isolated; one host's timeout never blocks or fails another.
///
/// There is no cancellation of an in-flight remote command: a stuck host is
/// recorded failed once its timeout elapses, while the remote side may still
/// be executing.
#[derive(Clone)]
pub struct FanOut {
    runner: Arc<dyn CommandRunner>,
    limit: usize,
}

impl FanOut {
    /// Create a dispatcher over a command runner capability.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            limit: DEFAULT_CONCURRENCY,
        }
    }

    /// Override the in-flight host cap.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Dispatch to every host; the result vector is in host order and holds
    /// exactly one entry per submitted host.
    pub async fn run(
        &self,
        hosts: &[Device],
        payload: Payload,
        per_host_timeout: Duration,
    ) -> Vec<CommandResult> {
        debug!(
            "Dispatching '{}' to {} host(s)",
            payload.describe(),
            hosts.len()
        );
        let semaphore = Arc::new(Semaphore::new(self.limit));

        let handles: Vec<(String, JoinHandle<CommandResult>)> = hosts
            .iter()
            .cloned()
            .map(|device| {
                let runner = Arc::clone(&self.runner);
                let payload = payload.clone();
                let semaphore = Arc::clone(&semaphore);
                let hostname = device.hostname.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                    let attempt = async {
                        match &payload {
                            Payload::Command(command) => {
                                runner.send_command(&device, command).await
                            }
                            Payload::Config(commands) => {
                                runner.send_config(&device, commands).await
                            }
                        }
                    };
                    match timeout(per_host_timeout, attempt).await {
                        Ok(Ok(output)) => CommandResult::success(&device.hostname, output),
                        Ok(Err(e)) => CommandResult::failure(&device.hostname, e.to_string()),
                        Err(_) => CommandResult::failure(
                            &device.hostname,
                            format!("timed out after {per_host_timeout:?}"),
                        ),
                    }
                });
                (hostname, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (hostname, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                // A panicked worker still yields a failed entry for its host.
                Err(e) => results.push(CommandResult::failure(hostname, e.to_string())),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::inventory::{Credentials, Dialect};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapRunner {
        // host -> canned output; missing hosts fail, "slow" hosts hang.
        outputs: HashMap<String, String>,
        slow: Vec<String>,
    }

    #[async_trait]
    impl CommandRunner for MapRunner {
        async fn send_command(
            &self,
            device: &Device,
            _command: &str,
        ) -> std::result::Result<String, TransportError> {
            if self.slow.contains(&device.hostname) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.outputs
                .get(&device.hostname)
                .cloned()
                .ok_or(TransportError::Disconnected)
        }
    }

    fn device(hostname: &str) -> Device {
        Device::new(
            hostname,
            "10.0.0.1",
            Dialect::RouterOs,
            Credentials::new("admin", "secret"),
        )
    }

    #[tokio::test]
    async fn test_every_host_gets_exactly_one_result() {
        let runner = MapRunner {
            outputs: HashMap::from([
                ("a".to_string(), "out-a".to_string()),
                ("c".to_string(), "out-c".to_string()),
            ]),
            slow: vec![],
        };
        let engine = FanOut::new(Arc::new(runner));
        let hosts = vec![device("a"), device("b"), device("c")];

        let results = engine
            .run(&hosts, Payload::Command("show".to_string()), Duration::from_secs(5))
            .await;

        assert_eq!(results.len(), 3);
        assert!(!results[0].failed);
        assert_eq!(results[0].output, "out-a");
        assert!(results[1].failed);
        assert!(!results[2].failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_isolated_per_host() {
        let runner = MapRunner {
            outputs: HashMap::from([
                ("a".to_string(), "ok".to_string()),
                ("b".to_string(), "never seen".to_string()),
            ]),
            slow: vec!["b".to_string()],
        };
        let engine = FanOut::new(Arc::new(runner));
        let hosts = vec![device("a"), device("b")];

        let results = engine
            .run(&hosts, Payload::Command("show".to_string()), Duration::from_secs(10))
            .await;

        assert!(!results[0].failed);
        assert!(results[1].failed);
        assert!(results[1].error.as_deref().unwrap().contains("timed out"));
    }
}
