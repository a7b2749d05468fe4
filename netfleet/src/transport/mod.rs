//! Opaque transport capabilities.
//!
//! The wire mechanics (SSH session handling, prompts, paging) live behind
//! these traits and are out of scope for the core: a runner is given a device
//! and a command string and reports back raw text or a transport failure.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::inventory::Device;

/// Outcome of one command on one host.
///
/// Transport failures (connect/auth/timeout) and command failures are not
/// distinguished past this point; both surface as `failed == true`, with the
/// error text retained only for logging.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Hostname the command ran against.
    pub host: String,

    /// Raw command output; empty on transport failure.
    pub output: String,

    /// Whether the host failed.
    pub failed: bool,

    /// Error text for logging; never inspected downstream.
    pub error: Option<String>,
}

impl CommandResult {
    /// Successful result carrying raw output.
    pub fn success(host: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            output: output.into(),
            failed: false,
            error: None,
        }
    }

    /// Failed result carrying error text for the log.
    pub fn failure(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            output: String::new(),
            failed: true,
            error: Some(error.into()),
        }
    }
}

/// Capability: run command strings on a device and return raw output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a single operational command.
    async fn send_command(
        &self,
        device: &Device,
        command: &str,
    ) -> Result<String, TransportError>;

    /// Apply a command batch in the device's configuration mode. The default
    /// sends them one by one for transports without a config-mode notion.
    async fn send_config(
        &self,
        device: &Device,
        commands: &[String],
    ) -> Result<String, TransportError> {
        let mut output = String::new();
        for command in commands {
            output.push_str(&self.send_command(device, command).await?);
            output.push('\n');
        }
        Ok(output)
    }
}
