//! Error types for netfleet.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::inventory::Dialect;

/// Main error type for netfleet operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport capability errors (connect, auth, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Template grammar and lookup errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Task executor errors
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Remote file copy errors
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Firmware update planner errors
    #[error("Update error: {0}")]
    Update(#[from] UpdateError),

    /// I/O error outside any specific layer
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport capability errors. The wire protocol itself is out of scope;
/// these describe the outcomes a command runner may report.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}: {message}")]
    ConnectionFailed { host: String, message: String },

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Template definition and lookup errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template registered or found on disk under this name
    #[error("Template '{name}' not found")]
    NotFound { name: String },

    /// Malformed template source
    #[error("Template syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A rule references a value that was never declared
    #[error("Unknown value '${{{name}}}' in rule")]
    UnknownValue { name: String },

    /// A rule transitions to a state that does not exist
    #[error("Unknown state '{name}' in rule transition")]
    UnknownState { name: String },

    /// Invalid regex in a value or rule
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An `Error` rule action fired during matching
    #[error("Template halted on line {line}: {message}")]
    Halted { line: usize, message: String },
}

/// Task executor errors.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The dialect does not implement this operation
    #[error("Dialect '{dialect}' does not support '{operation}'")]
    Unsupported {
        dialect: Dialect,
        operation: &'static str,
    },
}

/// Remote file copy errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Failed to open a copy session to the device
    #[error("Failed to open transfer session to {host}: {message}")]
    SessionOpen { host: String, message: String },

    /// A get/put of a single file failed
    #[error("Copy failed for '{path}': {message}")]
    Copy { path: String, message: String },
}

/// Firmware update planner errors.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// HTTP request failure (checksum page or package download)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cache directory or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corrupt or unreadable package bundle
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A version string could not be parsed as major.minor.patch
    #[error("Invalid firmware version '{value}'")]
    BadVersion { value: String },

    /// A device summary is missing a field the planner requires
    #[error("Device {hostname} is missing field '{field}'")]
    MissingField { hostname: String, field: String },
}

/// Result type alias using netfleet's Error.
pub type Result<T> = std::result::Result<T, Error>;
