//! Device inventory types.
//!
//! The inventory itself (group membership, credential vault decryption) is an
//! external collaborator; this module defines what the core reads from it:
//! hostname, address, dialect, credentials, and the per-session flag store.

mod flags;

pub use flags::{FlagStore, HostFlags};

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use secrecy::SecretString;

/// Vendor command/parsing profile of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Cisco IOS
    Ios,
    /// Juniper JunOS
    Junos,
    /// MikroTik RouterOS
    RouterOs,
    /// Qtech switches
    Qtech,
}

impl Dialect {
    /// All supported dialects, in workflow order.
    pub const ALL: [Dialect; 4] = [Dialect::Ios, Dialect::Junos, Dialect::RouterOs, Dialect::Qtech];

    /// Canonical lowercase name, matching inventory group tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Ios => "ios",
            Dialect::Junos => "junos",
            Dialect::RouterOs => "routeros",
            Dialect::Qtech => "qtech",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Dialect::Ios),
            "junos" | "jun_srx" => Ok(Dialect::Junos),
            "routeros" => Ok(Dialect::RouterOs),
            "qtech" => Ok(Dialect::Qtech),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

/// Login credentials for a device.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username for authentication.
    pub username: String,

    /// Password, kept out of Debug output.
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials from plain strings.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// A single managed device, as supplied by the inventory collaborator.
#[derive(Debug, Clone)]
pub struct Device {
    /// Inventory name, the key every record and outcome is reported under.
    pub hostname: String,

    /// Management address (hostname or IP).
    pub address: String,

    /// Command dialect.
    pub dialect: Dialect,

    /// Login credentials.
    pub credentials: Credentials,

    /// CPU architecture tag, where the inventory knows it (RouterOS).
    pub arch: Option<String>,
}

impl Device {
    /// Create a device with the required fields.
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        dialect: Dialect,
        credentials: Credentials,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            dialect,
            credentials,
            arch: None,
        }
    }

    /// Set the architecture tag.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }
}

/// Ordered device collection keyed by hostname.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    hosts: IndexMap<String, Device>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. A device with the same hostname is replaced.
    pub fn add(&mut self, device: Device) {
        self.hosts.insert(device.hostname.clone(), device);
    }

    /// Look up a device by hostname.
    pub fn get(&self, hostname: &str) -> Option<&Device> {
        self.hosts.get(hostname)
    }

    /// Iterate all devices in insertion order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.hosts.values()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the inventory is empty.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Devices of one dialect, cloned for dispatch.
    pub fn with_dialect(&self, dialect: Dialect) -> Vec<Device> {
        self.hosts
            .values()
            .filter(|d| d.dialect == dialect)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_roundtrip() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.as_str().parse::<Dialect>().unwrap(), dialect);
        }
        // legacy inventory group tag
        assert_eq!("jun_srx".parse::<Dialect>().unwrap(), Dialect::Junos);
        assert!("eos".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_inventory_filter_by_dialect() {
        let mut inventory = Inventory::new();
        inventory.add(Device::new(
            "r1",
            "10.0.0.1",
            Dialect::RouterOs,
            Credentials::new("admin", "secret"),
        ));
        inventory.add(Device::new(
            "sw1",
            "10.0.0.2",
            Dialect::Qtech,
            Credentials::new("admin", "secret"),
        ));

        let routers = inventory.with_dialect(Dialect::RouterOs);
        assert_eq!(routers.len(), 1);
        assert_eq!(routers[0].hostname, "r1");
        assert!(inventory.with_dialect(Dialect::Ios).is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
    }
}
