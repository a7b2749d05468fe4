//! Session-scoped per-host flag store.
//!
//! Flags are the sole cross-task coordination mechanism: a task sets a flag,
//! a later task filters its host subset by it. The store is an explicit handle
//! passed through every task stage; there is no ambient global state. Flag
//! writes serialize through a mutex so a concurrent reader never observes a
//! half-updated flag set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::inventory::Device;

/// Named booleans attached to one host for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostFlags {
    /// The most recent task against this host failed.
    pub error: bool,

    /// The device needs a firmware upgrade.
    pub needs_update: bool,

    /// The device already rebooted in this maintenance round.
    pub reboot_last: bool,
}

/// Cloneable handle to the per-session flag map.
#[derive(Debug, Clone, Default)]
pub struct FlagStore {
    inner: Arc<Mutex<HashMap<String, HostFlags>>>,
}

impl FlagStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current flags for a host; unknown hosts read as all-false.
    pub fn get(&self, hostname: &str) -> HostFlags {
        let map = self.inner.lock().expect("flag store lock poisoned");
        map.get(hostname).copied().unwrap_or_default()
    }

    /// Apply an update to one host's flags under the lock.
    pub fn update(&self, hostname: &str, apply: impl FnOnce(&mut HostFlags)) {
        let mut map = self.inner.lock().expect("flag store lock poisoned");
        apply(map.entry(hostname.to_string()).or_default());
    }

    /// Set the error flag.
    pub fn set_error(&self, hostname: &str, error: bool) {
        self.update(hostname, |f| f.error = error);
    }

    /// Set the needs-update flag.
    pub fn set_needs_update(&self, hostname: &str, needs_update: bool) {
        self.update(hostname, |f| f.needs_update = needs_update);
    }

    /// Set the reboot-last flag.
    pub fn set_reboot_last(&self, hostname: &str, reboot_last: bool) {
        self.update(hostname, |f| f.reboot_last = reboot_last);
    }

    /// Filter a device set by a flag predicate.
    pub fn hosts_where(
        &self,
        devices: &[Device],
        predicate: impl Fn(&HostFlags) -> bool,
    ) -> Vec<Device> {
        devices
            .iter()
            .filter(|d| predicate(&self.get(&d.hostname)))
            .cloned()
            .collect()
    }
}
