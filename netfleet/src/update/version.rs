//! RouterOS firmware version triples.

use std::fmt;
use std::str::FromStr;

use crate::error::UpdateError;

/// A `major.minor.patch` firmware version, ordered numerically per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl FirmwareVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for FirmwareVersion {
    type Err = UpdateError;

    /// Parses `"6.46.5"`, tolerating a trailing channel suffix as printed by
    /// `system resource print` (`"6.46.5 (stable)"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || UpdateError::BadVersion {
            value: s.to_string(),
        };
        let core = s.split_whitespace().next().ok_or_else(bad)?;
        let mut parts = core.split('.');
        let mut component = || -> Result<u64, Self::Err> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(bad)
        };
        let version = Self::new(component()?, component()?, component()?);
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(version)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
