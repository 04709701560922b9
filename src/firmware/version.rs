//! Firmware and hardware version strings.
//!
//! Format: `major.minor[.revision][-branch]`. A missing revision is 0 and a
//! missing branch is `stable`.
//!
//! # Example
//!
//! ```
//! use mcu_link::firmware::Version;
//!
//! let version: Version = "0.2.1024-dev".parse().unwrap();
//! assert_eq!(version.revision, 1024);
//! assert!(!version.is_stable());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::McuLinkError;

/// Branch name assumed when a version string has none.
pub const STABLE_BRANCH: &str = "stable";

/// A parsed version number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub branch: String,
}

impl Version {
    /// Create a stable-branch version.
    pub fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
            branch: STABLE_BRANCH.to_string(),
        }
    }

    /// Check if this version was built from the stable branch.
    #[inline]
    pub fn is_stable(&self) -> bool {
        self.branch == STABLE_BRANCH
    }
}

impl FromStr for Version {
    type Err = McuLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || McuLinkError::VersionFormat(s.to_string());

        let (numbers, branch) = match s.split_once('-') {
            Some((numbers, branch)) if !branch.is_empty() => (numbers, branch),
            Some(_) => return Err(invalid()),
            None => (s, STABLE_BRANCH),
        };

        let parts = numbers
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let (major, minor, revision) = match parts[..] {
            [major, minor] => (major, minor, 0),
            [major, minor, revision] => (major, minor, revision),
            _ => return Err(invalid()),
        };

        Ok(Self {
            major,
            minor,
            revision,
            branch: branch.to_string(),
        })
    }
}

impl TryFrom<String> for Version {
    type Error = McuLinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)?;
        if !self.is_stable() {
            write!(f, "-{}", self.branch)?;
        }
        Ok(())
    }
}
