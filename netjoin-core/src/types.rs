//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Container identifier with validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Length of the short container id printed by container runtimes
    pub const SHORT_LENGTH: usize = 12;

    /// Maximum length for container IDs
    pub const MAX_LENGTH: usize = 64;

    /// Create a new `ContainerId` with validation
    ///
    /// # Errors
    /// Returns error if ID is invalid (empty, too long, or contains invalid characters)
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Validate a container ID
    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidConfig {
                message: "Container ID cannot be empty".to_string(),
            });
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::InvalidConfig {
                message: format!("Container ID too long (max {} chars)", Self::MAX_LENGTH),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(Error::InvalidConfig {
                message: "Container ID can only contain alphanumeric, dash, dot, and underscore"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Whether `candidate` has the shape of a short container id
    #[must_use]
    pub fn looks_like_short_id(candidate: &str) -> bool {
        candidate.len() == Self::SHORT_LENGTH
    }

    /// Get the container ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        #[allow(clippy::cast_possible_wrap)]
        Self(std::process::id() as i32)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    /// Parse a decimal, strictly positive process id
    fn from_str(s: &str) -> Result<Self> {
        let pid: i32 = s.parse().map_err(|e| Error::InvalidConfig {
            message: format!("invalid process id {s:?}: {e}"),
        })?;

        if pid <= 0 {
            return Err(Error::InvalidConfig {
                message: format!("process id must be positive, got {pid}"),
            });
        }

        Ok(Self(pid))
    }
}
