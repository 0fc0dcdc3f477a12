//! Configuration source priorities
//!
//! Every configuration source owns one slot in a policy chain. Slots are
//! ordered: a lower index wins over a higher one when both set the same field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Number of priority levels held by every policy chain
pub const PRIORITY_COUNT: usize = 7;

/// Configuration source priority (lower index = higher precedence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Developer overrides, beat everything else
    Debug = 0,
    /// Values probed from device capabilities
    Device = 1,
    /// Emergency configuration pushed by the server
    EmergencyServer = 2,
    /// Values set by the scripting layer
    Script = 3,
    /// End-user settings
    User = 4,
    /// Regular server configuration
    NormalServer = 5,
    /// Built-in defaults, always fully populated
    Internal = 6,
}

impl Priority {
    /// All priorities, highest precedence first
    pub const ALL: [Priority; PRIORITY_COUNT] = [
        Priority::Debug,
        Priority::Device,
        Priority::EmergencyServer,
        Priority::Script,
        Priority::User,
        Priority::NormalServer,
        Priority::Internal,
    ];

    /// Slot index inside a chain
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lookup by slot index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Name used in JSON documents and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Debug => "debug",
            Priority::Device => "device",
            Priority::EmergencyServer => "emergency_server",
            Priority::Script => "script",
            Priority::User => "user",
            Priority::NormalServer => "normal_server",
            Priority::Internal => "internal",
        }
    }

    /// Whether `self` wins over `other` for a field both of them set
    pub fn outranks(self, other: Priority) -> bool {
        self.index() < other.index()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| AppError::Config(format!("Unknown priority: {}", s)))
    }
}

impl TryFrom<usize> for Priority {
    type Error = AppError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::from_index(value).ok_or(AppError::InvalidPriority(value as i64))
    }
}

impl TryFrom<u8> for Priority {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(value as usize)
    }
}

impl TryFrom<i32> for Priority {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(Self::from_index)
            .ok_or(AppError::InvalidPriority(value as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Debug.outranks(Priority::Device));
        assert!(Priority::User.outranks(Priority::NormalServer));
        assert!(!Priority::Internal.outranks(Priority::NormalServer));
        for (i, p) in Priority::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn test_priority_conversion() {
        assert_eq!(Priority::try_from(4usize).unwrap(), Priority::User);
        assert_eq!(Priority::try_from(0u8).unwrap(), Priority::Debug);
        assert!(matches!(
            Priority::try_from(99u8),
            Err(AppError::InvalidPriority(99))
        ));
        assert!(matches!(
            Priority::try_from(-1i32),
            Err(AppError::InvalidPriority(-1))
        ));
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("user".parse::<Priority>().unwrap(), Priority::User);
        assert_eq!(
            "Emergency-Server".parse::<Priority>().unwrap(),
            Priority::EmergencyServer
        );
        assert!("admin".parse::<Priority>().is_err());
        assert_eq!(Priority::NormalServer.to_string(), "normal_server");
    }
}
