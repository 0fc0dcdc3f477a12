//! System event types
//!
//! Defines all event types that can be broadcast through the event bus.

use serde::{Deserialize, Serialize};

use crate::config::Priority;

/// Configuration domain an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDomain {
    Audio,
    Video,
    Session,
}

impl std::fmt::Display for ConfigDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigDomain::Audio => write!(f, "audio"),
            ConfigDomain::Video => write!(f, "video"),
            ConfigDomain::Session => write!(f, "session"),
        }
    }
}

/// System event
///
/// Serialized as:
/// ```json
/// {
///   "event": "config.resolved",
///   "data": { "domain": "audio", "priority": "user", "changed": ["playout_volume"] }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    /// A write produced a new resolved value
    #[serde(rename = "config.resolved")]
    ConfigResolved {
        domain: ConfigDomain,
        /// Priority level that was written
        priority: Priority,
        /// Fields whose resolved value changed
        changed: Vec<String>,
    },

    /// A resolved change was stored but not applied yet
    ///
    /// The consumer applies it once the engine is attached.
    #[serde(rename = "config.apply_deferred")]
    ApplyDeferred { domain: ConfigDomain, reason: String },

    /// Recording/playout were stopped and restarted to reconfigure hardware
    #[serde(rename = "audio.device_restarted")]
    AudioDeviceRestarted {
        /// Commands the engine rejected during the pass
        failed_commands: usize,
    },

    /// The video encoder instance was recreated
    #[serde(rename = "video.encoder_recreated")]
    VideoEncoderRecreated {
        codec: String,
        resolution: (u32, u32),
    },
}

impl SystemEvent {
    /// Event name as serialized in the `event` tag
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ConfigResolved { .. } => "config.resolved",
            Self::ApplyDeferred { .. } => "config.apply_deferred",
            Self::AudioDeviceRestarted { .. } => "audio.device_restarted",
            Self::VideoEncoderRecreated { .. } => "video.encoder_recreated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SystemEvent::ConfigResolved {
            domain: ConfigDomain::Audio,
            priority: Priority::User,
            changed: vec!["playout_volume".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.event_name());
        assert_eq!(json["data"]["domain"], "audio");
        assert_eq!(json["data"]["priority"], "user");
    }
}
