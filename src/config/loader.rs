//! JSON loading for configuration layers
//!
//! Server pushes, script settings and layer files all arrive as JSON objects
//! whose keys are field names. Missing keys leave the field absent; a value of
//! the wrong type rejects the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::chain::PolicyConfig;
use super::priority::Priority;
use crate::audio::{AudioOptions, AudioSessionConfiguration};
use crate::error::{AppError, Result};
use crate::video::VideoConfiguration;

/// Read a configuration struct out of a JSON object
pub fn from_json_value<T>(value: &Value) -> Result<T>
where
    T: PolicyConfig + DeserializeOwned,
{
    if !value.is_object() {
        return Err(AppError::Config(format!(
            "expected a JSON object, got {}",
            json_kind(value)
        )));
    }
    serde_json::from_value(value.clone()).map_err(|e| AppError::Config(e.to_string()))
}

/// Read a configuration struct out of JSON text
pub fn from_json_str<T>(text: &str) -> Result<T>
where
    T: PolicyConfig + DeserializeOwned,
{
    let value: Value = serde_json::from_str(text)?;
    from_json_value(&value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Configuration sections carried by one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<AudioSessionConfiguration>,
}

impl ConfigSections {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(AppError::Config(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none() && self.session.is_none()
    }
}

/// A configuration file targeting one priority level
///
/// ```json
/// {
///   "priority": "user",
///   "audio": { "apm_enable_ns": true, "apm_ns_level": 2 },
///   "video": { "frame_rate": 60 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    pub priority: Priority,
    #[serde(flatten)]
    pub sections: ConfigSections,
}

impl LayerDocument {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load a layer file, optionally forcing its priority
    pub async fn load(path: &Path, priority: Option<Priority>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        match priority {
            Some(priority) => Ok(Self {
                priority,
                sections: ConfigSections::from_json_str(&text)?,
            }),
            None => Self::from_json_str(&text).map_err(|e| {
                AppError::Config(format!("{}: {}", path.display(), e))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AgcMode, AudioScenario};
    use std::io::Write;

    #[test]
    fn test_absent_keys_stay_absent() {
        let options: AudioOptions =
            from_json_str(r#"{"apm_enable_agc": true, "apm_agc_mode": "adaptive_digital"}"#)
                .unwrap();
        assert_eq!(options.present_fields(), vec!["apm_enable_agc", "apm_agc_mode"]);
        assert_eq!(options.apm_agc_mode.copied(), Some(AgcMode::AdaptiveDigital));
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(matches!(
            from_json_str::<AudioOptions>(r#"{"apm_ns_level": "loud"}"#),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            from_json_str::<AudioOptions>("[1, 2]"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            from_json_str::<AudioOptions>("{not json"),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let options: AudioOptions =
            from_json_str(r#"{"audio_scenario": "chat_room", "legacy_flag": 1}"#).unwrap();
        assert_eq!(options.audio_scenario.copied(), Some(AudioScenario::ChatRoom));
        assert_eq!(options.present_fields().len(), 1);
    }

    #[test]
    fn test_layer_document_sections() {
        let doc = LayerDocument::from_json_str(
            r#"{"priority": "emergency_server", "video": {"bitrate_kbps": 4000}}"#,
        )
        .unwrap();
        assert_eq!(doc.priority, Priority::EmergencyServer);
        assert!(doc.sections.audio.is_none());
        let video = doc.sections.video.unwrap();
        assert_eq!(video.bitrate_kbps.copied(), Some(4000));

        assert!(LayerDocument::from_json_str(r#"{"priority": "root"}"#).is_err());
    }

    #[tokio::test]
    async fn test_load_layer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"priority": "user", "session": {{"allow_bluetooth": true}}}}"#).unwrap();

        let doc = LayerDocument::load(&path, None).await.unwrap();
        assert_eq!(doc.priority, Priority::User);
        assert_eq!(
            doc.sections.session.unwrap().allow_bluetooth.copied(),
            Some(true)
        );

        // Forced priority reads the file as bare sections
        let forced = LayerDocument::load(&path, Some(Priority::Debug)).await.unwrap();
        assert_eq!(forced.priority, Priority::Debug);
    }
}
