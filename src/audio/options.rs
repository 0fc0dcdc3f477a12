//! Audio engine options
//!
//! `AudioOptions` covers the audio device module (ADM), the audio processing
//! module (APM) and the send-side encoder. Hardware AEC and software AEC are
//! mutually exclusive; switching between them needs a device restart.

use serde::{Deserialize, Serialize};

use crate::config::{policy_config, ConfigPolicyChain, DeviceProfile};
use crate::error::Result;

/// Audio usage scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioScenario {
    Default,
    /// Voice chat between players
    ChatRoom,
    /// Game audio playback with optional voice uplink
    GameStreaming,
    /// Music-grade playback
    HighDefinition,
}

/// Automatic gain control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgcMode {
    AdaptiveAnalog,
    AdaptiveDigital,
    FixedDigital,
}

/// Send-side audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Opus,
    AacLc,
    G722,
    Pcmu,
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCodec::Opus => write!(f, "opus"),
            AudioCodec::AacLc => write!(f, "aac-lc"),
            AudioCodec::G722 => write!(f, "g722"),
            AudioCodec::Pcmu => write!(f, "pcmu"),
        }
    }
}

policy_config! {
    /// Audio engine options, one field per tunable
    pub struct AudioOptions {
        audio_scenario: AudioScenario = AudioScenario::GameStreaming,
        /// Local microphone track is published
        has_published_stream: bool = false,
        /// At least one remote audio track is subscribed
        has_subscribed_stream: bool = true,
        enable_recording: bool = true,
        enable_playout: bool = true,

        adm_use_hw_aec: bool = false,
        adm_use_hw_agc: bool = false,
        adm_use_hw_ns: bool = false,
        /// Platform voice-chat mode (voice processing I/O)
        adm_chat_mode: bool = false,
        adm_input_sample_rate: u32 = 48000,
        adm_output_sample_rate: u32 = 48000,
        adm_stereo_playout: bool = true,

        apm_enable_aec: bool = true,
        apm_aec_delay_offset_ms: i32 = 0,
        /// 0 = low, 1 = moderate, 2 = high
        apm_aec_suppression_level: i32 = 1,
        apm_aec_nlp_aggressiveness: i32 = 1,
        apm_enable_ns: bool = true,
        apm_ns_level: i32 = 2,
        apm_enable_agc: bool = true,
        apm_agc_target_level_dbfs: i32 = 3,
        apm_agc_compression_gain_db: i32 = 9,
        apm_agc_mode: AgcMode = AgcMode::AdaptiveDigital,
        apm_enable_highpass_filter: bool = true,
        apm_enable_tone_remover: bool = false,
        apm_enable_pitch_smoother: bool = false,
        apm_enable_howling_control: bool = false,

        /// 0-400, 100 = unity gain
        playout_volume: u32 = 100,
        recording_volume: u32 = 100,

        encoder_codec: AudioCodec = AudioCodec::Opus,
        encoder_bitrate_bps: u32 = 64000,
        encoder_sample_rate: u32 = 48000,
        encoder_channels: u32 = 2,
        encoder_enable_dtx: bool = false,
    }
}

/// Policy chain resolving [`AudioOptions`]
pub type AudioOptionsChain = ConfigPolicyChain<AudioOptions>;

impl AudioOptions {
    /// Chain with internal defaults and the device snapshot for `profile`
    pub fn chain(profile: &DeviceProfile) -> Result<AudioOptionsChain> {
        ConfigPolicyChain::new(
            "audio_options",
            Self::internal_defaults(),
            Self::query_system_value(profile),
        )
    }

    /// Device-derived values
    pub fn query_system_value(profile: &DeviceProfile) -> Self {
        let mut options = Self::default();
        if profile.platform.is_mobile() && profile.hw_aec_available {
            options.adm_use_hw_aec.set(true);
            options.adm_use_hw_ns.set(true);
        }
        if profile.is_low_power() {
            options.encoder_channels.set(1);
            options.apm_enable_pitch_smoother.set(false);
        }
        options
    }

    /// Whether applying `diff` needs the audio device stopped and restarted
    ///
    /// Hardware and software AEC cannot be swapped on a running device, and
    /// the same holds for chat mode and the device stream format.
    pub fn requires_device_restart(diff: &AudioOptions) -> bool {
        diff.adm_use_hw_aec.has_value()
            || diff.adm_chat_mode.has_value()
            || diff.adm_input_sample_rate.has_value()
            || diff.adm_output_sample_rate.has_value()
            || diff.adm_stereo_playout.has_value()
    }

    fn flag(field: &crate::config::OptionalField<bool>) -> bool {
        field.copied().unwrap_or(false)
    }

    /// Recording should run: enabled and something is published
    pub fn recording_wanted(&self) -> bool {
        Self::flag(&self.enable_recording) && Self::flag(&self.has_published_stream)
    }

    /// Playout should run: enabled and something is subscribed
    pub fn playout_wanted(&self) -> bool {
        Self::flag(&self.enable_playout) && Self::flag(&self.has_subscribed_stream)
    }

    /// Software AEC runs only when the built-in one is off
    pub fn software_aec_enabled(&self) -> bool {
        Self::flag(&self.apm_enable_aec) && !Self::flag(&self.adm_use_hw_aec)
    }

    pub fn software_agc_enabled(&self) -> bool {
        Self::flag(&self.apm_enable_agc) && !Self::flag(&self.adm_use_hw_agc)
    }

    pub fn software_ns_enabled(&self) -> bool {
        Self::flag(&self.apm_enable_ns) && !Self::flag(&self.adm_use_hw_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Platform, PolicyConfig, Priority};

    fn desktop() -> DeviceProfile {
        DeviceProfile {
            platform: Platform::Windows,
            cpu_cores: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_cover_every_field() {
        let defaults = AudioOptions::internal_defaults();
        assert_eq!(
            defaults.present_fields().len(),
            AudioOptions::field_names().len()
        );
    }

    #[test]
    fn test_desktop_probe_is_empty() {
        assert!(AudioOptions::query_system_value(&desktop()).is_empty());
    }

    #[test]
    fn test_mobile_probe_prefers_hw_aec() {
        let profile = DeviceProfile {
            platform: Platform::Android,
            cpu_cores: 8,
            hw_aec_available: true,
            ..Default::default()
        };
        let chain = AudioOptions::chain(&profile).unwrap();
        let resolved = chain.get_final();
        assert_eq!(resolved.adm_use_hw_aec.copied(), Some(true));
        assert!(!resolved.software_aec_enabled());
        assert!(resolved.software_agc_enabled());
    }

    #[test]
    fn test_device_slot_outranks_user() {
        let profile = DeviceProfile {
            cpu_cores: 2,
            ..desktop()
        };
        let mut chain = AudioOptions::chain(&profile).unwrap();
        chain.set_value(
            Priority::User,
            AudioOptions {
                encoder_channels: 2.into(),
                encoder_bitrate_bps: 96000.into(),
                ..Default::default()
            },
        );
        assert_eq!(chain.get_final().encoder_channels.copied(), Some(1));
        assert_eq!(chain.get_final().encoder_bitrate_bps.copied(), Some(96000));
    }

    #[test]
    fn test_restart_rule() {
        let volume_only = AudioOptions {
            playout_volume: 80.into(),
            ..Default::default()
        };
        assert!(!AudioOptions::requires_device_restart(&volume_only));

        let hw_aec = AudioOptions {
            adm_use_hw_aec: true.into(),
            ..Default::default()
        };
        assert!(AudioOptions::requires_device_restart(&hw_aec));
    }

    #[test]
    fn test_wanted_paths() {
        let mut options = AudioOptions::internal_defaults();
        assert!(!options.recording_wanted());
        assert!(options.playout_wanted());
        options.has_published_stream.set(true);
        assert!(options.recording_wanted());
        options.enable_playout.set(false);
        assert!(!options.playout_wanted());
    }
}
