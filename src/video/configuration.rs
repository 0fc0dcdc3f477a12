//! Video encoder configuration

use serde::{Deserialize, Serialize};

use crate::config::{policy_config, ConfigPolicyChain, DeviceProfile};
use crate::error::Result;

/// Supported video codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodecType {
    H264,
    H265,
    VP8,
    VP9,
    AV1,
}

impl VideoCodecType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoCodecType::H264 => "H.264",
            VideoCodecType::H265 => "H.265/HEVC",
            VideoCodecType::VP8 => "VP8",
            VideoCodecType::VP9 => "VP9",
            VideoCodecType::AV1 => "AV1",
        }
    }
}

impl std::fmt::Display for VideoCodecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    Adaptive,
    FixedLandscape,
    FixedPortrait,
}

/// What to sacrifice first under bandwidth pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationPreference {
    MaintainQuality,
    MaintainFramerate,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    Auto,
    Enabled,
    Disabled,
}

policy_config! {
    /// Video encoder and pipeline configuration
    pub struct VideoConfiguration {
        codec: VideoCodecType = VideoCodecType::H264,
        width: u32 = 1920,
        height: u32 = 1080,
        frame_rate: u32 = 60,
        min_frame_rate: u32 = 15,
        bitrate_kbps: u32 = 8000,
        min_bitrate_kbps: u32 = 1000,
        orientation_mode: OrientationMode = OrientationMode::FixedLandscape,
        degradation_preference: DegradationPreference = DegradationPreference::MaintainFramerate,
        mirror_mode: MirrorMode = MirrorMode::Disabled,
        hw_encoder_accelerating: bool = true,
        hw_decoder_accelerating: bool = true,
        /// Frame dimensions are padded to a multiple of this
        encode_alignment: u32 = 2,
        key_frame_interval_ms: u32 = 2000,
        enable_low_latency: bool = true,
        /// Tune the encoder for desktop/game content rather than camera
        screen_content_hint: bool = true,
    }
}

/// Policy chain resolving [`VideoConfiguration`]
pub type VideoConfigurationChain = ConfigPolicyChain<VideoConfiguration>;

impl VideoConfiguration {
    pub fn chain(profile: &DeviceProfile) -> Result<VideoConfigurationChain> {
        ConfigPolicyChain::new(
            "video_configuration",
            Self::internal_defaults(),
            Self::query_system_value(profile),
        )
    }

    /// Device-derived values
    pub fn query_system_value(profile: &DeviceProfile) -> Self {
        let mut config = Self::default();
        if !profile.hw_video_encoder {
            config.hw_encoder_accelerating.set(false);
        }
        if !profile.hw_video_decoder {
            config.hw_decoder_accelerating.set(false);
        }
        if profile.is_low_power() {
            config.frame_rate.set(30);
            config.width.set(1280);
            config.height.set(720);
        }
        config
    }

    /// Resolution as (width, height), if both are known
    pub fn resolution(&self) -> Option<(u32, u32)> {
        Some((self.width.copied()?, self.height.copied()?))
    }
}
