//! Video configuration
//!
//! This module provides:
//! - `VideoConfiguration`, resolved through its own policy chain
//! - `VideoConfigApplier`, which reconfigures the video engine from diffs

pub mod applier;
pub mod configuration;

pub use applier::{EncoderSettings, VideoApplyReport, VideoCommand, VideoConfigApplier, VideoEngine};
pub use configuration::{
    DegradationPreference, MirrorMode, OrientationMode, VideoCodecType, VideoConfiguration,
    VideoConfigurationChain,
};
