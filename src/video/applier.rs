//! Video configuration applier
//!
//! Splits a [`VideoConfiguration`] diff into three kinds of work:
//! - encoder restart (codec, resolution, hardware acceleration, alignment)
//! - rate updates the running encoder accepts (bitrate, frame rate)
//! - preference updates that never touch the encoder instance

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::configuration::{
    DegradationPreference, MirrorMode, OrientationMode, VideoCodecType, VideoConfiguration,
};
use crate::config::PolicyConfig;
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;

/// Full encoder setup, sent when the encoder must be recreated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub codec: VideoCodecType,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub min_frame_rate: u32,
    pub bitrate_kbps: u32,
    pub min_bitrate_kbps: u32,
    pub hw_accelerated: bool,
    pub alignment: u32,
    pub key_frame_interval_ms: u32,
}

impl EncoderSettings {
    fn from_resolved(resolved: &VideoConfiguration) -> Result<Self> {
        Ok(Self {
            codec: *resolved.codec.value()?,
            width: *resolved.width.value()?,
            height: *resolved.height.value()?,
            frame_rate: *resolved.frame_rate.value()?,
            min_frame_rate: *resolved.min_frame_rate.value()?,
            bitrate_kbps: *resolved.bitrate_kbps.value()?,
            min_bitrate_kbps: *resolved.min_bitrate_kbps.value()?,
            hw_accelerated: *resolved.hw_encoder_accelerating.value()?,
            alignment: *resolved.encode_alignment.value()?,
            key_frame_interval_ms: *resolved.key_frame_interval_ms.value()?,
        })
    }
}

/// Commands accepted by the video engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCommand {
    RestartEncoder(EncoderSettings),
    SetBitrate { target_kbps: u32, min_kbps: u32 },
    SetFrameRate { target: u32, min: u32 },
    SetKeyFrameInterval(u32),
    SetDegradationPreference(DegradationPreference),
    SetOrientation(OrientationMode),
    SetMirror(MirrorMode),
    SetLowLatency(bool),
    SetScreenContentHint(bool),
    SetHardwareDecoding(bool),
}

/// Video side of the media engine
pub trait VideoEngine: Send + Sync {
    fn execute(&self, command: VideoCommand) -> Result<()>;
}

/// Outcome of one video apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoApplyReport {
    pub issued: usize,
    /// Commands the engine rejected
    pub failed: usize,
    pub encoder_restarted: bool,
}

/// Applies resolved video configuration to the video engine
pub struct VideoConfigApplier {
    engine: Option<Arc<dyn VideoEngine>>,
    throttler: LogThrottler,
}

impl VideoConfigApplier {
    pub fn new() -> Self {
        Self {
            engine: None,
            throttler: LogThrottler::with_secs(5),
        }
    }

    pub fn set_engine(&mut self, engine: Arc<dyn VideoEngine>) {
        self.engine = Some(engine);
        self.throttler.clear("video_engine_unavailable");
    }

    pub fn is_apply_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether `diff` needs a new encoder instance
    pub fn requires_encoder_restart(diff: &VideoConfiguration) -> bool {
        diff.codec.has_value()
            || diff.width.has_value()
            || diff.height.has_value()
            || diff.hw_encoder_accelerating.has_value()
            || diff.encode_alignment.has_value()
    }

    pub fn apply(
        &self,
        diff: &VideoConfiguration,
        resolved: &VideoConfiguration,
    ) -> Result<VideoApplyReport> {
        let Some(engine) = &self.engine else {
            if self.throttler.should_log("video_engine_unavailable") {
                warn!("Video engine not ready, deferring video configuration");
            }
            return Err(AppError::ServiceUnavailable(
                "video engine not constructed".to_string(),
            ));
        };

        let mut commands = Vec::new();
        let restart = Self::requires_encoder_restart(diff);

        if restart {
            let settings = EncoderSettings::from_resolved(resolved)?;
            info!(
                "Recreating video encoder: {} {}x{}@{} {}kbps (hw={})",
                settings.codec,
                settings.width,
                settings.height,
                settings.frame_rate,
                settings.bitrate_kbps,
                settings.hw_accelerated
            );
            commands.push(VideoCommand::RestartEncoder(settings));
        } else {
            if diff.bitrate_kbps.has_value() || diff.min_bitrate_kbps.has_value() {
                commands.push(VideoCommand::SetBitrate {
                    target_kbps: *resolved.bitrate_kbps.value()?,
                    min_kbps: *resolved.min_bitrate_kbps.value()?,
                });
            }
            if diff.frame_rate.has_value() || diff.min_frame_rate.has_value() {
                commands.push(VideoCommand::SetFrameRate {
                    target: *resolved.frame_rate.value()?,
                    min: *resolved.min_frame_rate.value()?,
                });
            }
            if let Some(v) = diff.key_frame_interval_ms.copied() {
                commands.push(VideoCommand::SetKeyFrameInterval(v));
            }
        }

        if let Some(v) = diff.degradation_preference.copied() {
            commands.push(VideoCommand::SetDegradationPreference(v));
        }
        if let Some(v) = diff.orientation_mode.copied() {
            commands.push(VideoCommand::SetOrientation(v));
        }
        if let Some(v) = diff.mirror_mode.copied() {
            commands.push(VideoCommand::SetMirror(v));
        }
        if let Some(v) = diff.enable_low_latency.copied() {
            commands.push(VideoCommand::SetLowLatency(v));
        }
        if let Some(v) = diff.screen_content_hint.copied() {
            commands.push(VideoCommand::SetScreenContentHint(v));
        }
        if let Some(v) = diff.hw_decoder_accelerating.copied() {
            commands.push(VideoCommand::SetHardwareDecoding(v));
        }

        let mut report = VideoApplyReport {
            issued: commands.len(),
            failed: 0,
            encoder_restarted: restart,
        };
        for command in commands {
            match engine.execute(command) {
                Ok(()) => debug!("Video command {:?} ok", command),
                Err(e) => {
                    report.failed += 1;
                    warn!("Video command {:?} failed: {}", command, e);
                }
            }
        }
        if report.issued > 0 {
            info!(
                "Video configuration applied: {:?} ({} failed)",
                diff.present_fields(),
                report.failed
            );
        }

        Ok(report)
    }
}

impl Default for VideoConfigApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct MockVideoEngine {
        pub commands: Mutex<Vec<VideoCommand>>,
        pub fail_restart: AtomicBool,
    }

    impl VideoEngine for MockVideoEngine {
        fn execute(&self, command: VideoCommand) -> Result<()> {
            self.commands.lock().push(command);
            if matches!(command, VideoCommand::RestartEncoder(_))
                && self.fail_restart.load(Ordering::SeqCst)
            {
                return Err(AppError::VideoError("encoder busy".to_string()));
            }
            Ok(())
        }
    }
}
