//! Platform audio session configuration
//!
//! Session-level settings (category options, preferred hardware format,
//! activation) are resolved through their own policy chain and pushed to the
//! platform audio subsystem by [`AudioSessionBridge`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{policy_config, ConfigPolicyChain, DeviceProfile, PolicyConfig};
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;

policy_config! {
    /// Audio session configuration
    pub struct AudioSessionConfiguration {
        /// Record and play at the same time (otherwise playback only)
        playback_and_record: bool = true,
        /// Voice-chat session mode
        chat_mode: bool = false,
        allow_bluetooth: bool = false,
        allow_bluetooth_a2dp: bool = true,
        default_to_speaker: bool = false,
        mix_with_others: bool = true,
        duck_others: bool = false,
        preferred_sample_rate: u32 = 48000,
        io_buffer_duration_ms: u32 = 10,
        input_channels: u32 = 1,
        output_channels: u32 = 2,
        /// Input gain, 0.0 - 1.0 scaled to 0 - 100
        input_gain: u32 = 100,
        active: bool = true,
    }
}

/// Policy chain resolving [`AudioSessionConfiguration`]
pub type AudioSessionChain = ConfigPolicyChain<AudioSessionConfiguration>;

impl AudioSessionConfiguration {
    pub fn chain(profile: &DeviceProfile) -> Result<AudioSessionChain> {
        ConfigPolicyChain::new(
            "audio_session",
            Self::internal_defaults(),
            Self::query_system_value(profile),
        )
    }

    /// Device-derived values
    pub fn query_system_value(profile: &DeviceProfile) -> Self {
        let mut config = Self::default();
        if profile.platform.is_mobile() {
            config.default_to_speaker.set(true);
            config.io_buffer_duration_ms.set(20);
        }
        config
    }

    /// Category options derived from the category flags
    pub fn category(&self) -> SessionCategory {
        let flag = |f: &crate::config::OptionalField<bool>| f.copied().unwrap_or(false);
        SessionCategory {
            playback_and_record: flag(&self.playback_and_record),
            chat_mode: flag(&self.chat_mode),
            allow_bluetooth: flag(&self.allow_bluetooth),
            allow_bluetooth_a2dp: flag(&self.allow_bluetooth_a2dp),
            default_to_speaker: flag(&self.default_to_speaker),
            mix_with_others: flag(&self.mix_with_others),
            duck_others: flag(&self.duck_others),
        }
    }

    fn category_changed(diff: &Self) -> bool {
        diff.playback_and_record.has_value()
            || diff.chat_mode.has_value()
            || diff.allow_bluetooth.has_value()
            || diff.allow_bluetooth_a2dp.has_value()
            || diff.default_to_speaker.has_value()
            || diff.mix_with_others.has_value()
            || diff.duck_others.has_value()
    }
}

/// Complete category setting; the platform takes all options at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCategory {
    pub playback_and_record: bool,
    pub chat_mode: bool,
    pub allow_bluetooth: bool,
    pub allow_bluetooth_a2dp: bool,
    pub default_to_speaker: bool,
    pub mix_with_others: bool,
    pub duck_others: bool,
}

/// Commands accepted by the platform audio session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    SetCategory(SessionCategory),
    SetPreferredSampleRate(u32),
    SetIoBufferDuration(u32),
    SetInputChannels(u32),
    SetOutputChannels(u32),
    SetInputGain(u32),
    SetActive(bool),
}

/// Platform audio subsystem
pub trait PlatformAudioSession: Send + Sync {
    fn execute(&self, command: SessionCommand) -> Result<()>;
}

/// Outcome of one session apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionApplyReport {
    pub issued: usize,
    /// Commands the platform rejected
    pub failed: usize,
}

/// Pushes session configuration changes to the platform
pub struct AudioSessionBridge {
    session: Option<Arc<dyn PlatformAudioSession>>,
    throttler: LogThrottler,
}

impl AudioSessionBridge {
    pub fn new() -> Self {
        Self {
            session: None,
            throttler: LogThrottler::with_secs(5),
        }
    }

    pub fn set_session(&mut self, session: Arc<dyn PlatformAudioSession>) {
        self.session = Some(session);
        self.throttler.clear("audio_session_unavailable");
    }

    pub fn is_apply_available(&self) -> bool {
        self.session.is_some()
    }

    /// Apply the changed fields in `diff`
    ///
    /// A rejected command does not stop the pass; it is counted in the report.
    pub fn apply(
        &self,
        diff: &AudioSessionConfiguration,
        resolved: &AudioSessionConfiguration,
    ) -> Result<SessionApplyReport> {
        let Some(session) = &self.session else {
            if self.throttler.should_log("audio_session_unavailable") {
                warn!("Platform audio session not ready, deferring session config");
            }
            return Err(AppError::ServiceUnavailable(
                "audio session not attached".to_string(),
            ));
        };

        let mut commands = Vec::new();
        // Deactivate before reconfiguring, activate after
        if diff.active.copied() == Some(false) {
            commands.push(SessionCommand::SetActive(false));
        }
        if AudioSessionConfiguration::category_changed(diff) {
            commands.push(SessionCommand::SetCategory(resolved.category()));
        }
        if let Some(v) = diff.preferred_sample_rate.copied() {
            commands.push(SessionCommand::SetPreferredSampleRate(v));
        }
        if let Some(v) = diff.io_buffer_duration_ms.copied() {
            commands.push(SessionCommand::SetIoBufferDuration(v));
        }
        if let Some(v) = diff.input_channels.copied() {
            commands.push(SessionCommand::SetInputChannels(v));
        }
        if let Some(v) = diff.output_channels.copied() {
            commands.push(SessionCommand::SetOutputChannels(v));
        }
        if let Some(v) = diff.input_gain.copied() {
            commands.push(SessionCommand::SetInputGain(v));
        }
        if diff.active.copied() == Some(true) {
            commands.push(SessionCommand::SetActive(true));
        }

        let mut report = SessionApplyReport {
            issued: commands.len(),
            failed: 0,
        };
        for command in commands {
            match session.execute(command) {
                Ok(()) => debug!("Audio session command {:?} ok", command),
                Err(e) => {
                    report.failed += 1;
                    warn!("Audio session command {:?} failed: {}", command, e);
                }
            }
        }
        if report.issued > 0 {
            info!(
                "Audio session updated: {:?} ({} failed)",
                diff.present_fields(),
                report.failed
            );
        }
        Ok(report)
    }
}

impl Default for AudioSessionBridge {
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
    pub struct MockSession {
        pub commands: Mutex<Vec<SessionCommand>>,
        pub fail_sample_rate: AtomicBool,
    }

    impl PlatformAudioSession for MockSession {
        fn execute(&self, command: SessionCommand) -> Result<()> {
            self.commands.lock().push(command);
            if matches!(command, SessionCommand::SetPreferredSampleRate(_))
                && self.fail_sample_rate.load(Ordering::SeqCst)
            {
                return Err(AppError::AudioError("sample rate not supported".to_string()));
            }
            Ok(())
        }
    }
}
