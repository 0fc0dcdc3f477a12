//! Audio options executor
//!
//! Turns a resolved [`AudioOptions`] diff into the smallest set of calls on
//! the audio device module (ADM), the audio processing module (APM) and the
//! audio encoder. Only fields present in the diff are touched; the device is
//! restarted only when a hardware-affecting field changed.

use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::options::{AgcMode, AudioCodec, AudioOptions, AudioScenario};
use crate::config::PolicyConfig;
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;

/// Commands accepted by the audio device module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    StartRecording,
    StopRecording,
    StartPlayout,
    StopPlayout,
    /// Enable the platform (built-in) echo canceller
    SetHardwareAec(bool),
    SetChatMode(bool),
    EnableBuiltInAgc(bool),
    EnableBuiltInNs(bool),
    SetSampleRates { input: u32, output: u32 },
    SetStereoPlayout(bool),
    SetPlayoutVolume(u32),
    SetRecordingVolume(u32),
}

/// Commands accepted by the audio processing module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingCommand {
    SetScenario(AudioScenario),
    EnableAec(bool),
    SetAecDelayOffset(i32),
    SetAecSuppressionLevel(i32),
    SetAecNlpAggressiveness(i32),
    EnableNs(bool),
    SetNsLevel(i32),
    EnableAgc(bool),
    SetAgcTargetLevel(i32),
    SetAgcCompressionGain(i32),
    SetAgcMode(AgcMode),
    EnableHighpassFilter(bool),
    EnableToneRemover(bool),
    EnablePitchSmoother(bool),
    EnableHowlingControl(bool),
}

/// Commands accepted by the send-side audio encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderCommand {
    SetCodec(AudioCodec),
    SetBitrate(u32),
    SetSampleRate(u32),
    SetChannels(u32),
    EnableDtx(bool),
}

/// Audio device module of the media engine
pub trait AudioDeviceModule: Send + Sync {
    fn execute(&self, command: DeviceCommand) -> Result<()>;
    fn is_recording(&self) -> bool;
    fn is_playing(&self) -> bool;
}

/// Audio processing module of the media engine
pub trait AudioProcessingModule: Send + Sync {
    fn execute(&self, command: ProcessingCommand) -> Result<()>;
}

/// Audio encoder of the media engine
pub trait AudioEncoderControl: Send + Sync {
    fn execute(&self, command: EncoderCommand) -> Result<()>;
}

/// Outcome of one apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Commands sent to the engine
    pub issued: usize,
    /// Commands the engine rejected
    pub failed: usize,
    /// Recording/playout were stopped to reconfigure the device
    pub restarted: bool,
}

const UNAVAILABLE_KEY: &str = "audio_options_unavailable";

/// Applies resolved audio options to the media engine
pub struct AudioOptionsExecutor {
    adm: Option<Arc<dyn AudioDeviceModule>>,
    apm: Option<Arc<dyn AudioProcessingModule>>,
    encoder: Option<Arc<dyn AudioEncoderControl>>,
    throttler: LogThrottler,
}

impl AudioOptionsExecutor {
    /// Executor with no engine handles attached yet
    pub fn new() -> Self {
        Self {
            adm: None,
            apm: None,
            encoder: None,
            throttler: LogThrottler::with_secs(5),
        }
    }

    pub fn set_device_module(&mut self, adm: Arc<dyn AudioDeviceModule>) {
        self.adm = Some(adm);
        self.throttler.clear(UNAVAILABLE_KEY);
    }

    pub fn set_processing_module(&mut self, apm: Arc<dyn AudioProcessingModule>) {
        self.apm = Some(apm);
        self.throttler.clear(UNAVAILABLE_KEY);
    }

    pub fn set_encoder(&mut self, encoder: Arc<dyn AudioEncoderControl>) {
        self.encoder = Some(encoder);
        self.throttler.clear(UNAVAILABLE_KEY);
    }

    /// Drop all engine handles (engine teardown)
    pub fn detach(&mut self) {
        self.adm = None;
        self.apm = None;
        self.encoder = None;
    }

    /// Every engine handle is attached
    pub fn is_apply_available(&self) -> bool {
        self.adm.is_some() && self.apm.is_some() && self.encoder.is_some()
    }

    /// Apply the changed fields in `diff`; `resolved` is the full final value
    ///
    /// For the initial application pass the full resolved value as `diff`.
    /// Returns `ServiceUnavailable` without issuing anything when the engine
    /// is not fully constructed; the caller can retry later.
    pub fn apply(&self, diff: &AudioOptions, resolved: &AudioOptions) -> Result<ApplyReport> {
        let (Some(adm), Some(apm), Some(encoder)) = (&self.adm, &self.apm, &self.encoder) else {
            if self.throttler.should_log(UNAVAILABLE_KEY) {
                warn!("Audio pipeline not ready, deferring audio options");
            }
            return Err(AppError::ServiceUnavailable(
                "audio pipeline not constructed".to_string(),
            ));
        };

        if diff.is_empty() {
            debug!("Audio options unchanged, nothing to apply");
            return Ok(ApplyReport::default());
        }

        let mut sink = CommandSink {
            adm: adm.as_ref(),
            apm: apm.as_ref(),
            encoder: encoder.as_ref(),
            report: ApplyReport::default(),
        };

        let was_recording = adm.is_recording();
        let was_playing = adm.is_playing();
        let restart = AudioOptions::requires_device_restart(diff);

        // Step 1: hardware reconfiguration with the device stopped
        if restart {
            info!(
                "Restarting audio device for {:?}",
                diff.present_fields()
                    .into_iter()
                    .filter(|f| f.starts_with("adm_"))
                    .collect::<Vec<_>>()
            );
            if was_recording {
                sink.device(DeviceCommand::StopRecording);
            }
            if was_playing {
                sink.device(DeviceCommand::StopPlayout);
            }
            if let Some(enable) = diff.adm_use_hw_aec.copied() {
                sink.device(DeviceCommand::SetHardwareAec(enable));
            }
            if let Some(enable) = diff.adm_chat_mode.copied() {
                sink.device(DeviceCommand::SetChatMode(enable));
            }
            if diff.adm_input_sample_rate.has_value() || diff.adm_output_sample_rate.has_value() {
                if let (Some(input), Some(output)) = (
                    resolved.adm_input_sample_rate.copied(),
                    resolved.adm_output_sample_rate.copied(),
                ) {
                    sink.device(DeviceCommand::SetSampleRates { input, output });
                }
            }
            if let Some(stereo) = diff.adm_stereo_playout.copied() {
                sink.device(DeviceCommand::SetStereoPlayout(stereo));
            }
            sink.report.restarted = true;
        }

        // Step 2: built-in processing, software fallback only when built-in is off
        if let Some(enable) = diff.adm_use_hw_agc.copied() {
            sink.device(DeviceCommand::EnableBuiltInAgc(enable));
        }
        if let Some(enable) = diff.adm_use_hw_ns.copied() {
            sink.device(DeviceCommand::EnableBuiltInNs(enable));
        }
        if diff.apm_enable_aec.has_value() || diff.adm_use_hw_aec.has_value() {
            sink.processing(ProcessingCommand::EnableAec(resolved.software_aec_enabled()));
        }
        if diff.apm_enable_agc.has_value() || diff.adm_use_hw_agc.has_value() {
            sink.processing(ProcessingCommand::EnableAgc(resolved.software_agc_enabled()));
        }
        if diff.apm_enable_ns.has_value() || diff.adm_use_hw_ns.has_value() {
            sink.processing(ProcessingCommand::EnableNs(resolved.software_ns_enabled()));
        }

        // Step 3: processing parameters
        if let Some(scenario) = diff.audio_scenario.copied() {
            sink.processing(ProcessingCommand::SetScenario(scenario));
        }
        if let Some(v) = diff.apm_aec_delay_offset_ms.copied() {
            sink.processing(ProcessingCommand::SetAecDelayOffset(v));
        }
        if let Some(v) = diff.apm_aec_suppression_level.copied() {
            sink.processing(ProcessingCommand::SetAecSuppressionLevel(v));
        }
        if let Some(v) = diff.apm_aec_nlp_aggressiveness.copied() {
            sink.processing(ProcessingCommand::SetAecNlpAggressiveness(v));
        }
        if let Some(v) = diff.apm_ns_level.copied() {
            sink.processing(ProcessingCommand::SetNsLevel(v));
        }
        if let Some(v) = diff.apm_agc_target_level_dbfs.copied() {
            sink.processing(ProcessingCommand::SetAgcTargetLevel(v));
        }
        if let Some(v) = diff.apm_agc_compression_gain_db.copied() {
            sink.processing(ProcessingCommand::SetAgcCompressionGain(v));
        }
        if let Some(mode) = diff.apm_agc_mode.copied() {
            sink.processing(ProcessingCommand::SetAgcMode(mode));
        }
        if let Some(v) = diff.apm_enable_highpass_filter.copied() {
            sink.processing(ProcessingCommand::EnableHighpassFilter(v));
        }
        if let Some(v) = diff.apm_enable_tone_remover.copied() {
            sink.processing(ProcessingCommand::EnableToneRemover(v));
        }
        if let Some(v) = diff.apm_enable_pitch_smoother.copied() {
            sink.processing(ProcessingCommand::EnablePitchSmoother(v));
        }
        if let Some(v) = diff.apm_enable_howling_control.copied() {
            sink.processing(ProcessingCommand::EnableHowlingControl(v));
        }

        // Step 4: recording/playout state as the device reports it after step 1
        let recording = adm.is_recording();
        if resolved.recording_wanted() != recording {
            sink.device(if recording {
                DeviceCommand::StopRecording
            } else {
                DeviceCommand::StartRecording
            });
        }
        let playing = adm.is_playing();
        if resolved.playout_wanted() != playing {
            sink.device(if playing {
                DeviceCommand::StopPlayout
            } else {
                DeviceCommand::StartPlayout
            });
        }

        // Step 5: volumes
        if let Some(v) = diff.playout_volume.copied() {
            sink.device(DeviceCommand::SetPlayoutVolume(v));
        }
        if let Some(v) = diff.recording_volume.copied() {
            sink.device(DeviceCommand::SetRecordingVolume(v));
        }

        // Step 6: encoder
        if let Some(codec) = diff.encoder_codec.copied() {
            sink.encoder(EncoderCommand::SetCodec(codec));
        }
        if let Some(v) = diff.encoder_bitrate_bps.copied() {
            sink.encoder(EncoderCommand::SetBitrate(v));
        }
        if let Some(v) = diff.encoder_sample_rate.copied() {
            sink.encoder(EncoderCommand::SetSampleRate(v));
        }
        if let Some(v) = diff.encoder_channels.copied() {
            sink.encoder(EncoderCommand::SetChannels(v));
        }
        if let Some(v) = diff.encoder_enable_dtx.copied() {
            sink.encoder(EncoderCommand::EnableDtx(v));
        }

        let report = sink.report;
        info!(
            "Audio options applied: {} commands, {} failed, restarted={}",
            report.issued, report.failed, report.restarted
        );
        Ok(report)
    }
}

impl Default for AudioOptionsExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct CommandSink<'a> {
    adm: &'a dyn AudioDeviceModule,
    apm: &'a dyn AudioProcessingModule,
    encoder: &'a dyn AudioEncoderControl,
    report: ApplyReport,
}

impl CommandSink<'_> {
    fn device(&mut self, command: DeviceCommand) {
        let result = self.adm.execute(command);
        self.record(command, result);
    }

    fn processing(&mut self, command: ProcessingCommand) {
        let result = self.apm.execute(command);
        self.record(command, result);
    }

    fn encoder(&mut self, command: EncoderCommand) {
        let result = self.encoder.execute(command);
        self.record(command, result);
    }

    fn record(&mut self, command: impl Debug, result: Result<()>) {
        self.report.issued += 1;
        match result {
            Ok(()) => debug!("Audio command {:?} ok", command),
            Err(e) => {
                self.report.failed += 1;
                warn!("Audio command {:?} failed: {}", command, e);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockEngine;
    use super::*;
    use crate::config::Priority;

    fn setup() -> (AudioOptionsExecutor, MockEngine) {
        let engine = MockEngine::new();
        let mut executor = AudioOptionsExecutor::new();
        engine.attach(&mut executor);
        (executor, engine)
    }

    #[test]
    fn test_unavailable_without_handles() {
        let executor = AudioOptionsExecutor::new();
        let resolved = AudioOptions::internal_defaults();
        let err = executor.apply(&resolved, &resolved).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_partial_handles_still_unavailable() {
        let engine = MockEngine::new();
        let mut executor = AudioOptionsExecutor::new();
        executor.set_device_module(engine.adm.clone());
        assert!(!executor.is_apply_available());
        let resolved = AudioOptions::internal_defaults();
        assert!(executor.apply(&resolved, &resolved).is_err());
        assert!(engine.adm.commands.lock().is_empty());
    }

    #[test]
    fn test_initial_apply_configures_everything() {
        let (executor, engine) = setup();
        let resolved = AudioOptions::internal_defaults();
        let report = executor.apply(&resolved, &resolved).unwrap();

        assert!(report.restarted);
        assert_eq!(report.failed, 0);
        let device = engine.adm.commands.lock().clone();
        assert!(device.contains(&DeviceCommand::SetHardwareAec(false)));
        assert!(device.contains(&DeviceCommand::SetSampleRates {
            input: 48000,
            output: 48000
        }));
        // Nothing published by default, only playout starts
        assert!(device.contains(&DeviceCommand::StartPlayout));
        assert!(!device.contains(&DeviceCommand::StartRecording));
        assert!(engine.apm.commands.lock().contains(&ProcessingCommand::EnableAec(true)));
        assert!(engine
            .encoder
            .commands
            .lock()
            .contains(&EncoderCommand::SetCodec(AudioCodec::Opus)));
    }

    #[test]
    fn test_volume_change_touches_only_volume() {
        let (executor, engine) = setup();
        let mut chain = AudioOptions::chain(&Default::default()).unwrap();
        let resolved = chain.get_final().clone();
        executor.apply(&resolved, &resolved).unwrap();
        engine.clear();

        chain.set_value(
            Priority::User,
            AudioOptions {
                playout_volume: 150.into(),
                ..Default::default()
            },
        );
        let diff = chain.diff_by_last_set_value().unwrap();
        let report = executor.apply(&diff, chain.get_final()).unwrap();

        assert!(!report.restarted);
        assert_eq!(report.issued, 1);
        assert_eq!(
            *engine.adm.commands.lock(),
            vec![DeviceCommand::SetPlayoutVolume(150)]
        );
        assert!(engine.apm.commands.lock().is_empty());
    }

    #[test]
    fn test_hw_aec_switch_restarts_device() {
        let (executor, engine) = setup();
        let mut chain = AudioOptions::chain(&Default::default()).unwrap();
        chain.set_value(
            Priority::Script,
            AudioOptions {
                has_published_stream: true.into(),
                ..Default::default()
            },
        );
        let resolved = chain.get_final().clone();
        chain.diff_by_last_set_value().unwrap();
        executor.apply(&resolved, &resolved).unwrap();
        assert!(engine.adm.is_recording());
        engine.clear();

        chain.set_value(
            Priority::EmergencyServer,
            AudioOptions {
                adm_use_hw_aec: true.into(),
                ..Default::default()
            },
        );
        let diff = chain.diff_by_last_set_value().unwrap();
        let report = executor.apply(&diff, chain.get_final()).unwrap();

        assert!(report.restarted);
        assert_eq!(
            *engine.adm.commands.lock(),
            vec![
                DeviceCommand::StopRecording,
                DeviceCommand::StopPlayout,
                DeviceCommand::SetHardwareAec(true),
                DeviceCommand::StartRecording,
                DeviceCommand::StartPlayout,
            ]
        );
        // Software AEC is switched off to avoid double processing
        assert_eq!(
            *engine.apm.commands.lock(),
            vec![ProcessingCommand::EnableAec(false)]
        );
    }

    #[test]
    fn test_unpublish_stops_recording() {
        let (executor, engine) = setup();
        let mut resolved = AudioOptions::internal_defaults();
        resolved.has_published_stream.set(true);
        executor.apply(&resolved, &resolved).unwrap();
        assert!(engine.adm.is_recording());
        engine.clear();

        let diff = AudioOptions {
            has_published_stream: false.into(),
            ..Default::default()
        };
        resolved.has_published_stream.set(false);
        executor.apply(&diff, &resolved).unwrap();
        assert_eq!(
            *engine.adm.commands.lock(),
            vec![DeviceCommand::StopRecording]
        );
    }

    #[test]
    fn test_failed_command_is_counted() {
        let (executor, engine) = setup();
        engine
            .adm
            .fail_volume
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let mut resolved = AudioOptions::internal_defaults();
        resolved.playout_volume.set(10);
        engine.adm.playing.store(true, std::sync::atomic::Ordering::SeqCst);
        let diff = AudioOptions {
            playout_volume: 10.into(),
            recording_volume: 90.into(),
            ..Default::default()
        };
        resolved.recording_volume.set(90);
        let report = executor.apply(&diff, &resolved).unwrap();
        assert_eq!(report.issued, 2);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_failed_stop_during_restart_does_not_restart_recording() {
        use std::sync::atomic::Ordering;

        let (executor, engine) = setup();
        let mut resolved = AudioOptions::internal_defaults();
        resolved.has_published_stream.set(true);
        executor.apply(&resolved, &resolved).unwrap();
        assert!(engine.adm.is_recording());
        assert!(engine.adm.is_playing());
        engine.clear();

        engine.adm.fail_stop_recording.store(true, Ordering::SeqCst);
        resolved.adm_chat_mode.set(true);
        let diff = AudioOptions {
            adm_chat_mode: true.into(),
            ..Default::default()
        };
        let report = executor.apply(&diff, &resolved).unwrap();

        assert!(report.restarted);
        assert_eq!(report.failed, 1);
        assert!(engine.adm.is_recording());
        assert_eq!(
            *engine.adm.commands.lock(),
            vec![
                DeviceCommand::StopRecording,
                DeviceCommand::StopPlayout,
                DeviceCommand::SetChatMode(true),
                DeviceCommand::StartPlayout,
            ]
        );
    }

    #[test]
    fn test_empty_diff_is_noop() {
        let (executor, engine) = setup();
        let report = executor
            .apply(&AudioOptions::default(), &AudioOptions::internal_defaults())
            .unwrap();
        assert_eq!(report, ApplyReport::default());
        assert!(engine.adm.commands.lock().is_empty());
    }
}
