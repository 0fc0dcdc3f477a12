//! Composition root for configuration state
//!
//! `EngineContext` owns one policy chain per configuration domain together
//! with the consumer that applies it. It is created once at startup and
//! passed to whatever needs to read or write configuration.
//!
//! Every write runs set → diff → apply under the domain's lock, so a diff is
//! never split between two callers.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::{
    ApplyReport, AudioDeviceModule, AudioEncoderControl, AudioOptions, AudioOptionsChain,
    AudioOptionsExecutor, AudioProcessingModule, AudioSessionBridge, AudioSessionChain,
    AudioSessionConfiguration, PlatformAudioSession, SessionApplyReport,
};
use crate::config::{
    ConfigPolicyChain, ConfigSections, DeviceProfile, PolicyConfig, Priority,
};
use crate::error::{AppError, Result};
use crate::events::{ConfigDomain, EventBus, SystemEvent};
use crate::video::{
    VideoApplyReport, VideoConfigApplier, VideoConfiguration, VideoConfigurationChain,
    VideoEngine,
};

/// Result of routing one write to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome<R> {
    /// The resolved value did not change
    Unchanged,
    /// The consumer applied the change
    Applied(R),
    /// The consumer is not attached yet; the change is applied on attach
    Deferred,
}

impl<R> ApplyOutcome<R> {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

struct AudioState {
    chain: AudioOptionsChain,
    executor: AudioOptionsExecutor,
}

struct SessionState {
    chain: AudioSessionChain,
    bridge: AudioSessionBridge,
}

struct VideoState {
    chain: VideoConfigurationChain,
    applier: VideoConfigApplier,
}

/// Configuration state of one client instance
pub struct EngineContext {
    audio: Mutex<AudioState>,
    session: Mutex<SessionState>,
    video: Mutex<VideoState>,
    events: Arc<EventBus>,
}

impl EngineContext {
    /// Build all chains from their defaults and the probed device profile
    pub fn new(profile: &DeviceProfile, events: Arc<EventBus>) -> Result<Self> {
        info!(
            "Initializing configuration chains for {:?} ({} cores)",
            profile.platform, profile.cpu_cores
        );
        Ok(Self {
            audio: Mutex::new(AudioState {
                chain: AudioOptions::chain(profile)?,
                executor: AudioOptionsExecutor::new(),
            }),
            session: Mutex::new(SessionState {
                chain: AudioSessionConfiguration::chain(profile)?,
                bridge: AudioSessionBridge::new(),
            }),
            video: Mutex::new(VideoState {
                chain: VideoConfiguration::chain(profile)?,
                applier: VideoConfigApplier::new(),
            }),
            events,
        })
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Write audio options at `priority` and apply what changed
    pub fn set_audio_options(
        &self,
        priority: Priority,
        options: AudioOptions,
    ) -> Result<ApplyOutcome<ApplyReport>> {
        let mut state = self.audio.lock();
        let Some(diff) = self.resolve(&mut state.chain, ConfigDomain::Audio, priority, options)?
        else {
            return Ok(ApplyOutcome::Unchanged);
        };
        let result = state.executor.apply(&diff, state.chain.get_final());
        self.audio_outcome(result)
    }

    /// Write session configuration at `priority` and apply what changed
    pub fn set_session_configuration(
        &self,
        priority: Priority,
        config: AudioSessionConfiguration,
    ) -> Result<ApplyOutcome<SessionApplyReport>> {
        let mut state = self.session.lock();
        let Some(diff) = self.resolve(&mut state.chain, ConfigDomain::Session, priority, config)?
        else {
            return Ok(ApplyOutcome::Unchanged);
        };
        let result = state.bridge.apply(&diff, state.chain.get_final());
        self.outcome(ConfigDomain::Session, result)
    }

    /// Write video configuration at `priority` and apply what changed
    pub fn set_video_configuration(
        &self,
        priority: Priority,
        config: VideoConfiguration,
    ) -> Result<ApplyOutcome<VideoApplyReport>> {
        let mut state = self.video.lock();
        let Some(diff) = self.resolve(&mut state.chain, ConfigDomain::Video, priority, config)?
        else {
            return Ok(ApplyOutcome::Unchanged);
        };
        let result = state.applier.apply(&diff, state.chain.get_final());
        self.video_outcome(&state.chain, result)
    }

    /// Write every section present in `sections` at `priority`
    ///
    /// A failing domain does not keep the remaining sections from being
    /// written; the first error is returned once all of them ran.
    pub fn apply_sections(&self, priority: Priority, sections: ConfigSections) -> Result<()> {
        let mut first_error = None;
        if let Some(audio) = sections.audio {
            if let Err(e) = self.set_audio_options(priority, audio) {
                warn!("Audio section at {} priority failed: {}", priority, e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(session) = sections.session {
            if let Err(e) = self.set_session_configuration(priority, session) {
                warn!("Session section at {} priority failed: {}", priority, e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(video) = sections.video {
            if let Err(e) = self.set_video_configuration(priority, video) {
                warn!("Video section at {} priority failed: {}", priority, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Handle a configuration document pushed by the server
    ///
    /// The whole document is parsed before anything is written, so a
    /// malformed push leaves every chain untouched.
    pub fn handle_server_push(&self, body: &str, emergency: bool) -> Result<()> {
        let sections = ConfigSections::from_json_str(body)?;
        let priority = if emergency {
            Priority::EmergencyServer
        } else {
            Priority::NormalServer
        };
        info!("Server pushed configuration at {} priority", priority);
        self.apply_sections(priority, sections)
    }

    /// Attach the media engine's audio modules and apply the full resolved state
    pub fn attach_audio_engine(
        &self,
        adm: Arc<dyn AudioDeviceModule>,
        apm: Arc<dyn AudioProcessingModule>,
        encoder: Arc<dyn AudioEncoderControl>,
    ) -> Result<ApplyOutcome<ApplyReport>> {
        let mut state = self.audio.lock();
        state.executor.set_device_module(adm);
        state.executor.set_processing_module(apm);
        state.executor.set_encoder(encoder);
        let resolved = state.chain.get_final().clone();
        let result = state.executor.apply(&resolved, &resolved);
        self.audio_outcome(result)
    }

    /// Drop the audio modules (engine shutdown); later writes are deferred
    pub fn detach_audio_engine(&self) {
        self.audio.lock().executor.detach();
        debug!("Audio engine detached");
    }

    pub fn attach_audio_session(
        &self,
        session: Arc<dyn PlatformAudioSession>,
    ) -> Result<ApplyOutcome<SessionApplyReport>> {
        let mut state = self.session.lock();
        state.bridge.set_session(session);
        let resolved = state.chain.get_final().clone();
        let result = state.bridge.apply(&resolved, &resolved);
        self.outcome(ConfigDomain::Session, result)
    }

    pub fn attach_video_engine(
        &self,
        engine: Arc<dyn VideoEngine>,
    ) -> Result<ApplyOutcome<VideoApplyReport>> {
        let mut state = self.video.lock();
        state.applier.set_engine(engine);
        let resolved = state.chain.get_final().clone();
        let result = state.applier.apply(&resolved, &resolved);
        self.video_outcome(&state.chain, result)
    }

    pub fn audio_final(&self) -> AudioOptions {
        self.audio.lock().chain.get_final().clone()
    }

    pub fn session_final(&self) -> AudioSessionConfiguration {
        self.session.lock().chain.get_final().clone()
    }

    pub fn video_final(&self) -> VideoConfiguration {
        self.video.lock().chain.get_final().clone()
    }

    /// Run `f` against the audio options chain
    pub fn with_audio_chain<R>(&self, f: impl FnOnce(&AudioOptionsChain) -> R) -> R {
        f(&self.audio.lock().chain)
    }

    pub fn with_session_chain<R>(&self, f: impl FnOnce(&AudioSessionChain) -> R) -> R {
        f(&self.session.lock().chain)
    }

    pub fn with_video_chain<R>(&self, f: impl FnOnce(&VideoConfigurationChain) -> R) -> R {
        f(&self.video.lock().chain)
    }

    /// Store `value`, returning the resulting diff if anything changed
    fn resolve<T: PolicyConfig>(
        &self,
        chain: &mut ConfigPolicyChain<T>,
        domain: ConfigDomain,
        priority: Priority,
        value: T,
    ) -> Result<Option<T>> {
        if !chain.set_value(priority, value) {
            return Err(AppError::Config(format!(
                "{}: {} rejected write at {} priority",
                domain,
                chain.name(),
                priority
            )));
        }
        let diff = chain.diff_by_last_set_value()?;
        if diff.is_empty() {
            debug!("{} configuration unchanged after {} write", domain, priority);
            return Ok(None);
        }
        self.events.publish(SystemEvent::ConfigResolved {
            domain,
            priority,
            changed: diff.present_fields().into_iter().map(String::from).collect(),
        });
        Ok(Some(diff))
    }

    fn outcome<R>(&self, domain: ConfigDomain, result: Result<R>) -> Result<ApplyOutcome<R>> {
        match result {
            Ok(report) => Ok(ApplyOutcome::Applied(report)),
            Err(e) if e.is_recoverable() => {
                self.events.publish(SystemEvent::ApplyDeferred {
                    domain,
                    reason: e.to_string(),
                });
                Ok(ApplyOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    fn audio_outcome(&self, result: Result<ApplyReport>) -> Result<ApplyOutcome<ApplyReport>> {
        if let Ok(report) = &result {
            if report.restarted {
                self.events.publish(SystemEvent::AudioDeviceRestarted {
                    failed_commands: report.failed,
                });
            }
        }
        self.outcome(ConfigDomain::Audio, result)
    }

    fn video_outcome(
        &self,
        chain: &VideoConfigurationChain,
        result: Result<VideoApplyReport>,
    ) -> Result<ApplyOutcome<VideoApplyReport>> {
        if let Ok(report) = &result {
            if report.encoder_restarted {
                let resolved = chain.get_final();
                self.events.publish(SystemEvent::VideoEncoderRecreated {
                    codec: resolved
                        .codec
                        .get()
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    resolution: resolved.resolution().unwrap_or_default(),
                });
            }
        }
        self.outcome(ConfigDomain::Video, result)
    }
}
