//! Audio configuration and its consumers
//!
//! This module provides:
//! - `AudioOptions`, resolved through the audio options policy chain
//! - `AudioOptionsExecutor`, which drives the device/processing/encoder modules
//! - `AudioSessionConfiguration` and the platform session bridge

pub mod executor;
pub mod options;
pub mod session;

pub use executor::{
    ApplyReport, AudioDeviceModule, AudioEncoderControl, AudioOptionsExecutor,
    AudioProcessingModule, DeviceCommand, EncoderCommand, ProcessingCommand,
};
pub use options::{AgcMode, AudioCodec, AudioOptions, AudioOptionsChain, AudioScenario};
pub use session::{
    AudioSessionBridge, AudioSessionChain, AudioSessionConfiguration, PlatformAudioSession,
    SessionApplyReport, SessionCategory, SessionCommand,
};
