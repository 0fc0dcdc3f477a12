//! cloudplay - layered media configuration for a cloud-gaming client
//!
//! Audio, audio-session and video settings arrive from several sources
//! (debug overrides, device probing, server pushes, scripts, the user,
//! built-in defaults). This crate merges them per field by source priority
//! and reconfigures the media engine only where the merged value changed.

pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod utils;
pub mod video;

pub use context::{ApplyOutcome, EngineContext};
pub use error::{AppError, Result};
