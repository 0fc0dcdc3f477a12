//! Layered configuration resolution
//!
//! This module provides:
//! - `OptionalField`, the per-attribute value with change detection
//! - `Priority`, the ordered set of configuration sources
//! - `ConfigPolicyChain`, the generic merge-and-diff engine
//! - JSON loading of configuration layers
//! - Device capability probing

pub mod chain;
pub mod loader;
pub mod optional;
pub mod priority;
pub mod probe;
mod schema;

pub use chain::{ConfigPolicyChain, PolicyConfig};
pub use loader::{from_json_str, from_json_value, ConfigSections, LayerDocument};
pub use optional::{OptionalField, Regression};
pub use priority::{Priority, PRIORITY_COUNT};
pub use probe::{DeviceProbe, DeviceProfile, HostProbe, Platform, StaticProbe};

pub(crate) use schema::policy_config;
