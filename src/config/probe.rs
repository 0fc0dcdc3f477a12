//! Device capability probing
//!
//! The probe only describes the host; each configuration type decides how a
//! [`DeviceProfile`] translates into its `Device` priority snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Host platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
    Other,
}

impl Platform {
    /// Platform the binary was built for
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            "android" => Platform::Android,
            "ios" => Platform::Ios,
            _ => Platform::Other,
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

/// Capabilities relevant to media configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub platform: Platform,
    /// Logical CPU cores
    pub cpu_cores: u32,
    /// Running on battery power
    pub on_battery: bool,
    /// Platform audio stack offers a hardware (voice-processing) echo canceller
    pub hw_aec_available: bool,
    /// A hardware video encoder is present
    pub hw_video_encoder: bool,
    /// A hardware video decoder is present
    pub hw_video_decoder: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            platform: Platform::Other,
            cpu_cores: 1,
            on_battery: false,
            hw_aec_available: false,
            hw_video_encoder: false,
            hw_video_decoder: false,
        }
    }
}

impl DeviceProfile {
    /// Fewer than four cores, or running on battery
    pub fn is_low_power(&self) -> bool {
        self.cpu_cores < 4 || self.on_battery
    }
}

/// Source of a [`DeviceProfile`]
pub trait DeviceProbe: Send + Sync {
    fn probe(&self) -> DeviceProfile;
}

/// Probe backed by what the standard library can observe
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl DeviceProbe for HostProbe {
    fn probe(&self) -> DeviceProfile {
        let platform = Platform::current();
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        let profile = DeviceProfile {
            platform,
            cpu_cores,
            on_battery: false,
            hw_aec_available: matches!(
                platform,
                Platform::MacOs | Platform::Ios | Platform::Android
            ),
            hw_video_encoder: matches!(platform, Platform::Windows | Platform::MacOs),
            hw_video_decoder: platform != Platform::Other,
        };
        debug!("Probed device profile: {:?}", profile);
        profile
    }
}

/// Probe returning a fixed profile
#[derive(Debug, Clone)]
pub struct StaticProbe(pub DeviceProfile);

impl DeviceProbe for StaticProbe {
    fn probe(&self) -> DeviceProfile {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_probe_reports_cores() {
        let profile = HostProbe.probe();
        assert!(profile.cpu_cores >= 1);
        assert_eq!(profile.platform, Platform::current());
    }

    #[test]
    fn test_low_power() {
        let mut profile = DeviceProfile {
            cpu_cores: 8,
            ..Default::default()
        };
        assert!(!profile.is_low_power());
        profile.on_battery = true;
        assert!(profile.is_low_power());
        assert!(DeviceProfile::default().is_low_power());
    }
}
