use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;

use crate::profile::PerformanceProfile;
use crate::spectrum::{ConfigPatch, SpectrumConfig};

/// TOML settings file. Everything is optional; missing fields keep their
/// defaults and CLI flags win over file values.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: PerformanceProfile,
    pub tick_rate_hz: f32,
    /// Demo signal length in seconds.
    pub duration_secs: u64,
    pub processor: ConfigPatch,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            profile: PerformanceProfile::Medium,
            tick_rate_hz: 60.0,
            duration_secs: 20,
            processor: ConfigPatch::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings, String> {
        Settings::from_config_file(path)
            .map_err(|err| format!("Cannot read settings from {}: {:?}", path.display(), err))
    }

    /// Spectrum processor configuration with the file overrides applied.
    pub fn spectrum_config(&self) -> SpectrumConfig {
        let mut config = SpectrumConfig::default();
        if let Some(fft_size) = self.processor.fft_size {
            config.fft_size = fft_size;
        }
        if let Some(sample_rate) = self.processor.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(beat_threshold) = self.processor.beat_threshold {
            config.beat_threshold = beat_threshold;
        }
        if let Some(beat_cooldown_ms) = self.processor.beat_cooldown_ms {
            config.beat_cooldown_ms = beat_cooldown_ms;
        }
        if let Some(heavy_beat_cooldown_ms) = self.processor.heavy_beat_cooldown_ms {
            config.heavy_beat_cooldown_ms = heavy_beat_cooldown_ms;
        }
        config
    }
}
