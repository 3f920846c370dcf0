use serde::Deserialize;

use crate::detector::BarDetectorParams;

/// Named visual density presets. A profile only tunes the visual side and the
/// bar activation detector; the spectrum processor's own configuration is
/// never touched by a profile switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceProfile {
    Low,
    Medium,
    High,
}

/// Derived visual parameters of a profile.
#[derive(Clone, Copy, Debug)]
pub struct ProfileConfig {
    pub spectrum_bar_count: usize,
    pub enable_fade_animations: bool,
    pub particle_count: usize,
}

impl PerformanceProfile {
    pub fn config(self) -> ProfileConfig {
        match self {
            PerformanceProfile::Low => ProfileConfig {
                spectrum_bar_count: 96,
                enable_fade_animations: false,
                particle_count: 18,
            },
            PerformanceProfile::Medium => ProfileConfig {
                spectrum_bar_count: 128,
                enable_fade_animations: true,
                particle_count: 20,
            },
            PerformanceProfile::High => ProfileConfig {
                spectrum_bar_count: 160,
                enable_fade_animations: true,
                particle_count: 20,
            },
        }
    }

    /// The high profile runs a more sensitive bar detector: narrower watch
    /// range, lower required ratio, shorter window and cooldown. Low and
    /// medium share one tuning.
    pub fn bar_detector_params(self) -> BarDetectorParams {
        match self {
            PerformanceProfile::High => BarDetectorParams {
                start_ratio: 0.25,
                end_ratio: 0.35,
                required_ratio: 7.0 / 10.0,
                window_ms: 50,
                cooldown_ms: 250,
            },
            PerformanceProfile::Low | PerformanceProfile::Medium => BarDetectorParams {
                start_ratio: 0.25,
                end_ratio: 0.45,
                required_ratio: 9.0 / 10.0,
                window_ms: 100,
                cooldown_ms: 300,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_profile_detector_is_more_sensitive() {
        let high = PerformanceProfile::High.bar_detector_params();
        let low = PerformanceProfile::Low.bar_detector_params();
        assert!(high.required_ratio < low.required_ratio);
        assert!(high.cooldown_ms < low.cooldown_ms);
        assert!(high.end_ratio < low.end_ratio);
    }

    #[test]
    fn low_and_medium_share_detector_tuning() {
        assert_eq!(
            PerformanceProfile::Low.bar_detector_params(),
            PerformanceProfile::Medium.bar_detector_params()
        );
    }

    #[test]
    fn low_profile_disables_fades() {
        assert!(!PerformanceProfile::Low.config().enable_fade_animations);
        assert!(PerformanceProfile::High.config().enable_fade_animations);
    }
}
