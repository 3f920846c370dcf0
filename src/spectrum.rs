use serde::Deserialize;

use crate::detector::{EnergyHeavyBeat, HeavyBeatDetector};

/// Minimum gap between processed frames. Anything arriving faster is dropped,
/// which caps the analysis cost at roughly 60 Hz.
pub const PROCESS_INTERVAL_MS: u64 = 16;

/// Activation threshold for the energy-based heavy beat detector.
/// Empirical tuning, not exposed for runtime configuration.
pub const HEAVY_BEAT_THRESHOLD: f32 = 160.0;

/// Look-back window of the energy-based heavy beat detector.
pub const HEAVY_BEAT_WINDOW_MS: u64 = 20;

const BEAT_BAND_LOW_HZ: f32 = 1500.0;
const BEAT_BAND_HIGH_HZ: f32 = 2250.0;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    pub sample_rate: u32,
    /// Byte magnitude a beat band average must exceed. 188 is about -4.5 dBFS.
    pub beat_threshold: f32,
    pub beat_cooldown_ms: u64,
    pub heavy_beat_cooldown_ms: u64,
}

impl Default for SpectrumConfig {
    fn default() -> SpectrumConfig {
        SpectrumConfig {
            fft_size: 2048,
            sample_rate: 44100,
            beat_threshold: 188.0,
            beat_cooldown_ms: 25,
            heavy_beat_cooldown_ms: 120,
        }
    }
}

impl SpectrumConfig {
    pub fn frequency_bins(&self) -> usize {
        self.fft_size / 2
    }
}

/// Partial configuration update. Absent fields leave the current value alone.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ConfigPatch {
    pub fft_size: Option<usize>,
    pub sample_rate: Option<u32>,
    pub beat_threshold: Option<f32>,
    pub beat_cooldown_ms: Option<u64>,
    pub heavy_beat_cooldown_ms: Option<u64>,
}

/// Fractional bin ranges of the five analysis bands. With 1024 bins at
/// 44.1 kHz the low band covers roughly 0-440 Hz and the high band
/// everything above 3.5 kHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Low,
    MidLow,
    Mid,
    MidHigh,
    High,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Low, Band::MidLow, Band::Mid, Band::MidHigh, Band::High];

    pub fn bin_fractions(self) -> (f32, f32) {
        match self {
            Band::Low => (0.0, 0.1),
            Band::MidLow => (0.1, 0.3),
            Band::Mid => (0.3, 0.6),
            Band::MidHigh => (0.6, 0.8),
            Band::High => (0.8, 1.0),
        }
    }
}

/// Mean byte magnitude (0-255) per band.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies {
    pub low: f32,
    pub mid_low: f32,
    pub mid: f32,
    pub mid_high: f32,
    pub high: f32,
}

impl BandEnergies {
    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Low => self.low,
            Band::MidLow => self.mid_low,
            Band::Mid => self.mid,
            Band::MidHigh => self.mid_high,
            Band::High => self.high,
        }
    }

    fn set(&mut self, band: Band, value: f32) {
        match band {
            Band::Low => self.low = value,
            Band::MidLow => self.mid_low = value,
            Band::Mid => self.mid = value,
            Band::MidHigh => self.mid_high = value,
            Band::High => self.high = value,
        }
    }

    pub fn normalized(&self) -> BandEnergies {
        BandEnergies {
            low: self.low / 255.0,
            mid_low: self.mid_low / 255.0,
            mid: self.mid / 255.0,
            mid_high: self.mid_high / 255.0,
            high: self.high / 255.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BeatEvent {
    pub detected: bool,
    /// Band average over 255.
    pub intensity: f32,
    pub threshold: f32,
    /// Raw band average, kept for diagnostics.
    pub frequency: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeavyBeatEvent {
    pub detected: bool,
    pub intensity: f32,
    pub threshold: f32,
    /// Raw combined mid-high/high energy.
    pub energy: f32,
    /// Active records left in the look-back window, current call included.
    pub recent_count: usize,
}

/// Normalized (0-1) spectral descriptors of one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpectrumFeatures {
    pub total_energy: f32,
    pub peak: f32,
    pub spectral_centroid: f32,
    pub spectral_bandwidth: f32,
    pub band_energies: BandEnergies,
}

#[derive(Clone, Copy, Debug)]
pub struct ProcessedFrame {
    pub band_energies: BandEnergies,
    pub beat: BeatEvent,
    pub heavy_beat: HeavyBeatEvent,
    pub features: SpectrumFeatures,
    pub timestamp_ms: u64,
}

/// Stateful spectrum analysis engine. All timing is injected through the
/// `now_ms` arguments, so instances behave deterministically under test and
/// several of them can run independently.
pub struct SpectrumProcessor {
    config: SpectrumConfig,
    frequency_bins: usize,
    last_process_ms: Option<u64>,
    last_beat_ms: u64,
    heavy_beat: EnergyHeavyBeat,
}

impl SpectrumProcessor {
    pub fn new(config: SpectrumConfig) -> SpectrumProcessor {
        let frequency_bins = config.frequency_bins();
        let heavy_beat = EnergyHeavyBeat::new(
            HEAVY_BEAT_THRESHOLD,
            HEAVY_BEAT_WINDOW_MS,
            config.heavy_beat_cooldown_ms,
        );

        SpectrumProcessor {
            config,
            frequency_bins,
            last_process_ms: None,
            last_beat_ms: 0,
            heavy_beat,
        }
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    pub fn frequency_bins(&self) -> usize {
        self.frequency_bins
    }

    /// Merges the present fields of `patch` into the configuration. Fields
    /// that are `None` are ignored, the patch is never rejected as a whole.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) {
        if let Some(fft_size) = patch.fft_size {
            self.config.fft_size = fft_size;
            self.frequency_bins = self.config.frequency_bins();
        }
        if let Some(sample_rate) = patch.sample_rate {
            self.config.sample_rate = sample_rate;
        }
        if let Some(beat_threshold) = patch.beat_threshold {
            self.config.beat_threshold = beat_threshold;
        }
        if let Some(beat_cooldown_ms) = patch.beat_cooldown_ms {
            self.config.beat_cooldown_ms = beat_cooldown_ms;
        }
        if let Some(heavy_beat_cooldown_ms) = patch.heavy_beat_cooldown_ms {
            self.config.heavy_beat_cooldown_ms = heavy_beat_cooldown_ms;
            self.heavy_beat.set_cooldown_ms(heavy_beat_cooldown_ms);
        }
    }

    /// Analyzes one frequency-domain sample. Returns `None` when the call
    /// falls inside the throttle window; the frame is dropped and no detector
    /// state changes. An empty sample produces an inert frame with nothing
    /// detected rather than an error.
    pub fn process(&mut self, sample: &[u8], now_ms: u64) -> Option<ProcessedFrame> {
        if let Some(last) = self.last_process_ms {
            if now_ms.saturating_sub(last) < PROCESS_INTERVAL_MS {
                return None;
            }
        }
        self.last_process_ms = Some(now_ms);

        let band_energies = self.band_energies(sample);
        let beat = self.detect_beat(sample, now_ms);
        let heavy_beat = self.detect_heavy_beat(&band_energies, now_ms);
        let features = self.spectrum_features(sample, &band_energies);

        Some(ProcessedFrame {
            band_energies,
            beat,
            heavy_beat,
            features,
            timestamp_ms: now_ms,
        })
    }

    /// Stop semantics: drops the heavy beat look-back buffer but keeps the
    /// cooldown timestamps, so a quick stop/start cannot double-fire. A clean
    /// slate needs a fresh processor.
    pub fn reset_buffers(&mut self) {
        self.heavy_beat.reset();
    }

    fn band_energies(&self, sample: &[u8]) -> BandEnergies {
        let mut energies = BandEnergies::default();
        for band in Band::ALL {
            let (start_frac, end_frac) = band.bin_fractions();
            let start = (start_frac * self.frequency_bins as f32).floor() as usize;
            let end = (end_frac * self.frequency_bins as f32).floor() as usize;
            energies.set(band, mean_of_range(sample, start, end));
        }
        energies
    }

    fn detect_beat(&mut self, sample: &[u8], now_ms: u64) -> BeatEvent {
        let start = self.frequency_to_bin(BEAT_BAND_LOW_HZ);
        let end = self.frequency_to_bin(BEAT_BAND_HIGH_HZ);
        // The beat band is inclusive on both ends.
        let average = mean_of_range(sample, start, end + 1);

        let cooldown_over = now_ms.saturating_sub(self.last_beat_ms) > self.config.beat_cooldown_ms;
        let detected = average > self.config.beat_threshold && cooldown_over;
        if detected {
            self.last_beat_ms = now_ms;
        }

        BeatEvent {
            detected,
            intensity: average / 255.0,
            threshold: self.config.beat_threshold / 255.0,
            frequency: average,
        }
    }

    fn detect_heavy_beat(&mut self, energies: &BandEnergies, now_ms: u64) -> HeavyBeatEvent {
        let combined = (energies.mid_high + energies.high) / 2.0;
        let detected = self.heavy_beat.observe_energy(combined, now_ms);

        HeavyBeatEvent {
            detected,
            intensity: combined / 255.0,
            threshold: HEAVY_BEAT_THRESHOLD / 255.0,
            energy: combined,
            recent_count: self.heavy_beat.recent_active(),
        }
    }

    fn spectrum_features(&self, sample: &[u8], energies: &BandEnergies) -> SpectrumFeatures {
        let total: u64 = sample.iter().map(|&v| v as u64).sum();
        let total_energy = if sample.is_empty() {
            0.0
        } else {
            total as f32 / sample.len() as f32 / 255.0
        };
        let peak = sample.iter().copied().max().unwrap_or(0) as f32 / 255.0;

        let weighted: f64 = sample
            .iter()
            .enumerate()
            .map(|(i, &v)| i as f64 * v as f64)
            .sum();
        let centroid = if total > 0 {
            (weighted / total as f64) as f32
        } else {
            0.0
        };

        let deviation: f64 = sample
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let d = i as f64 - centroid as f64;
                d * d * v as f64
            })
            .sum();
        let bandwidth = if total > 0 {
            (deviation / total as f64).sqrt() as f32
        } else {
            0.0
        };

        SpectrumFeatures {
            total_energy,
            peak,
            spectral_centroid: centroid / self.frequency_bins as f32,
            spectral_bandwidth: bandwidth / self.frequency_bins as f32,
            band_energies: energies.normalized(),
        }
    }

    fn frequency_to_bin(&self, frequency: f32) -> usize {
        let nyquist = self.config.sample_rate as f32 / 2.0;
        (frequency / nyquist * self.frequency_bins as f32).round() as usize
    }
}

fn mean_of_range(sample: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(sample.len());
    if start >= end {
        return 0.0;
    }

    let sum: u64 = sample[start..end].iter().map(|&v| v as u64).sum();
    sum as f32 / (end - start) as f32
}
