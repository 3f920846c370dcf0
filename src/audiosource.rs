use rand::Rng;

/// Host audio-analysis facility: hands out one frequency-domain byte sample
/// (0-255 per bin) per tick. Returning an empty sample means the audio graph
/// is not ready yet; the pipeline treats that as an inert frame.
pub trait SpectrumSource {
    fn frequency_sample(&mut self, out: &mut Vec<u8>);

    /// True once the signal has ended naturally.
    fn finished(&self) -> bool;

    /// Playback position in [0, 1].
    fn progress(&self) -> f32;
}

/// Synthetic stand-in for a real analyser node. Produces pink-ish noise with
/// a falling spectral slope plus periodic percussive bursts in the beat band
/// and the upper bands, so both detectors have something to find.
pub struct SimulatedSource {
    bins: usize,
    tick: u64,
    total_ticks: u64,
    burst_period: u64,
    burst_length: u64,
}

impl SimulatedSource {
    pub fn new(bins: usize, total_ticks: u64) -> SimulatedSource {
        SimulatedSource {
            bins,
            tick: 0,
            total_ticks,
            // Roughly two bursts per second at a 60 Hz tick rate.
            burst_period: 30,
            burst_length: 3,
        }
    }

    fn in_burst(&self) -> bool {
        self.tick % self.burst_period < self.burst_length
    }
}

impl SpectrumSource for SimulatedSource {
    fn frequency_sample(&mut self, out: &mut Vec<u8>) {
        out.clear();
        if self.finished() {
            return;
        }

        let mut rng = rand::thread_rng();
        let burst = self.in_burst();

        for i in 0..self.bins {
            let position = i as f32 / self.bins as f32;
            let slope = 1.0 - position * 0.7;
            let mut value = rng.gen_range(0.0..110.0) * slope;

            if burst {
                // Beat band sits around 7% of the bins at 2048/44100.
                if (0.06..=0.11).contains(&position) {
                    value = rng.gen_range(190.0..250.0);
                }
                // Upper-band slam for the heavy beat detectors.
                if position >= 0.6 {
                    value = rng.gen_range(170.0..240.0);
                }
            }

            out.push(value.clamp(0.0, 255.0) as u8);
        }

        self.tick += 1;
    }

    fn finished(&self) -> bool {
        self.tick >= self.total_ticks
    }

    fn progress(&self) -> f32 {
        if self.total_ticks == 0 {
            return 0.0;
        }
        (self.tick as f32 / self.total_ticks as f32).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_configured_length() {
        let mut source = SimulatedSource::new(1024, 10);
        let mut out = Vec::new();
        source.frequency_sample(&mut out);
        assert_eq!(out.len(), 1024);
    }

    #[test]
    fn finishes_after_total_ticks() {
        let mut source = SimulatedSource::new(64, 3);
        let mut out = Vec::new();
        for _ in 0..3 {
            source.frequency_sample(&mut out);
            assert!(!out.is_empty());
        }
        assert!(source.finished());
        source.frequency_sample(&mut out);
        assert!(out.is_empty());
        assert_eq!(source.progress(), 1.0);
    }
}
