use std::sync::{Arc, Mutex};

use crate::audiosource::SpectrumSource;
use crate::detector::{BarActivationHeavyBeat, HeavyBeatDetector};
use crate::dispatcher::VisualSink;
use crate::intervaltimer::IntervalTimer;
use crate::playbackstate::{Phase, PlaybackState};
use crate::profile::PerformanceProfile;
use crate::spectrum::{ConfigPatch, ProcessedFrame, SpectrumConfig, SpectrumProcessor};
use crate::worker::WorkerHandle;

/// Byte magnitude at which a spectrum bar counts as lit. Empirical, in line
/// with the heavy beat energy threshold.
const BAR_ACTIVE_THRESHOLD: u8 = 160;

/// Drives the per-frame analysis while audio is playing. Prefers the worker
/// thread and renders with the most recently received frame (one frame of
/// staleness is fine, blocking is not); without a worker it computes the
/// identical result in-process.
pub struct Orchestrator<S: SpectrumSource, V: VisualSink> {
    source: S,
    sink: V,
    use_worker: bool,
    worker: Option<WorkerHandle>,
    worker_failed: bool,
    fallback: SpectrumProcessor,
    latest: Option<ProcessedFrame>,
    profile: PerformanceProfile,
    bars_active: Vec<bool>,
    bar_detector: BarActivationHeavyBeat,
    sample: Vec<u8>,
}

impl<S: SpectrumSource, V: VisualSink> Orchestrator<S, V> {
    pub fn new(
        source: S,
        sink: V,
        config: SpectrumConfig,
        profile: PerformanceProfile,
        use_worker: bool,
    ) -> Orchestrator<S, V> {
        let bar_count = profile.config().spectrum_bar_count;

        Orchestrator {
            source,
            sink,
            use_worker,
            worker: None,
            worker_failed: false,
            fallback: SpectrumProcessor::new(config),
            latest: None,
            profile,
            bars_active: vec![false; bar_count],
            bar_detector: BarActivationHeavyBeat::new(profile.bar_detector_params()),
            sample: Vec::new(),
        }
    }

    pub fn profile(&self) -> PerformanceProfile {
        self.profile
    }

    pub fn latest_frame(&self) -> Option<&ProcessedFrame> {
        self.latest.as_ref()
    }

    pub fn bar_detector(&self) -> &BarActivationHeavyBeat {
        &self.bar_detector
    }

    pub fn spectrum_config(&self) -> &SpectrumConfig {
        self.fallback.config()
    }

    /// Switches the performance profile. Only the bar row and the UI-side
    /// detector tuning change; the spectrum processor configuration is
    /// deliberately left alone.
    pub fn set_profile(&mut self, profile: PerformanceProfile) {
        if profile == self.profile {
            return;
        }
        log::info!("Switching performance profile to {:?}", profile);
        self.profile = profile;
        self.bars_active = vec![false; profile.config().spectrum_bar_count];
        self.bar_detector.retune(profile.bar_detector_params());
    }

    /// Explicit processor configuration update, applied to the fallback and
    /// forwarded over the worker channel.
    pub fn update_config(&mut self, patch: ConfigPatch) {
        self.fallback.apply_patch(&patch);
        if let Some(worker) = &self.worker {
            worker.update_config(patch);
        }
    }

    /// Blocks on the tick loop until shutdown is requested or the signal
    /// ends naturally. Transitions of the playback phase are picked up at
    /// the next scheduled tick, never by interrupting one.
    pub fn run(&mut self, state: Arc<Mutex<PlaybackState>>, tick_rate_hz: f32) {
        let mut timer = IntervalTimer::new(tick_rate_hz);
        let mut was_playing = false;
        let mut natural_end = false;

        loop {
            let phase = {
                let state = state.lock().unwrap();
                if state.shutdown {
                    break;
                }
                state.phase()
            };

            let playing = phase == Phase::Playing;
            if playing && !was_playing {
                self.begin_session();
            }
            if !playing && was_playing {
                self.end_session();
                if natural_end {
                    break;
                }
            }
            was_playing = playing;

            if playing {
                let now_ms = timer.now_ms();
                let (beat, heavy_beat) = self.tick(now_ms);

                let mut state = state.lock().unwrap();
                state.beat_active = beat;
                state.heavy_beat_active = heavy_beat;
                state.progress = self.source.progress();
                if self.source.finished() {
                    log::info!("Audio signal ended");
                    state.finish();
                    natural_end = true;
                }
            }

            timer.sleep_until_next_tick();
        }
    }

    /// One analysis frame. Returns the transient (beat, heavy beat) activity
    /// derived from the rendered frame and the UI-side detector.
    pub fn tick(&mut self, now_ms: u64) -> (bool, bool) {
        self.source.frequency_sample(&mut self.sample);
        if self.sample.is_empty() {
            // Audio graph not ready; nothing to detect, nothing to render.
            return (false, false);
        }

        if let Some(worker) = &mut self.worker {
            worker.send_sample(&self.sample, now_ms);
            if let Some(frame) = worker.poll() {
                self.latest = Some(frame);
            }
        } else if let Some(frame) = self.fallback.process(&self.sample, now_ms) {
            self.latest = Some(frame);
        }

        self.update_bars();
        let ui_heavy_beat = self.bar_detector.observe_bars(&self.bars_active, now_ms);

        match &self.latest {
            Some(frame) => {
                self.sink.render(frame, &self.bars_active, ui_heavy_beat);
                (
                    frame.beat.detected,
                    frame.heavy_beat.detected || ui_heavy_beat,
                )
            }
            None => (false, ui_heavy_beat),
        }
    }

    /// Lazily brings up the worker on the first transition into Playing.
    /// A failed spawn means fallback processing for the rest of the session;
    /// there is no retry.
    fn begin_session(&mut self) {
        if self.use_worker && self.worker.is_none() && !self.worker_failed {
            match WorkerHandle::spawn(*self.fallback.config()) {
                Ok(worker) => self.worker = Some(worker),
                Err(message) => {
                    log::warn!("{}; falling back to in-process analysis", message);
                    self.worker_failed = true;
                }
            }
        }
    }

    fn end_session(&mut self) {
        if let Some(worker) = &mut self.worker {
            worker.stop();
        }
        self.fallback.reset_buffers();
        self.bar_detector.reset();
        self.latest = None;
        self.bars_active.fill(false);
    }

    fn update_bars(&mut self) {
        let bins = self.sample.len();
        let bar_count = self.bars_active.len();
        for (i, active) in self.bars_active.iter_mut().enumerate() {
            let bin = i * bins / bar_count;
            *active = self.sample[bin] >= BAR_ACTIVE_THRESHOLD;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedSource {
        samples: VecDeque<Vec<u8>>,
        served: usize,
        total: usize,
    }

    impl ScriptedSource {
        fn new(samples: Vec<Vec<u8>>) -> ScriptedSource {
            let total = samples.len();
            ScriptedSource {
                samples: samples.into(),
                served: 0,
                total,
            }
        }
    }

    impl SpectrumSource for ScriptedSource {
        fn frequency_sample(&mut self, out: &mut Vec<u8>) {
            out.clear();
            if let Some(sample) = self.samples.pop_front() {
                self.served += 1;
                out.extend_from_slice(&sample);
            }
        }

        fn finished(&self) -> bool {
            self.samples.is_empty()
        }

        fn progress(&self) -> f32 {
            if self.total == 0 {
                return 0.0;
            }
            self.served as f32 / self.total as f32
        }
    }

    struct CountingSink {
        frames: usize,
        beats: usize,
        ui_heavy_beats: usize,
    }

    impl CountingSink {
        fn new() -> CountingSink {
            CountingSink {
                frames: 0,
                beats: 0,
                ui_heavy_beats: 0,
            }
        }
    }

    impl VisualSink for CountingSink {
        fn render(&mut self, frame: &ProcessedFrame, _bars_active: &[bool], ui_heavy_beat: bool) {
            self.frames += 1;
            if frame.beat.detected {
                self.beats += 1;
            }
            if ui_heavy_beat {
                self.ui_heavy_beats += 1;
            }
        }
    }

    fn beat_sample() -> Vec<u8> {
        let mut sample = vec![0u8; 1024];
        for v in sample.iter_mut().take(105).skip(70) {
            *v = 220;
        }
        sample
    }

    fn loud_everywhere() -> Vec<u8> {
        vec![220u8; 1024]
    }

    fn orchestrator(
        samples: Vec<Vec<u8>>,
        profile: PerformanceProfile,
    ) -> Orchestrator<ScriptedSource, CountingSink> {
        Orchestrator::new(
            ScriptedSource::new(samples),
            CountingSink::new(),
            SpectrumConfig::default(),
            profile,
            false,
        )
    }

    #[test]
    fn fallback_path_detects_beats_without_worker() {
        let mut orch = orchestrator(vec![beat_sample()], PerformanceProfile::Medium);
        let (beat, _) = orch.tick(100);
        assert!(beat);
        assert_eq!(orch.sink.frames, 1);
        assert_eq!(orch.sink.beats, 1);
    }

    #[test]
    fn empty_sample_is_an_inert_tick() {
        let mut orch = orchestrator(vec![], PerformanceProfile::Medium);
        let (beat, heavy) = orch.tick(100);
        assert!(!beat);
        assert!(!heavy);
        assert_eq!(orch.sink.frames, 0);
        assert!(orch.latest_frame().is_none());
    }

    #[test]
    fn loud_upper_bands_trigger_ui_detector() {
        let samples = vec![loud_everywhere(); 10];
        let mut orch = orchestrator(samples, PerformanceProfile::High);
        let mut any_ui_heavy = false;
        for i in 0..10u64 {
            let (_, heavy) = orch.tick(400 + i * 17);
            any_ui_heavy |= heavy;
        }
        assert!(any_ui_heavy);
        assert!(orch.sink.ui_heavy_beats >= 1);
    }

    #[test]
    fn profile_switch_retunes_detector_not_processor() {
        let samples = vec![loud_everywhere(); 4];
        let mut orch = orchestrator(samples, PerformanceProfile::Low);
        orch.tick(100);
        let config_before = *orch.spectrum_config();

        orch.set_profile(PerformanceProfile::High);
        let params = *orch.bar_detector().params();
        assert_eq!(params.cooldown_ms, 250);
        assert_eq!(params.window_ms, 50);
        assert_eq!(
            orch.bars_active.len(),
            PerformanceProfile::High.config().spectrum_bar_count
        );

        // The very next tick runs under the new tuning.
        orch.tick(120);
        assert_eq!(orch.spectrum_config().beat_threshold, config_before.beat_threshold);
        assert_eq!(orch.spectrum_config().fft_size, config_before.fft_size);
    }

    #[test]
    fn rendering_reuses_last_frame_when_throttled() {
        let samples = vec![beat_sample(), beat_sample()];
        let mut orch = orchestrator(samples, PerformanceProfile::Medium);
        orch.tick(100);
        // Second tick lands inside the 16 ms throttle: the processor drops
        // it, but the sink still renders with the previous frame.
        orch.tick(110);
        assert_eq!(orch.sink.frames, 2);
        assert_eq!(orch.latest_frame().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn update_config_reaches_fallback() {
        let mut orch = orchestrator(vec![beat_sample()], PerformanceProfile::Medium);
        orch.update_config(ConfigPatch {
            beat_threshold: Some(250.0),
            ..ConfigPatch::default()
        });
        let (beat, _) = orch.tick(100);
        assert!(!beat);
    }
}
