use crate::spectrum::ProcessedFrame;

/// Seam towards the visual effect layer. Rendering itself (particles, bar
/// DOM, glow) lives outside this crate; implementations only consume the
/// detection results.
pub trait VisualSink {
    /// Called once per rendered tick with the most recent analysis frame,
    /// the lit state of the spectrum bars and the verdict of the UI-side
    /// heavy beat detector.
    fn render(&mut self, frame: &ProcessedFrame, bars_active: &[bool], ui_heavy_beat: bool);
}

/// Diagnostic sink for the demo binary: logs detections, nothing else.
pub struct LogSink {
    frames: u64,
    beats: u64,
    heavy_beats: u64,
}

impl LogSink {
    pub fn new() -> LogSink {
        LogSink {
            frames: 0,
            beats: 0,
            heavy_beats: 0,
        }
    }
}

impl VisualSink for LogSink {
    fn render(&mut self, frame: &ProcessedFrame, bars_active: &[bool], ui_heavy_beat: bool) {
        self.frames += 1;

        if frame.beat.detected {
            self.beats += 1;
            log::info!(
                "Beat #{} intensity={:.2} centroid={:.2}",
                self.beats,
                frame.beat.intensity,
                frame.features.spectral_centroid
            );
        }
        if frame.heavy_beat.detected || ui_heavy_beat {
            self.heavy_beats += 1;
            log::info!(
                "Heavy beat #{} energy={:.0} recent={} ui={}",
                self.heavy_beats,
                frame.heavy_beat.energy,
                frame.heavy_beat.recent_count,
                ui_heavy_beat
            );
        }

        log::trace!(
            "Frame {} energy={:.2} peak={:.2} active_bars={}",
            self.frames,
            frame.features.total_energy,
            frame.features.peak,
            bars_active.iter().filter(|&&a| a).count()
        );
    }
}
