use std::collections::VecDeque;

/// Common contract of the two heavy beat detectors. Both keep a short
/// look-back window of activation records and a refractory cooldown; they
/// differ only in how the activation signal is derived.
pub trait HeavyBeatDetector {
    /// Feeds one observation. Returns true when a heavy beat fires at
    /// `now_ms`, which also arms the cooldown.
    fn observe(&mut self, is_active: bool, energy: f32, now_ms: u64) -> bool;

    /// Active records currently left in the look-back window.
    fn recent_active(&self) -> usize;

    /// Drops the look-back window. The cooldown timestamp survives.
    fn reset(&mut self);
}

struct PulseRecord {
    time_ms: u64,
    is_active: bool,
    #[allow(dead_code)]
    energy: f32,
}

/// Shared window/cooldown mechanics. Records older than the window are purged
/// on every observation, so the buffer length stays bounded by the tick rate.
struct PulseWindow {
    window_ms: u64,
    cooldown_ms: u64,
    records: VecDeque<PulseRecord>,
    last_fire_ms: u64,
}

impl PulseWindow {
    fn new(window_ms: u64, cooldown_ms: u64) -> PulseWindow {
        PulseWindow {
            window_ms,
            cooldown_ms,
            records: VecDeque::new(),
            last_fire_ms: 0,
        }
    }

    fn observe(&mut self, is_active: bool, energy: f32, now_ms: u64) -> bool {
        self.records.push_back(PulseRecord {
            time_ms: now_ms,
            is_active,
            energy,
        });
        while let Some(front) = self.records.front() {
            if now_ms.saturating_sub(front.time_ms) > self.window_ms {
                self.records.pop_front();
            } else {
                break;
            }
        }

        let any_active = self.records.iter().any(|r| r.is_active);
        let fired = any_active && now_ms.saturating_sub(self.last_fire_ms) > self.cooldown_ms;
        if fired {
            self.last_fire_ms = now_ms;
        }
        fired
    }

    fn recent_active(&self) -> usize {
        self.records.iter().filter(|r| r.is_active).count()
    }

    #[cfg(test)]
    fn oldest_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.records
            .front()
            .map(|r| now_ms.saturating_sub(r.time_ms))
    }
}

/// Worker-side strategy: activation is a combined mid-high/high band energy
/// crossing a fixed threshold.
pub struct EnergyHeavyBeat {
    threshold: f32,
    window: PulseWindow,
}

impl EnergyHeavyBeat {
    pub fn new(threshold: f32, window_ms: u64, cooldown_ms: u64) -> EnergyHeavyBeat {
        EnergyHeavyBeat {
            threshold,
            window: PulseWindow::new(window_ms, cooldown_ms),
        }
    }

    pub fn observe_energy(&mut self, combined_energy: f32, now_ms: u64) -> bool {
        let is_active = combined_energy > self.threshold;
        self.observe(is_active, combined_energy, now_ms)
    }

    pub fn set_cooldown_ms(&mut self, cooldown_ms: u64) {
        self.window.cooldown_ms = cooldown_ms;
    }

    #[cfg(test)]
    fn oldest_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.window.oldest_age_ms(now_ms)
    }
}

impl HeavyBeatDetector for EnergyHeavyBeat {
    fn observe(&mut self, is_active: bool, energy: f32, now_ms: u64) -> bool {
        self.window.observe(is_active, energy, now_ms)
    }

    fn recent_active(&self) -> usize {
        self.window.recent_active()
    }

    fn reset(&mut self) {
        self.window.records.clear();
    }
}

/// Parameter set of the bar activation strategy. Chosen by the active
/// performance profile, see [`crate::profile::PerformanceProfile`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarDetectorParams {
    /// Fraction of the bar row where the watched range starts.
    pub start_ratio: f32,
    /// Fraction of the bar row where the watched range ends.
    pub end_ratio: f32,
    /// Fraction of watched bars that must be active at once.
    pub required_ratio: f32,
    pub window_ms: u64,
    pub cooldown_ms: u64,
}

/// UI-side strategy: activation is a sufficient fraction of lit spectrum
/// bars inside a profile-dependent index range. Independent of the
/// energy-based detector; the two are deliberately never reconciled.
pub struct BarActivationHeavyBeat {
    params: BarDetectorParams,
    window: PulseWindow,
}

impl BarActivationHeavyBeat {
    pub fn new(params: BarDetectorParams) -> BarActivationHeavyBeat {
        BarActivationHeavyBeat {
            params,
            window: PulseWindow::new(params.window_ms, params.cooldown_ms),
        }
    }

    pub fn params(&self) -> &BarDetectorParams {
        &self.params
    }

    /// Swaps in a new parameter set on a profile switch. The look-back window
    /// is rebuilt, the cooldown timestamp is kept so the switch itself cannot
    /// trigger a spurious fire.
    pub fn retune(&mut self, params: BarDetectorParams) {
        let last_fire_ms = self.window.last_fire_ms;
        self.params = params;
        self.window = PulseWindow::new(params.window_ms, params.cooldown_ms);
        self.window.last_fire_ms = last_fire_ms;
    }

    pub fn observe_bars(&mut self, active_flags: &[bool], now_ms: u64) -> bool {
        let total = active_flags.len();
        let start = (total as f32 * self.params.start_ratio).floor() as usize;
        let end = (total as f32 * self.params.end_ratio).floor() as usize;
        let watched = &active_flags[start.min(total)..end.min(total)];

        let active = watched.iter().filter(|&&a| a).count();
        let required = ((watched.len() as f32 * self.params.required_ratio).ceil() as usize).max(1);
        let is_active = !watched.is_empty() && active >= required;

        self.observe(is_active, active as f32, now_ms)
    }
}

impl HeavyBeatDetector for BarActivationHeavyBeat {
    fn observe(&mut self, is_active: bool, energy: f32, now_ms: u64) -> bool {
        self.window.observe(is_active, energy, now_ms)
    }

    fn recent_active(&self) -> usize {
        self.window.recent_active()
    }

    fn reset(&mut self) {
        self.window.records.clear();
    }
}
