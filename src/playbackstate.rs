#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    Paused,
}

/// Shared playback state. The orchestrator polls `phase` once per tick, so
/// transitions take effect cooperatively on the next scheduled frame instead
/// of interrupting anything.
pub struct PlaybackState {
    phase: Phase,
    pub progress: f32,
    /// Transient "a beat is lighting things up right now" flags, cleared on
    /// every transition into Playing.
    pub beat_active: bool,
    pub heavy_beat_active: bool,
    pub shutdown: bool,
}

impl PlaybackState {
    pub fn new() -> PlaybackState {
        PlaybackState {
            phase: Phase::Idle,
            progress: 0.0,
            beat_active: false,
            heavy_beat_active: false,
            shutdown: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Idle/Paused -> Playing. Re-entering Playing while already Playing is
    /// a no-op.
    pub fn request_play(&mut self) -> bool {
        match self.phase {
            Phase::Idle | Phase::Paused => {
                self.phase = Phase::Playing;
                self.beat_active = false;
                self.heavy_beat_active = false;
                true
            }
            Phase::Playing => {
                log::debug!("Already playing, ignoring play request");
                false
            }
        }
    }

    /// Playing -> Paused. Anything else is rejected.
    pub fn request_pause(&mut self) -> bool {
        match self.phase {
            Phase::Playing => {
                self.phase = Phase::Paused;
                true
            }
            _ => {
                log::warn!("Cannot pause from {:?}", self.phase);
                false
            }
        }
    }

    /// Playing -> Idle (explicit stop). Anything else is rejected.
    pub fn request_stop(&mut self) -> bool {
        match self.phase {
            Phase::Playing => {
                self.phase = Phase::Idle;
                true
            }
            _ => {
                log::warn!("Cannot stop from {:?}", self.phase);
                false
            }
        }
    }

    /// Natural end of the audio signal: Playing -> Idle with progress reset.
    pub fn finish(&mut self) {
        if self.phase == Phase::Playing {
            self.phase = Phase::Idle;
            self.progress = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(PlaybackState::new().phase(), Phase::Idle);
    }

    #[test]
    fn play_pause_resume_stop_cycle() {
        let mut state = PlaybackState::new();
        assert!(state.request_play());
        assert_eq!(state.phase(), Phase::Playing);
        assert!(state.request_pause());
        assert_eq!(state.phase(), Phase::Paused);
        assert!(state.request_play());
        assert_eq!(state.phase(), Phase::Playing);
        assert!(state.request_stop());
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn replay_while_playing_is_noop() {
        let mut state = PlaybackState::new();
        assert!(state.request_play());
        assert!(!state.request_play());
        assert_eq!(state.phase(), Phase::Playing);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut state = PlaybackState::new();
        assert!(!state.request_pause());
        assert!(!state.request_stop());
        assert_eq!(state.phase(), Phase::Idle);

        state.request_play();
        state.request_pause();
        assert!(!state.request_pause());
        assert!(!state.request_stop());
        assert_eq!(state.phase(), Phase::Paused);
    }

    #[test]
    fn entering_playing_clears_transient_flags() {
        let mut state = PlaybackState::new();
        state.request_play();
        state.beat_active = true;
        state.heavy_beat_active = true;
        state.request_pause();
        state.request_play();
        assert!(!state.beat_active);
        assert!(!state.heavy_beat_active);
    }

    #[test]
    fn natural_end_resets_progress() {
        let mut state = PlaybackState::new();
        state.request_play();
        state.progress = 0.7;
        state.finish();
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.progress, 0.0);
    }
}
