use std::thread;
use std::time::{Duration, Instant};

/// Fixed-rate driver for the tick loop. Also anchors the monotonic
/// millisecond clock the analysis timestamps are derived from, so all
/// `now_ms` values handed to the processors share one origin.
pub struct IntervalTimer {
    interval: Duration,
    origin: Instant,
    last_tick: Instant,
    frames: u32,
    last_rate_log: Instant,
}

impl IntervalTimer {
    pub fn new(freq_hz: f32) -> IntervalTimer {
        let interval = Duration::from_micros((1_000_000.0 / freq_hz) as u64);
        let now = Instant::now();

        IntervalTimer {
            interval,
            origin: now,
            last_tick: now,
            frames: 0,
            last_rate_log: now,
        }
    }

    /// Milliseconds since the timer was created. Monotonic and
    /// non-decreasing, which the detector cooldowns rely on.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    pub fn sleep_until_next_tick(&mut self) {
        self.update_rate_gauge();

        let next_tick = if self.last_tick + self.interval > Instant::now() {
            self.last_tick + self.interval
        } else {
            log::debug!("Tick loop skipped a frame");
            Instant::now() + self.interval
        };

        thread::sleep(next_tick - Instant::now());
        self.last_tick = next_tick;
    }

    fn update_rate_gauge(&mut self) {
        self.frames += 1;

        if Instant::now() - self.last_rate_log > Duration::from_secs(1) {
            log::trace!("Tick rate: {} Hz", self.frames);
            self.frames = 0;
            self.last_rate_log = Instant::now();
        }
    }
}
