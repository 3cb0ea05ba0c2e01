use std::time::{Duration, Instant};

/// Periodic tick scheduler driven by explicit timestamps.
///
/// Re-arming always cancels the running timer and starts a fresh one from the
/// last observed instant, so a speed change never double-fires.
pub struct GameClock {
    now: Instant,
    timer: Option<Timer>,
}

struct Timer {
    interval: Duration,
    due: Instant,
}

impl GameClock {
    pub fn new(now: Instant) -> Self {
        GameClock { now, timer: None }
    }

    pub fn advance_to(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn arm(&mut self, interval: Duration) {
        self.timer = Some(Timer { interval, due: self.now + interval });
    }

    pub fn disarm(&mut self) {
        self.timer = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.timer.as_ref().map(|t| t.interval)
    }

    /// Consumes at most one pending firing.
    pub fn fire(&mut self) -> bool {
        let now = self.now;
        match &mut self.timer {
            Some(timer) if now >= timer.due => {
                timer.due += timer.interval;
                // Late polls don't catch up with a burst of ticks
                if timer.due <= now {
                    timer.due = now + timer.interval;
                }
                true
            },
            _ => false,
        }
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.timer.as_ref().map(|t| t.due.saturating_duration_since(now))
    }
}
