use std::time::{Duration, Instant};

/// Fixed-cadence repeating timer. Owned by whoever wants the callback;
/// dropping it is the cancellation.
#[derive(Debug, Clone)]
pub struct RepeatingTimer {
    period: Duration,
    next_due: Instant,
}

impl RepeatingTimer {
    /// Arms the timer; the first firing is one period after `armed_at`
    pub fn new(period: Duration, armed_at: Instant) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            next_due: armed_at + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Returns true when a firing is due at `now` and schedules the next one.
    /// Missed periods collapse into a single firing.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        let behind = now.duration_since(self.next_due);
        let skipped = (behind.as_nanos() / self.period.as_nanos()) as u32;
        self.next_due += self.period * (skipped + 1);
        true
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }
}
