use itertools::Itertools;
use std::time::{Duration, Instant};

/// One timing run, from `start` until the next `start`
#[derive(Debug, Clone)]
pub struct Session {
    pub started_at: Instant,
    pub stopped_at: Option<Instant>,
    /// Offsets from `started_at`, in recording order
    pub bounces: Vec<Duration>,
}

impl Session {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            stopped_at: None,
            bounces: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Time since start; frozen once the session is stopped
    pub fn elapsed(&self, now: Instant) -> Duration {
        let end = self.stopped_at.unwrap_or(now);
        end.saturating_duration_since(self.started_at)
    }

    /// Appends the offset of `now` and returns it.
    /// Offsets never decrease even if the clock stalls.
    pub fn record_bounce(&mut self, now: Instant) -> Duration {
        let mut at = self.elapsed(now);
        if let Some(&last) = self.bounces.last() {
            at = at.max(last);
        }
        self.bounces.push(at);
        at
    }

    pub fn finish(&mut self, now: Instant) -> Duration {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(now.max(self.started_at));
        }
        self.elapsed(now)
    }

    pub fn last_interval_ms(&self) -> u64 {
        calculate_interval(&self.bounces)
    }
}

fn round_ms(d: Duration) -> u64 {
    (d.as_secs_f64() * 1000.0).round() as u64
}

/// Milliseconds between the two most recent bounces, rounded; 0 with fewer than two
pub fn calculate_interval(bounces: &[Duration]) -> u64 {
    match bounces {
        [.., previous, last] => round_ms(last.saturating_sub(*previous)),
        _ => 0,
    }
}

/// Rounded milliseconds between each bounce and the one before it.
/// The last entry always equals `calculate_interval`.
pub fn bounce_intervals_ms(bounces: &[Duration]) -> Vec<u64> {
    bounces
        .iter()
        .tuple_windows()
        .map(|(a, b)| round_ms(b.saturating_sub(*a)))
        .collect()
}
