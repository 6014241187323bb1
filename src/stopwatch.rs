use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::display::{format_seconds, Controls, DisplaySink, TimeUnit};
use crate::schedule::RepeatingTimer;
use crate::session::{calculate_interval, Session};

pub const DEFAULT_TICK_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("timer is not running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// start while running throws the old session away
    Restarted,
}

/// Owns the session and the refresh timer, publishes to `D`
#[derive(Debug)]
pub struct StopwatchController<C: Clock, D: DisplaySink> {
    clock: C,
    display: D,
    session: Option<Session>,
    refresh: Option<RepeatingTimer>,
    tick_period: Duration,
    total_unit: TimeUnit,
}

impl<C: Clock, D: DisplaySink> StopwatchController<C, D> {
    pub fn new(clock: C, mut display: D, tick_period: Duration, total_unit: TimeUnit) -> Self {
        display.set_controls(Controls::idle());
        Self {
            clock,
            display,
            session: None,
            refresh: None,
            tick_period,
            total_unit,
        }
    }

    pub fn state(&self) -> StopwatchState {
        match &self.session {
            Some(s) if s.is_running() => StopwatchState::Running,
            _ => StopwatchState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == StopwatchState::Running
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current or last finished session
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn total_unit(&self) -> TimeUnit {
        self.total_unit
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn is_refresh_armed(&self) -> bool {
        self.refresh.is_some()
    }

    pub fn start(&mut self) -> StartOutcome {
        let now = self.clock.now();
        let outcome = if self.is_running() {
            StartOutcome::Restarted
        } else {
            StartOutcome::Started
        };

        self.session = Some(Session::new(now));
        self.refresh = Some(RepeatingTimer::new(self.tick_period, now));

        self.display.show_elapsed(format_seconds(Duration::ZERO));
        self.display.show_total(None);
        self.display.show_interval(0);
        self.display.set_controls(Controls::running());

        info!(?outcome, "stopwatch started");
        outcome
    }

    /// Final elapsed time of the run
    pub fn stop(&mut self) -> Result<Duration, TransitionError> {
        let now = self.clock.now();
        let session = match self.session.as_mut() {
            Some(s) if s.is_running() => s,
            _ => return Err(TransitionError::NotRunning),
        };

        self.refresh = None;
        let total = session.finish(now);
        let interval = calculate_interval(&session.bounces);

        self.display.show_elapsed(format_seconds(total));
        self.display.show_total(Some(self.total_unit.format(total)));
        self.display.show_interval(interval);
        self.display.set_controls(Controls::idle());

        info!(
            total_ms = total.as_millis() as u64,
            bounces = session.bounces.len(),
            interval_ms = interval,
            "stopwatch stopped"
        );
        Ok(total)
    }

    /// Elapsed offset of the new bounce
    pub fn record_bounce(&mut self) -> Result<Duration, TransitionError> {
        let now = self.clock.now();
        let session = match self.session.as_mut() {
            Some(s) if s.is_running() => s,
            _ => return Err(TransitionError::NotRunning),
        };

        let at = session.record_bounce(now);
        let count = session.bounces.len();
        let interval = self.calculate_interval();
        debug!(bounce = count, at_ms = at.as_millis() as u64, interval_ms = interval, "bounce recorded");
        Ok(at)
    }

    /// Recomputes the last interval and publishes it
    pub fn calculate_interval(&mut self) -> u64 {
        let interval = self
            .session
            .as_ref()
            .map(|s| calculate_interval(&s.bounces))
            .unwrap_or(0);
        self.display.show_interval(interval);
        interval
    }

    /// Publishes the live elapsed time
    pub fn tick(&mut self) -> Result<Duration, TransitionError> {
        let now = self.clock.now();
        let elapsed = match self.session.as_ref() {
            Some(s) if s.is_running() => s.elapsed(now),
            _ => return Err(TransitionError::NotRunning),
        };
        self.display.show_elapsed(format_seconds(elapsed));
        Ok(elapsed)
    }

    /// Fires `tick` if the refresh timer is due. Returns whether it fired.
    pub fn poll_refresh(&mut self) -> bool {
        let now = self.clock.now();
        let due = match self.refresh.as_mut() {
            Some(timer) => timer.poll(now),
            None => false,
        };
        due && self.tick().is_ok()
    }

    /// How long the host loop may sleep before the next refresh
    pub fn time_until_refresh(&self) -> Option<Duration> {
        self.refresh
            .as_ref()
            .map(|t| t.time_until_due(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::display::DisplayFields;
    use assert_matches::assert_matches;

    fn controller(unit: TimeUnit) -> (ManualClock, StopwatchController<ManualClock, DisplayFields>) {
        let clock = ManualClock::new();
        let sw = StopwatchController::new(
            clock.clone(),
            DisplayFields::default(),
            Duration::from_millis(DEFAULT_TICK_MS),
            unit,
        );
        (clock, sw)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let (_clock, sw) = controller(TimeUnit::Seconds);
        assert_eq!(sw.state(), StopwatchState::Idle);
        assert!(sw.session().is_none());
        assert!(!sw.is_refresh_armed());
        assert_eq!(sw.display().controls, Controls::idle());
    }

    #[test]
    fn test_two_bounces_give_interval() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        clock.set_ms(1_000);
        sw.record_bounce().unwrap();
        clock.set_ms(2_500);
        sw.record_bounce().unwrap();

        assert_eq!(sw.display().interval_ms, 1500);
    }

    #[test]
    fn test_interval_zero_after_start_and_single_bounce() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        assert_eq!(sw.display().interval_ms, 0);

        clock.set_ms(700);
        sw.record_bounce().unwrap();
        assert_eq!(sw.display().interval_ms, 0);
    }

    #[test]
    fn test_stop_without_bounces_seconds() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        clock.set_ms(3_200);
        let total = sw.stop().unwrap();

        assert_eq!(total, Duration::from_millis(3_200));
        assert_eq!(sw.display().total.as_deref(), Some("3.20"));
        assert_eq!(sw.display().interval_ms, 0);
        assert_eq!(sw.state(), StopwatchState::Idle);
    }

    #[test]
    fn test_stop_without_bounces_millis() {
        let (clock, mut sw) = controller(TimeUnit::Milliseconds);
        sw.start();
        clock.set_ms(3_200);
        sw.stop().unwrap();

        assert_eq!(sw.display().total.as_deref(), Some("3200"));
        assert_eq!(sw.display().interval_ms, 0);
    }

    #[test]
    fn test_double_stop_is_rejected_and_does_not_advance() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        clock.set_ms(1_000);
        sw.stop().unwrap();

        clock.set_ms(5_000);
        assert_matches!(sw.stop(), Err(TransitionError::NotRunning));
        assert_eq!(sw.display().total.as_deref(), Some("1.00"));
        assert_eq!(
            sw.session().unwrap().elapsed(sw.clock().now()),
            Duration::from_millis(1_000)
        );
    }

    #[test]
    fn test_stop_while_never_started() {
        let (_clock, mut sw) = controller(TimeUnit::Seconds);
        assert_matches!(sw.stop(), Err(TransitionError::NotRunning));
        assert_eq!(sw.display().total, None);
    }

    #[test]
    fn test_bounce_while_idle_is_rejected() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        assert_matches!(sw.record_bounce(), Err(TransitionError::NotRunning));

        sw.start();
        clock.set_ms(500);
        sw.record_bounce().unwrap();
        sw.stop().unwrap();
        assert_matches!(sw.record_bounce(), Err(TransitionError::NotRunning));
        assert_eq!(sw.session().unwrap().bounces.len(), 1);
    }

    #[test]
    fn test_restart_measures_from_latest_start() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        assert_eq!(sw.start(), StartOutcome::Started);
        clock.set_ms(200);
        sw.record_bounce().unwrap();

        clock.set_ms(500);
        assert_eq!(sw.start(), StartOutcome::Restarted);
        assert!(sw.session().unwrap().bounces.is_empty());

        clock.set_ms(1_500);
        let at = sw.record_bounce().unwrap();
        assert_eq!(at, Duration::from_millis(1_000));

        clock.set_ms(2_500);
        assert_eq!(sw.stop().unwrap(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_start_after_stop_clears_outputs() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        clock.set_ms(1_000);
        sw.record_bounce().unwrap();
        clock.set_ms(1_400);
        sw.record_bounce().unwrap();
        clock.set_ms(2_000);
        sw.stop().unwrap();
        assert_eq!(sw.display().interval_ms, 400);

        assert_eq!(sw.start(), StartOutcome::Started);
        assert_eq!(sw.display().interval_ms, 0);
        assert_eq!(sw.display().total, None);
        assert_eq!(sw.display().elapsed, "0.00");
        assert_eq!(sw.display().controls, Controls::running());
    }

    #[test]
    fn test_tick_publishes_elapsed() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        assert_matches!(sw.tick(), Err(TransitionError::NotRunning));

        sw.start();
        clock.set_ms(1_234);
        sw.tick().unwrap();
        assert_eq!(sw.display().elapsed, "1.23");
    }

    #[test]
    fn test_refresh_fires_on_cadence_and_cancels_on_stop() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        assert!(sw.is_refresh_armed());

        clock.advance_ms(50);
        assert!(!sw.poll_refresh());
        clock.advance_ms(50);
        assert!(sw.poll_refresh());
        assert_eq!(sw.display().elapsed, "0.10");
        assert_eq!(sw.time_until_refresh(), Some(Duration::from_millis(100)));

        clock.advance_ms(30);
        sw.stop().unwrap();
        assert!(!sw.is_refresh_armed());
        assert_eq!(sw.time_until_refresh(), None);

        clock.advance_ms(1_000);
        assert!(!sw.poll_refresh());
        assert_eq!(sw.display().elapsed, "0.13");
    }

    #[test]
    fn test_controls_follow_state() {
        let (clock, mut sw) = controller(TimeUnit::Seconds);
        sw.start();
        assert_eq!(sw.display().controls, Controls::running());
        clock.advance_ms(10);
        sw.stop().unwrap();
        assert_eq!(sw.display().controls, Controls::idle());
    }
}
