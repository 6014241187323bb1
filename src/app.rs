use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{backend::Backend, layout::Rect, Terminal};
use std::io;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::display::{DisplayFields, TimeUnit};
use crate::keymap::{command_for_click, command_for_key, Command};
use crate::model::Calibration;
use crate::runtime::{Runner, Ticker, TimerEvent, TimerEventSource};
use crate::stopwatch::{StartOutcome, StopwatchController};
use crate::ui;

/// Settings the interactive app is started with
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub tick_period: Duration,
    pub total_unit: TimeUnit,
}

impl From<&Config> for AppSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            tick_period: Duration::from_millis(cfg.tick_ms),
            total_unit: cfg.total_unit,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Figures of a stopped run, in the units the dataset records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedRun {
    pub total_ms: u64,
    pub interval_ms: u64,
    pub bounces: usize,
}

#[derive(Debug)]
pub struct App<C: Clock> {
    pub stopwatch: StopwatchController<C, DisplayFields>,
    pub calibration: Option<Calibration>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl<C: Clock> App<C> {
    pub fn new(clock: C, settings: &AppSettings, calibration: Option<Calibration>) -> Self {
        Self {
            stopwatch: StopwatchController::new(
                clock,
                DisplayFields::default(),
                settings.tick_period,
                settings.total_unit,
            ),
            calibration,
            status: None,
            should_quit: false,
        }
    }

    pub fn fields(&self) -> &DisplayFields {
        self.stopwatch.display()
    }

    /// None until a run has been stopped
    pub fn finished_run(&self) -> Option<FinishedRun> {
        let session = self.stopwatch.session()?;
        if session.is_running() {
            return None;
        }
        let total = session.elapsed(self.stopwatch.clock().now());
        Some(FinishedRun {
            total_ms: (total.as_secs_f64() * 1000.0).round() as u64,
            interval_ms: self.fields().interval_ms,
            bounces: session.bounces.len(),
        })
    }

    /// Estimated drop height for the finished run, when a model is loaded
    pub fn estimate_cm(&self) -> Option<f64> {
        let calibration = self.calibration.as_ref()?;
        let run = self.finished_run()?;
        Some(calibration.params.predict(run.total_ms as f64, run.interval_ms as f64))
    }

    pub fn apply(&mut self, command: Command) {
        self.status = None;
        match command {
            Command::Start => {
                if self.stopwatch.start() == StartOutcome::Restarted {
                    self.status = Some("restarted".to_string());
                }
            }
            Command::Stop => {
                if let Err(e) = self.stopwatch.stop() {
                    warn!(error = %e, "stop ignored");
                    self.status = Some(e.to_string());
                }
            }
            Command::RecordBounce => {
                if let Err(e) = self.stopwatch.record_bounce() {
                    warn!(error = %e, "bounce ignored");
                    self.status = Some(e.to_string());
                }
            }
            Command::Quit => {
                info!("quit requested");
                self.should_quit = true;
            }
        }
    }

    pub fn on_key(&mut self, key: &KeyEvent) -> bool {
        match command_for_key(key) {
            Some(command) => {
                self.apply(command);
                true
            }
            None => false,
        }
    }

    /// `area` is the full terminal area the UI was last drawn into
    pub fn on_mouse(&mut self, mouse: &MouseEvent, area: Rect) -> bool {
        let buttons = ui::button_areas(area);
        match command_for_click(mouse, &buttons, &self.fields().controls) {
            Some(command) => {
                self.apply(command);
                true
            }
            None => false,
        }
    }

    /// Returns true when the screen needs a redraw
    pub fn on_event(&mut self, event: &TimerEvent, area: Rect) -> bool {
        match event {
            TimerEvent::Key(key) => self.on_key(key),
            TimerEvent::Mouse(mouse) => self.on_mouse(mouse, area),
            TimerEvent::Resize => true,
            TimerEvent::Tick => self.stopwatch.poll_refresh(),
            TimerEvent::Closed => {
                warn!("terminal input closed; quitting");
                self.should_quit = true;
                false
            }
        }
    }
}

/// Longest wait between loop iterations while idle
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Drives `app` until it asks to quit, redrawing after anything that changed the screen
pub fn run_app<B, C, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App<C>,
    runner: &Runner<E, T>,
) -> io::Result<()>
where
    B: Backend,
    C: Clock,
    E: TimerEventSource,
    T: Ticker,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while !app.should_quit {
        let wait = app.stopwatch.time_until_refresh().unwrap_or(IDLE_WAIT);
        let event = runner.step_within(wait);

        let size = terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);
        if app.on_event(&event, area) && !app.should_quit {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    Ok(())
}
