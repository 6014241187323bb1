use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit used for the total time written at stop
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    pub fn format(&self, d: Duration) -> String {
        match self {
            TimeUnit::Seconds => format_seconds(d),
            TimeUnit::Milliseconds => format_millis(d),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
        }
    }
}

/// Seconds with two decimals, e.g. "3.20"
pub fn format_seconds(d: Duration) -> String {
    format!("{:.2}", d.as_secs_f64())
}

/// Whole milliseconds, rounded, e.g. "3200"
pub fn format_millis(d: Duration) -> String {
    format!("{}", (d.as_secs_f64() * 1000.0).round() as u64)
}

/// Which of the three controls accept clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
    pub bounce: bool,
}

impl Controls {
    pub fn idle() -> Self {
        Self {
            start: true,
            stop: false,
            bounce: false,
        }
    }

    pub fn running() -> Self {
        Self {
            start: false,
            stop: true,
            bounce: true,
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::idle()
    }
}

/// Output side of the stopwatch. The controller only ever writes through this.
pub trait DisplaySink {
    fn show_elapsed(&mut self, text: String);
    /// `None` clears the field
    fn show_total(&mut self, text: Option<String>);
    fn show_interval(&mut self, ms: u64);
    fn set_controls(&mut self, controls: Controls);
}

/// In-memory display fields, read back by the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFields {
    pub elapsed: String,
    pub total: Option<String>,
    pub interval_ms: u64,
    pub controls: Controls,
}

impl Default for DisplayFields {
    fn default() -> Self {
        Self {
            elapsed: "0.00".to_string(),
            total: None,
            interval_ms: 0,
            controls: Controls::idle(),
        }
    }
}

impl DisplaySink for DisplayFields {
    fn show_elapsed(&mut self, text: String) {
        self.elapsed = text;
    }

    fn show_total(&mut self, text: Option<String>) {
        self.total = text;
    }

    fn show_interval(&mut self, ms: u64) {
        self.interval_ms = ms;
    }

    fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }
}
