// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod dataset;
pub mod display;
pub mod keymap;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod stopwatch;
pub mod ui;
pub mod util;
