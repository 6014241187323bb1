use bounce_timer::{
    app::{run_app, App, AppSettings},
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    dataset::{append_sample, early_bounces, load_samples, summarize, Sample},
    display::TimeUnit,
    logging,
    model::{calibrate, Calibration, ModelStore},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

/// terminal stopwatch for timing ball bounces
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal stopwatch for timing ball bounces. Start with enter, record each bounce with space, stop with esc. The last interval between bounces and, once calibrated, an estimated drop height are shown when the run stops."
)]
pub struct Cli {
    /// unit for the total time shown at stop
    #[clap(short = 'u', long, value_enum)]
    unit: Option<TimeUnit>,

    /// live refresh interval in milliseconds
    #[clap(short = 't', long)]
    tick_ms: Option<u64>,

    /// model parameters file (defaults to the config directory)
    #[clap(short = 'm', long)]
    model: Option<PathBuf>,

    /// config file to read instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// write the effective settings, flags included, back to the config file
    #[clap(long)]
    save_config: bool,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// fit the drop-height estimator to recorded bounces and save its parameters
    Calibrate(CalibrateArgs),
    /// add a timed drop of known height to the dataset and recalibrate
    Record(RecordArgs),
    /// show the saved calibration and a summary of the dataset
    Results(ResultsArgs),
}

#[derive(Args, Debug, Clone)]
struct FitArgs {
    /// number of random parameter draws
    #[clap(short = 'i', long)]
    iterations: Option<usize>,

    /// only use this many bounces of each drop
    #[clap(long)]
    max_bounce: Option<u32>,

    /// start over instead of improving on the saved parameters
    #[clap(long)]
    fresh: bool,
}

#[derive(Args, Debug, Clone)]
struct CalibrateArgs {
    /// CSV of recorded drops
    #[clap(short = 'd', long)]
    data: PathBuf,

    #[clap(flatten)]
    fit: FitArgs,
}

#[derive(Args, Debug, Clone)]
struct RecordArgs {
    /// CSV of recorded drops; created if missing
    #[clap(short = 'd', long)]
    data: PathBuf,

    /// drop height in centimetres
    #[clap(long)]
    height: f64,

    /// total time of the run in milliseconds
    #[clap(long)]
    total_ms: f64,

    /// last interval between bounces in milliseconds
    #[clap(long)]
    interval_ms: f64,

    /// bounce number the interval ends on
    #[clap(short = 'b', long, default_value_t = 1)]
    bounce: u32,

    #[clap(flatten)]
    fit: FitArgs,
}

#[derive(Args, Debug, Clone)]
struct ResultsArgs {
    /// CSV of recorded drops to summarize
    #[clap(short = 'd', long)]
    data: Option<PathBuf>,
}

impl Cli {
    /// CLI flags win over the config file
    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(unit) = self.unit {
            config.total_unit = unit;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(fit) = self.fit_args() {
            if let Some(iterations) = fit.iterations {
                config.calibration_iterations = iterations;
            }
            if let Some(max_bounce) = fit.max_bounce {
                config.max_calibration_bounce = max_bounce;
            }
        }
        config
    }

    fn fit_args(&self) -> Option<&FitArgs> {
        match &self.command {
            Some(Commands::Calibrate(args)) => Some(&args.fit),
            Some(Commands::Record(args)) => Some(&args.fit),
            _ => None,
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = logging::init_file_logging(&log_path) {
            eprintln!(
                "bounce-timer: logging disabled, cannot open {}: {}",
                log_path.display(),
                e
            );
        }
    }

    let store = cli.config_store();
    let config = cli.apply_overrides(store.load());
    info!(?config, "configuration loaded");

    if cli.save_config {
        store.save(&config)?;
        info!(path = %store.path().display(), "configuration saved");
        println!("config saved to {}", store.path().display());
    }

    match &cli.command {
        Some(Commands::Calibrate(args)) => run_calibrate(&config, args),
        Some(Commands::Record(args)) => run_record(&config, args),
        Some(Commands::Results(args)) => run_results(&config, args),
        None => run_tui(&config),
    }
}

/// Fits the model to the early bounces of `samples` and saves it
fn recalibrate(
    config: &Config,
    samples: &[Sample],
    fit: &FitArgs,
) -> Result<(Calibration, usize, ModelStore), Box<dyn Error>> {
    let used = early_bounces(samples, config.max_calibration_bounce);

    let store = ModelStore::with_path(config.model_path());
    let previous = if fit.fresh { None } else { store.load()? };

    let calibration = calibrate(
        &used,
        config.calibration_iterations,
        &mut rand::thread_rng(),
        previous.as_ref(),
    )?;
    store.save(&calibration)?;
    Ok((calibration, used.len(), store))
}

fn print_calibration(calibration: &Calibration) {
    println!(
        "a = {:.6}\nb = {:.6}\nc = {:.6}\nmse = {:.3}",
        calibration.params.a, calibration.params.b, calibration.params.c, calibration.mse,
    );
}

fn run_calibrate(config: &Config, args: &CalibrateArgs) -> Result<(), Box<dyn Error>> {
    let samples = load_samples(&args.data)?;
    let (calibration, used, store) = recalibrate(config, &samples, &args.fit)?;

    print_calibration(&calibration);
    println!(
        "samples = {} of {}\nsaved to {}",
        used,
        samples.len(),
        store.path().display()
    );
    Ok(())
}

fn run_record(config: &Config, args: &RecordArgs) -> Result<(), Box<dyn Error>> {
    if !(args.height.is_finite() && args.height > 0.0) {
        return Err(format!("height must be a positive number of cm, got {}", args.height).into());
    }
    if !(args.total_ms >= 0.0 && args.interval_ms >= 0.0) {
        return Err("times must not be negative".into());
    }
    if args.bounce == 0 {
        return Err("bounce numbers start at 1".into());
    }

    let sample = Sample {
        height_cm: args.height,
        bounce_number: args.bounce,
        total_ms: args.total_ms,
        interval_ms: args.interval_ms,
    };
    append_sample(&args.data, &sample)?;
    println!("recorded {} cm to {}", args.height, args.data.display());

    let samples = load_samples(&args.data)?;
    let (calibration, used, store) = recalibrate(config, &samples, &args.fit)?;

    print_calibration(&calibration);
    println!(
        "samples = {} of {}\nsaved to {}",
        used,
        samples.len(),
        store.path().display()
    );
    Ok(())
}

fn run_results(config: &Config, args: &ResultsArgs) -> Result<(), Box<dyn Error>> {
    let store = ModelStore::with_path(config.model_path());
    match store.load()? {
        Some(calibration) => {
            print_calibration(&calibration);
            println!(
                "calibrated {}",
                calibration.calibrated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        None => println!("not calibrated ({} not found)", store.path().display()),
    }

    let Some(data) = &args.data else {
        return Ok(());
    };
    let summary = summarize(&load_samples(data)?);

    println!("\nsamples = {}", summary.samples);
    println!("\n{:>10} {:>8} {:>11}", "height cm", "samples", "max bounce");
    for h in &summary.heights {
        println!("{:>10.1} {:>8} {:>11}", h.height_cm, h.samples, h.max_bounce);
    }
    println!(
        "\n{:>6} {:>8} {:>14} {:>17}",
        "bounce", "samples", "mean total ms", "mean interval ms"
    );
    for b in &summary.bounces {
        println!(
            "{:>6} {:>8} {:>14.1} {:>17.1}",
            b.bounce_number, b.samples, b.mean_total_ms, b.mean_interval_ms
        );
    }
    Ok(())
}

fn run_tui(config: &Config) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let calibration = match ModelStore::with_path(config.model_path()).load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "model not loaded; height estimates disabled");
            None
        }
    };

    let settings = AppSettings::from(config);
    let mut app = App::new(SystemClock, &settings, calibration);
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(settings.tick_period.max(Duration::from_millis(1))),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result?;
    Ok(())
}
