use anyhow::Context;
use clap::Parser;
use nowcast_core::{App, Config, Request, config};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather",
    version,
    about = "Show the current weather where you are",
    after_help = "Environment: WEATHER_CITY overrides the city, WEATHER_DEBUG enables diagnostics."
)]
pub struct Cli {
    /// City name; several words are joined with spaces. Detected from your IP when absent.
    #[arg(trailing_var_arg = true)]
    pub city: Vec<String>,

    /// Log every provider attempt to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Ignore a still-valid cached result.
    #[arg(long)]
    pub no_cache: bool,

    /// Read settings from this file instead of the default config location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Quiet unless asked: `RUST_LOG` wins, then `-v`/`WEATHER_DEBUG`, else errors only.
pub fn init_logging(verbose: bool) {
    let default = if verbose || config::debug_from_env() {
        "nowcast_core=debug,weather=debug"
    } else {
        "error"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => Config::load(),
        }
    }

    /// A broken config file is reported on stderr whatever the log level.
    fn config_or_default(&self) -> Config {
        self.load_config().unwrap_or_else(|e| {
            eprintln!("weather: {e:#}; using defaults");
            Config::default()
        })
    }

    pub async fn run(self) -> ExitCode {
        let config = self.config_or_default();

        let app = match App::from_config(&config) {
            Ok(app) => app,
            Err(e) => {
                eprintln!("weather: {e:#}");
                return ExitCode::FAILURE;
            }
        };

        let mut request = Request::from_sources(&self.city, config::city_from_env());
        request.refresh = self.no_cache;

        match app.run(request).await {
            Ok(summary) => {
                tracing::debug!(from_cache = summary.from_cache, "done");
                println!("{summary}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::debug!(error = %e, "run failed");
                eprintln!("{}", e.user_message());
                ExitCode::FAILURE
            }
        }
    }
}
