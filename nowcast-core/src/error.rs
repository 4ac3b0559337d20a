use std::{fmt, io, time::Duration};

/// Which transport mechanism produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// In-process HTTP client.
    Primary,
    /// External command-line fetch.
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primary => "primary",
            Stage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("bad status {0}")]
    Status(u16),
    #[error("unreadable body: {0}")]
    Body(String),
    #[error("could not run fetch command: {0}")]
    Spawn(String),
    #[error("fetch command exited with {0}")]
    Exit(String),
}

/// Transport-level failure, recorded with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} fetch of {url} failed: {failure}")]
pub struct NetworkError {
    pub stage: Stage,
    pub url: String,
    pub failure: FetchFailure,
}

impl NetworkError {
    pub fn new(stage: Stage, url: impl Into<String>, failure: FetchFailure) -> Self {
        Self {
            stage,
            url: url.into(),
            failure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, FetchFailure::Timeout(_))
    }
}

/// Every geolocation provider failed.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("all {0} location providers failed")]
    Exhausted(usize),
    #[error("location lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Every weather attempt failed for a city.
#[derive(Debug, thiserror::Error)]
#[error("all weather providers failed for '{city}'")]
pub struct WeatherError {
    pub city: String,
}

/// Cache problems. Never leaves the crate as a user-facing failure.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache file")]
    Missing,
    #[error("cache io: {0}")]
    Io(#[from] io::Error),
    #[error("cache contents invalid: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("cache is {age_secs:.0}s old")]
    Expired { age_secs: f64 },
    #[error("cache path has no parent directory")]
    NoParent,
    #[error("cache disabled: no usable path")]
    Disabled,
}

/// Outcomes that end a run without a weather line.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
}

impl RunError {
    /// Short message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            RunError::Location(_) => {
                "Could not determine your location. Set WEATHER_CITY or pass a city name."
                    .to_string()
            }
            RunError::Weather(e) => format!("Weather is unavailable for {}.", e.city),
        }
    }
}
