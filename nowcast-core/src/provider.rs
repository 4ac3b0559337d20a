use std::time::{Duration, Instant};

use crate::{
    Config,
    config::Endpoints,
    error::{NetworkError, WeatherError},
    model::{ResolvedLocation, WeatherReport},
    net::Transport,
};

pub mod open_meteo;
pub mod wttr;

/// Weather providers, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    Wttr,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::Wttr => "wttr.in",
        }
    }

    /// Primary first: better data beats lower latency.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::Wttr]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single provider attempt produced nothing. Never leaves the resolver.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bad request url: {0}")]
    Url(String),
    #[error("no geocoding results")]
    NoCandidates,
    #[error("response is missing {0}")]
    Missing(&'static str),
    #[error("response field {field} is invalid: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Sequential failover across every [`ProviderId`].
#[derive(Debug, Clone)]
pub struct WeatherResolver {
    transport: Transport,
    endpoints: Endpoints,
    timeout: Duration,
    geocode_results: u8,
    preferred_country: String,
}

impl WeatherResolver {
    pub fn new(transport: Transport, config: &Config) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeout: config.weather_timeout(),
            geocode_results: config.geocode_results,
            preferred_country: config.preferred_country.clone(),
        }
    }

    /// Current conditions for `location.city`, from the first provider that
    /// delivers them.
    pub async fn resolve(
        &self,
        location: &ResolvedLocation,
    ) -> Result<WeatherReport, WeatherError> {
        if let Some((lat, lon)) = location.coordinates() {
            tracing::debug!(city = %location.city, lat, lon, "resolving weather");
        }

        for &id in ProviderId::all() {
            let started = Instant::now();
            let result = self.attempt(id, &location.city).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(report) => {
                    tracing::debug!(
                        provider = %id,
                        elapsed_ms,
                        weather = %report,
                        "weather resolved"
                    );
                    return Ok(report);
                }
                Err(e) => tracing::debug!(
                    provider = %id,
                    elapsed_ms,
                    error = %e,
                    "weather provider failed"
                ),
            }
        }

        tracing::warn!(city = %location.city, "all weather sources failed");
        Err(WeatherError {
            city: location.city.clone(),
        })
    }

    async fn attempt(&self, id: ProviderId, city: &str) -> Result<WeatherReport, AttemptError> {
        match id {
            ProviderId::OpenMeteo => open_meteo::current(self, city).await,
            ProviderId::Wttr => wttr::current(self, city).await,
        }
    }
}
