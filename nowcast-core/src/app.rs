use crate::{
    Config,
    cache::{CacheStore, now_secs},
    error::RunError,
    location::LocationResolver,
    model::{CacheRecord, ResolvedLocation, Summary},
    net::Transport,
    provider::WeatherResolver,
};

/// Input for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// City chosen by the user; skips the cache and location detection.
    pub city: Option<String>,
    /// Ignore a valid cache entry. The fresh result is still written.
    pub refresh: bool,
}

impl Request {
    /// Command-line words win over the environment override.
    pub fn from_sources(args: &[String], env_city: Option<String>) -> Self {
        let joined = args.join(" ");
        let city = Some(joined.trim().to_string())
            .filter(|c| !c.is_empty())
            .or_else(|| env_city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()));

        Self {
            city,
            refresh: false,
        }
    }
}

/// Cache check, then location, then weather, then cache write.
#[derive(Debug, Clone)]
pub struct App {
    cache: CacheStore,
    location: LocationResolver,
    weather: WeatherResolver,
}

impl App {
    pub fn new(config: &Config, transport: Transport, cache: CacheStore) -> Self {
        Self {
            location: LocationResolver::new(transport.clone(), config),
            weather: WeatherResolver::new(transport, config),
            cache,
        }
    }

    /// Production wiring: real transport, cache at the configured path.
    /// Only a transport that cannot be built is an error.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let transport = Transport::from_config(config)?;
        let cache = CacheStore::from_config(config);
        Ok(Self::new(config, transport, cache))
    }

    pub async fn run(&self, request: Request) -> Result<Summary, RunError> {
        let manual_city = request.city.filter(|c| !c.trim().is_empty());

        if manual_city.is_none() && !request.refresh {
            if let Some(record) = self.cache.load() {
                return Ok(Summary {
                    city: record.city,
                    weather: record.weather_text,
                    from_cache: true,
                });
            }
        }

        let location = match manual_city {
            Some(city) => {
                tracing::debug!(%city, "using requested city");
                ResolvedLocation::named(city)
            }
            None => self.location.resolve().await?,
        };

        let report = self.weather.resolve(&location).await?;
        let weather = report.to_string();

        let record = CacheRecord::new(now_secs(), location.city.as_str(), weather.as_str());
        self.cache.save(&record);

        Ok(Summary {
            city: location.city,
            weather,
            from_cache: false,
        })
    }
}
