//! IP geolocation: both providers race, the first usable answer wins.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::{
    Config,
    config::Endpoints,
    error::{LocationError, NetworkError},
    model::ResolvedLocation,
    net::{FetchRequest, Transport},
};

/// Geolocation providers, in the order their requests are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationSource {
    IpapiCo,
    IpApiCom,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::IpapiCo => "ipapi.co",
            LocationSource::IpApiCom => "ip-api.com",
        }
    }

    pub const fn all() -> &'static [LocationSource] {
        &[LocationSource::IpapiCo, LocationSource::IpApiCom]
    }

    pub fn url(&self, endpoints: &Endpoints) -> String {
        let base = match self {
            LocationSource::IpapiCo => &endpoints.ipapi_co,
            LocationSource::IpApiCom => &endpoints.ip_api_com,
        };
        format!("{}/json/", base.trim_end_matches('/'))
    }

    /// Map this provider's response schema onto [`ResolvedLocation`].
    pub fn parse(&self, body: &[u8]) -> Result<ResolvedLocation, LookupError> {
        match self {
            LocationSource::IpapiCo => parse_ipapi_co(body),
            LocationSource::IpApiCom => parse_ip_api_com(body),
        }
    }
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why one provider produced no location.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("provider refused: {0}")]
    Rejected(String),
    #[error("response has no city")]
    NoCity,
}

#[derive(Debug, Deserialize)]
struct IpapiCoResponse {
    city: Option<String>,
    region: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpApiComResponse {
    status: Option<String>,
    message: Option<String>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn parse_ipapi_co(body: &[u8]) -> Result<ResolvedLocation, LookupError> {
    from_ipapi_co(serde_json::from_slice(body)?)
}

fn from_ipapi_co(parsed: IpapiCoResponse) -> Result<ResolvedLocation, LookupError> {
    if parsed.error {
        return Err(LookupError::Rejected(
            parsed.reason.unwrap_or_else(|| "unspecified".to_string()),
        ));
    }

    let city = non_empty(parsed.city).ok_or(LookupError::NoCity)?;
    tracing::debug!(
        %city,
        region = parsed.region.as_deref().unwrap_or(""),
        "ipapi.co answered"
    );

    Ok(ResolvedLocation {
        city,
        latitude: parsed.latitude,
        longitude: parsed.longitude,
    })
}

fn parse_ip_api_com(body: &[u8]) -> Result<ResolvedLocation, LookupError> {
    from_ip_api_com(serde_json::from_slice(body)?)
}

fn from_ip_api_com(parsed: IpApiComResponse) -> Result<ResolvedLocation, LookupError> {
    if parsed.status.as_deref() != Some("success") {
        return Err(LookupError::Rejected(
            parsed.message.unwrap_or_else(|| "status is not success".to_string()),
        ));
    }

    let city = non_empty(parsed.city).ok_or(LookupError::NoCity)?;
    tracing::debug!(
        %city,
        region = parsed.region_name.as_deref().unwrap_or(""),
        "ip-api.com answered"
    );

    Ok(ResolvedLocation {
        city,
        latitude: parsed.lat,
        longitude: parsed.lon,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

async fn lookup(
    transport: &Transport,
    source: LocationSource,
    request: &FetchRequest,
) -> Result<ResolvedLocation, LookupError> {
    match source {
        LocationSource::IpapiCo => from_ipapi_co(transport.fetch_json(request).await?),
        LocationSource::IpApiCom => from_ip_api_com(transport.fetch_json(request).await?),
    }
}

/// Races every [`LocationSource`] and keeps the first success.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    transport: Transport,
    endpoints: Endpoints,
    timeout: Duration,
    deadline: Duration,
}

impl LocationResolver {
    pub fn new(transport: Transport, config: &Config) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeout: config.location_timeout(),
            deadline: config.location_race_deadline(),
        }
    }

    /// Launch all lookups at once and return the first that succeeds.
    ///
    /// Losing lookups are aborted when this returns; their results are never
    /// awaited. The whole race is bounded by the configured deadline.
    pub async fn resolve(&self) -> Result<ResolvedLocation, LocationError> {
        let mut tasks = JoinSet::new();
        for &source in LocationSource::all() {
            let transport = self.transport.clone();
            let request = FetchRequest::new(source.url(&self.endpoints), self.timeout);
            tasks.spawn(async move {
                let started = Instant::now();
                let result = lookup(&transport, source, &request).await;
                (source, started.elapsed(), result)
            });
        }

        let race = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((source, elapsed, Ok(location))) => {
                        tracing::debug!(
                            provider = %source,
                            elapsed_ms = elapsed.as_millis() as u64,
                            city = %location.city,
                            "location detected"
                        );
                        return Some(location);
                    }
                    Ok((source, elapsed, Err(e))) => tracing::debug!(
                        provider = %source,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "location provider failed"
                    ),
                    Err(e) => tracing::debug!(error = %e, "location task did not finish"),
                }
            }
            None
        };

        // dropping `tasks` on return aborts whatever is still running
        match tokio::time::timeout(self.deadline, race).await {
            Ok(Some(location)) => Ok(location),
            Ok(None) => {
                tracing::warn!("failed to detect location from all sources");
                Err(LocationError::Exhausted(LocationSource::all().len()))
            }
            Err(_) => {
                tracing::warn!(deadline = ?self.deadline, "location detection timed out");
                Err(LocationError::Timeout(self.deadline))
            }
        }
    }
}
