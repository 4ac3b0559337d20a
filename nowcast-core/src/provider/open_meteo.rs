use reqwest::Url;
use serde::Deserialize;

use crate::{
    model::WeatherReport,
    net::FetchRequest,
    provider::{AttemptError, ProviderId, WeatherResolver},
};

/// Human description of a WMO weather interpretation code.
/// See: https://open-meteo.com/en/docs
pub fn describe_wmo(code: i32) -> &'static str {
    match code {
        0 => "Clear",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Foggy",
        51 => "Light drizzle",
        53 => "Drizzle",
        55 => "Heavy drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        71 => "Light snow",
        73 => "Snow",
        75 => "Heavy snow",
        95 => "Thunderstorm",
        _ => "Unknown",
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeoCandidate>,
}

/// One geocoding match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoCandidate {
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub admin1: Option<String>,
}

impl GeoCandidate {
    fn in_country(&self, code: &str) -> bool {
        let by_code = self
            .country_code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(code));
        let by_name = code.eq_ignore_ascii_case("US")
            && self.country.as_deref() == Some("United States");
        by_code || by_name
    }

    fn label(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        match self.admin1.as_deref().or(self.country.as_deref()) {
            Some(region) if !region.is_empty() && region != name => {
                Some(format!("{name}, {region}"))
            }
            _ => Some(name.to_string()),
        }
    }
}

/// First candidate in the preferred country, else the top-ranked one.
pub fn pick_candidate<'a>(
    candidates: &'a [GeoCandidate],
    preferred_country: &str,
) -> Option<&'a GeoCandidate> {
    candidates
        .iter()
        .find(|c| c.in_country(preferred_country))
        .or_else(|| candidates.first())
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    weathercode: i32,
}

fn endpoint(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, AttemptError> {
    Url::parse_with_params(&format!("{}{path}", base.trim_end_matches('/')), params)
        .map_err(|e| AttemptError::Url(e.to_string()))
}

/// Geocode `city`, then read the current conditions at the chosen match.
pub(super) async fn current(
    resolver: &WeatherResolver,
    city: &str,
) -> Result<WeatherReport, AttemptError> {
    let geo_url = endpoint(
        &resolver.endpoints.geocoding,
        "/v1/search",
        &[
            ("name", city.to_string()),
            ("count", resolver.geocode_results.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ],
    )?;
    let geo: GeocodeResponse = resolver
        .transport
        .fetch_json(&FetchRequest::new(geo_url.as_str(), resolver.timeout))
        .await?;

    let location = pick_candidate(&geo.results, &resolver.preferred_country)
        .ok_or(AttemptError::NoCandidates)?;
    tracing::debug!(
        place = location.label().as_deref().unwrap_or("unknown"),
        country = location.country_code.as_deref().unwrap_or(""),
        lat = location.latitude,
        lon = location.longitude,
        "open-meteo location"
    );

    let weather_url = endpoint(
        &resolver.endpoints.forecast,
        "/v1/forecast",
        &[
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
        ],
    )?;
    let forecast: ForecastResponse = resolver
        .transport
        .fetch_json(&FetchRequest::new(weather_url.as_str(), resolver.timeout))
        .await?;
    let current = forecast
        .current_weather
        .ok_or(AttemptError::Missing("current_weather"))?;

    tracing::debug!(code = current.weathercode, "open-meteo weather code");

    Ok(WeatherReport {
        provider: ProviderId::OpenMeteo,
        place: location.label(),
        temperature_f: current.temperature,
        condition: describe_wmo(current.weathercode).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(code: Option<&str>, country: Option<&str>, lat: f64) -> GeoCandidate {
        GeoCandidate {
            name: Some("Springfield".into()),
            latitude: lat,
            longitude: 0.0,
            country_code: code.map(Into::into),
            country: country.map(Into::into),
            admin1: None,
        }
    }

    #[test]
    fn wmo_table() {
        assert_eq!(describe_wmo(0), "Clear");
        assert_eq!(describe_wmo(2), "Partly cloudy");
        assert_eq!(describe_wmo(3), "Overcast");
        assert_eq!(describe_wmo(45), "Foggy");
        assert_eq!(describe_wmo(48), "Foggy");
        assert_eq!(describe_wmo(55), "Heavy drizzle");
        assert_eq!(describe_wmo(61), "Light rain");
        assert_eq!(describe_wmo(73), "Snow");
        assert_eq!(describe_wmo(95), "Thunderstorm");
    }

    #[test]
    fn unknown_wmo_codes() {
        for code in [999, -1, 4, 96, 99, i32::MAX] {
            assert_eq!(describe_wmo(code), "Unknown");
        }
    }

    #[test]
    fn first_us_candidate_in_provider_order() {
        let candidates = vec![
            candidate(Some("GB"), Some("United Kingdom"), 1.0),
            candidate(Some("US"), Some("United States"), 2.0),
            candidate(Some("US"), Some("United States"), 3.0),
        ];
        assert_eq!(pick_candidate(&candidates, "US").unwrap().latitude, 2.0);
    }

    #[test]
    fn country_name_counts_as_us() {
        let candidates = vec![
            candidate(Some("CA"), Some("Canada"), 1.0),
            candidate(None, Some("United States"), 2.0),
        ];
        assert_eq!(pick_candidate(&candidates, "US").unwrap().latitude, 2.0);
    }

    #[test]
    fn without_preferred_match_take_first() {
        let candidates = vec![
            candidate(Some("JP"), Some("Japan"), 1.0),
            candidate(Some("CN"), Some("China"), 2.0),
        ];
        assert_eq!(pick_candidate(&candidates, "US").unwrap().latitude, 1.0);
        assert!(pick_candidate(&[], "US").is_none());
    }

    #[test]
    fn label_skips_duplicate_region() {
        let mut c = candidate(Some("SG"), Some("Singapore"), 1.0);
        c.name = Some("Singapore".into());
        assert_eq!(c.label().as_deref(), Some("Singapore"));

        c.admin1 = Some("Central".into());
        assert_eq!(c.label().as_deref(), Some("Singapore, Central"));
    }

    #[test]
    fn endpoint_encodes_city() {
        let url = endpoint(
            "https://geocoding-api.open-meteo.com/",
            "/v1/search",
            &[("name", "São Paulo".to_string())],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://geocoding-api.open-meteo.com/v1/search?name=S%C3%A3o+Paulo"
        );
    }
}
