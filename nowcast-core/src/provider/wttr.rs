use reqwest::Url;
use serde::Deserialize;

use crate::{
    model::WeatherReport,
    net::FetchRequest,
    provider::{AttemptError, ProviderId, WeatherResolver},
};

/// wttr.in serves its JSON most reliably to command-line clients.
const USER_AGENT: &str = "curl";

#[derive(Debug, Deserialize)]
struct WttrResponse {
    #[serde(default)]
    current_condition: Vec<WttrCurrent>,
}

#[derive(Debug, Deserialize)]
struct WttrCurrent {
    #[serde(rename = "temp_F")]
    temp_f: String,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrText>,
}

#[derive(Debug, Deserialize)]
struct WttrText {
    value: String,
}

fn city_url(base: &str, city: &str) -> Result<Url, AttemptError> {
    let mut url = Url::parse(base).map_err(|e| AttemptError::Url(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| AttemptError::Url(format!("{base} cannot take a path")))?
        .pop_if_empty()
        .push(city);
    url.query_pairs_mut().append_pair("format", "j1");
    Ok(url)
}

fn parse(body: &[u8]) -> Result<(f64, String), AttemptError> {
    let parsed: WttrResponse = serde_json::from_slice(body)?;
    let current = parsed
        .current_condition
        .into_iter()
        .next()
        .ok_or(AttemptError::Missing("current_condition"))?;

    let temperature = current
        .temp_f
        .trim()
        .parse::<f64>()
        .map_err(|_| AttemptError::Invalid {
            field: "temp_F",
            value: current.temp_f.clone(),
        })?;

    let condition = current
        .weather_desc
        .into_iter()
        .next()
        .map(|d| d.value.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(AttemptError::Missing("weatherDesc"))?;

    Ok((temperature, condition))
}

/// Current conditions from wttr.in, fetched through the command path.
pub(super) async fn current(
    resolver: &WeatherResolver,
    city: &str,
) -> Result<WeatherReport, AttemptError> {
    let url = city_url(&resolver.endpoints.wttr, city)?;
    let request =
        FetchRequest::new(url.as_str(), resolver.timeout).header("User-Agent", USER_AGENT);
    let body = resolver.transport.fetch_via_command(&request).await?;

    let (temperature_f, condition) = parse(&body)?;
    tracing::debug!(temperature_f, %condition, "wttr.in conditions");

    Ok(WeatherReport {
        provider: ProviderId::Wttr,
        place: None,
        temperature_f,
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_puts_city_in_path() {
        let url = city_url("https://wttr.in", "New York").unwrap();
        assert_eq!(url.as_str(), "https://wttr.in/New%20York?format=j1");

        let url = city_url("http://127.0.0.1:8080/wttr", "Kyiv").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/wttr/Kyiv?format=j1");
    }

    #[test]
    fn parses_current_condition() {
        let body = br#"{
            "current_condition": [{
                "temp_C": "15", "temp_F": "59",
                "weatherDesc": [{"value": "Partly cloudy "}]
            }],
            "nearest_area": []
        }"#;
        let (temp, desc) = parse(body).unwrap();
        assert_eq!(temp, 59.0);
        assert_eq!(desc, "Partly cloudy");
    }

    #[test]
    fn empty_conditions_are_missing() {
        let err = parse(br#"{"current_condition": []}"#).unwrap_err();
        assert!(matches!(err, AttemptError::Missing("current_condition")));

        let body = br#"{"current_condition": [{"temp_F": "40", "weatherDesc": []}]}"#;
        let err = parse(body).unwrap_err();
        assert!(matches!(err, AttemptError::Missing("weatherDesc")));
    }

    #[test]
    fn non_numeric_temperature_is_invalid() {
        let body = br#"{"current_condition": [
            {"temp_F": "warm", "weatherDesc": [{"value": "Sunny"}]}
        ]}"#;
        let err = parse(body).unwrap_err();
        assert!(matches!(err, AttemptError::Invalid { field: "temp_F", .. }));
    }

    #[test]
    fn plain_text_body_is_a_parse_error() {
        let err = parse(b"Unknown location; please try ~Paris").unwrap_err();
        assert!(matches!(err, AttemptError::Parse(_)));
    }
}
