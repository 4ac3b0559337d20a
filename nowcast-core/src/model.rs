use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::ProviderId;

/// Where the user is, as far as one run is concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ResolvedLocation {
    pub fn named(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub provider: ProviderId,
    /// Place label the provider resolved the city to, when it reports one.
    pub place: Option<String>,
    pub temperature_f: f64,
    pub condition: String,
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}F, {}", self.temperature_f, self.condition)
    }
}

/// On-disk record of the latest successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub city: String,
    #[serde(rename = "weather")]
    pub weather_text: String,
}

impl CacheRecord {
    pub fn new(timestamp: f64, city: impl Into<String>, weather_text: impl Into<String>) -> Self {
        Self {
            timestamp,
            city: city.into(),
            weather_text: weather_text.into(),
        }
    }

    pub fn age_secs(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    pub fn is_fresh(&self, now: f64, ttl_secs: u64) -> bool {
        self.age_secs(now) < ttl_secs as f64
    }
}

/// What a run prints.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub city: String,
    pub weather: String,
    pub from_cache: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You are in {}. The current weather is {}.",
            self.city, self.weather
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display_drops_trailing_zero() {
        let report = WeatherReport {
            provider: ProviderId::OpenMeteo,
            place: None,
            temperature_f: 59.0,
            condition: "Overcast".into(),
        };
        assert_eq!(report.to_string(), "59F, Overcast");

        let report = WeatherReport {
            temperature_f: 71.4,
            ..report
        };
        assert_eq!(report.to_string(), "71.4F, Overcast");
    }

    #[test]
    fn cache_record_uses_weather_key_on_disk() {
        let record = CacheRecord::new(1_700_000_000.5, "Lyon", "50F, Rain");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["weather"], "50F, Rain");
        assert_eq!(json["city"], "Lyon");

        // integer timestamps written by other tools still parse
        let parsed: CacheRecord =
            serde_json::from_str(r#"{"timestamp": 1700000000, "city": "Lyon", "weather": "x"}"#)
                .unwrap();
        assert_eq!(parsed.timestamp, 1_700_000_000.0);
    }

    #[test]
    fn freshness_window_is_exclusive() {
        let record = CacheRecord::new(1000.0, "Oslo", "30F, Snow");
        assert!(record.is_fresh(1000.0 + 1799.0, 1800));
        assert!(!record.is_fresh(1000.0 + 1800.0, 1800));
        assert!(!record.is_fresh(1000.0 + 5000.0, 1800));
    }

    #[test]
    fn summary_line() {
        let summary = Summary {
            city: "Tokyo".into(),
            weather: "59F, Overcast".into(),
            from_cache: false,
        };
        assert_eq!(
            summary.to_string(),
            "You are in Tokyo. The current weather is 59F, Overcast."
        );
    }
}
