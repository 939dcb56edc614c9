//! Weather tools for the weather specialist, backed by the Open-Meteo API.
//!
//! Two HTTP round-trips per city: geocoding to resolve the name, then the
//! forecast endpoint for current conditions. Failures surface as tool errors
//! and degrade into observations in the calling loop.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ParamSpec, Tool};
use crate::agent::RunContext;
use crate::signature::FieldType;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Resolve a city name to coordinates. Returns `None` for unknown cities.
async fn geocode(client: &reqwest::Client, city: &str) -> anyhow::Result<Option<GeocodingResult>> {
    let url = format!(
        "{}?name={}&count=1&language=en&format=json",
        GEOCODING_URL,
        urlencoding::encode(city)
    );
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Geocoding API error ({})", response.status());
    }
    let parsed: GeocodingResponse = response.json().await?;
    Ok(parsed.results.into_iter().next())
}

/// Fetch current conditions for coordinates.
async fn current_conditions(
    client: &reqwest::Client,
    lat: f64,
    lon: f64,
    full: bool,
) -> anyhow::Result<CurrentConditions> {
    let fields = if full {
        "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code"
    } else {
        "temperature_2m"
    };
    let url = format!(
        "{}?latitude={}&longitude={}&current={}",
        FORECAST_URL, lat, lon, fields
    );
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Weather API error ({})", response.status());
    }
    let parsed: ForecastResponse = response.json().await?;
    Ok(parsed.current)
}

/// Render the single-city weather report string.
fn format_weather_report(city: &str, country: &str, current: &CurrentConditions) -> String {
    format!(
        "Weather in {}, {}: Temperature: {}°C, Humidity: {}%, Wind Speed: {} km/h",
        city,
        country,
        current.temperature_2m,
        current.relative_humidity_2m.unwrap_or(0.0),
        current.wind_speed_10m.unwrap_or(0.0)
    )
}

/// Render the two-city comparison string.
fn format_comparison(city1: &str, temp1: f64, city2: &str, temp2: f64) -> String {
    let diff = (temp1 - temp2).abs();
    let warmer = if temp1 > temp2 { city1 } else { city2 };
    format!(
        "Temperature comparison: {}: {}°C, {}: {}°C. {} is warmer by {}°C",
        city1, temp1, city2, temp2, warmer, diff
    )
}

/// Get current weather information for a city.
pub struct GetWeatherByCity;

#[async_trait]
impl Tool for GetWeatherByCity {
    fn name(&self) -> &str {
        "get_weather_by_city"
    }

    fn description(&self) -> &str {
        "Get current weather information for a given city using the Open-Meteo API."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "city_name",
            FieldType::String,
            "Name of the city to look up",
        )]
    }

    fn return_type(&self) -> FieldType {
        FieldType::String
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let city = args["city_name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'city_name' argument"))?;

        let client = http_client()?;
        let location = match geocode(&client, city).await? {
            Some(loc) => loc,
            None => return Ok(Value::String(format!("City '{}' not found", city))),
        };

        let current =
            current_conditions(&client, location.latitude, location.longitude, true).await?;
        let country = location.country.as_deref().unwrap_or("Unknown");
        Ok(Value::String(format_weather_report(
            &location.name,
            country,
            &current,
        )))
    }
}

/// Compare current temperatures between two cities.
pub struct CompareCityTemperatures;

#[async_trait]
impl Tool for CompareCityTemperatures {
    fn name(&self) -> &str {
        "compare_city_temperatures"
    }

    fn description(&self) -> &str {
        "Compare current temperatures between two cities."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("city1", FieldType::String, "First city"),
            ParamSpec::required("city2", FieldType::String, "Second city"),
        ]
    }

    fn return_type(&self) -> FieldType {
        FieldType::String
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let city1 = args["city1"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'city1' argument"))?;
        let city2 = args["city2"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'city2' argument"))?;

        let client = http_client()?;
        let mut temps = Vec::with_capacity(2);
        for city in [city1, city2] {
            let location = match geocode(&client, city).await? {
                Some(loc) => loc,
                None => return Ok(Value::String(format!("City '{}' not found", city))),
            };
            let current =
                current_conditions(&client, location.latitude, location.longitude, false).await?;
            temps.push(current.temperature_2m);
        }

        Ok(Value::String(format_comparison(
            city1, temps[0], city2, temps[1],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_weather_report() {
        let current = CurrentConditions {
            temperature_2m: 21.5,
            relative_humidity_2m: Some(40.0),
            wind_speed_10m: Some(12.0),
        };
        let report = format_weather_report("Berlin", "Germany", &current);
        assert_eq!(
            report,
            "Weather in Berlin, Germany: Temperature: 21.5°C, Humidity: 40%, Wind Speed: 12 km/h"
        );
    }

    #[test]
    fn test_format_comparison_picks_warmer_city() {
        let report = format_comparison("Cairo", 35.0, "Oslo", 12.0);
        assert!(report.contains("Cairo is warmer by 23°C"));

        let report = format_comparison("Oslo", 12.0, "Cairo", 35.0);
        assert!(report.contains("Cairo is warmer by 23°C"));
    }

    #[test]
    fn test_geocoding_response_tolerates_missing_results() {
        let parsed: GeocodingResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn test_forecast_response_parses() {
        let body = r#"{"current": {"temperature_2m": 18.3, "relative_humidity_2m": 55, "wind_speed_10m": 9.4}}"#;
        let parsed: ForecastResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.current.temperature_2m, 18.3);
        assert_eq!(parsed.current.relative_humidity_2m, Some(55.0));
    }
}
