//! Weather tools: city lookup, AQI filter, temperature filter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{arg_bool, arg_f64, arg_str, opt_f64, Tool};
use crate::data::WeatherStore;

/// Full weather record for one city.
pub struct FetchWeatherByCity {
    store: Arc<WeatherStore>,
}

impl FetchWeatherByCity {
    pub fn new(store: Arc<WeatherStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FetchWeatherByCity {
    fn name(&self) -> &str {
        "fetchWeatherByCity"
    }

    fn description(&self) -> &str {
        "Get complete weather data (current conditions, air quality, today/tomorrow forecast) for a specific city"
    }

    fn required_parameters(&self) -> &[&str] {
        &["city"]
    }

    fn parameters_hint(&self) -> &str {
        "city: string"
    }

    async fn execute(&self, args: &Map<String, Value>) -> anyhow::Result<Value> {
        let city = arg_str(args, "city")?;
        let record = self.store.by_city(city).ok_or_else(|| {
            anyhow::anyhow!(
                "No weather data for city '{}'. Available cities: {}",
                city,
                self.store.city_names().join(", ")
            )
        })?;
        Ok(serde_json::to_value(record)?)
    }
}

/// Cities filtered by air-quality index.
pub struct GetCitiesByAqi {
    store: Arc<WeatherStore>,
}

impl GetCitiesByAqi {
    pub fn new(store: Arc<WeatherStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetCitiesByAqi {
    fn name(&self) -> &str {
        "getCitiesByAQI"
    }

    fn description(&self) -> &str {
        "Get cities whose Air Quality Index is above (isHigher=true) or below (isHigher=false) a threshold; 100 separates good from poor air"
    }

    fn required_parameters(&self) -> &[&str] {
        &["threshold", "isHigher"]
    }

    fn parameters_hint(&self) -> &str {
        "threshold: number, isHigher: boolean"
    }

    async fn execute(&self, args: &Map<String, Value>) -> anyhow::Result<Value> {
        let threshold = arg_f64(args, "threshold")?;
        let is_higher = arg_bool(args, "isHigher")?;
        Ok(serde_json::to_value(self.store.by_aqi(threshold, is_higher))?)
    }
}

/// Cities filtered by current temperature.
pub struct GetCitiesByTemperatureRange {
    store: Arc<WeatherStore>,
}

impl GetCitiesByTemperatureRange {
    pub fn new(store: Arc<WeatherStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetCitiesByTemperatureRange {
    fn name(&self) -> &str {
        "getCitiesByTemperatureRange"
    }

    fn description(&self) -> &str {
        "Get cities whose current temperature in °C lies within an inclusive range; give minTemp, maxTemp, or both"
    }

    fn parameters_hint(&self) -> &str {
        "minTemp?: number, maxTemp?: number"
    }

    async fn execute(&self, args: &Map<String, Value>) -> anyhow::Result<Value> {
        let min = opt_f64(args, "minTemp")?;
        let max = opt_f64(args, "maxTemp")?;
        match (min, max) {
            (None, None) => anyhow::bail!("At least one of 'minTemp' or 'maxTemp' is required"),
            (Some(lo), Some(hi)) if lo > hi => {
                anyhow::bail!("'minTemp' ({}) is greater than 'maxTemp' ({})", lo, hi)
            }
            _ => {}
        }
        Ok(serde_json::to_value(self.store.by_temperature_range(min, max))?)
    }
}
