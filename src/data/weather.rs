//! Static weather dataset and the queries over it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const WEATHER_JSON: &str = include_str!("weather.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityWeather {
    pub city: String,
    pub temperature: String,
    pub weather: String,
    pub forecast: Forecast,
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub today: TodayForecast,
    pub tomorrow: TomorrowForecast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodayForecast {
    pub condition: String,
    pub temperature: TemperatureSpan,
    pub precipitation: Precipitation,
    pub wind: Wind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomorrowForecast {
    pub condition: String,
    pub temperature: TemperatureSpan,
    pub precipitation: Precipitation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSpan {
    pub max: String,
    pub min: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Precipitation {
    pub chance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: String,
    pub direction: String,
    pub gusts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub humidity: String,
    pub pressure: String,
    pub visibility: String,
    pub uv_index: String,
    pub air_quality: AirQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQuality {
    pub index: String,
    pub description: String,
}

impl CityWeather {
    /// Current air-quality index, if the dataset value is numeric.
    pub fn aqi(&self) -> Option<i64> {
        self.current.air_quality.index.trim().parse().ok()
    }

    /// Current temperature in °C, parsed from strings like `"34°C"`.
    pub fn temperature_celsius(&self) -> Option<f64> {
        leading_number(&self.temperature)
    }
}

/// Condensed city entry returned by the filter queries.
#[derive(Debug, Clone, Serialize)]
pub struct CitySummary {
    pub city: String,
    pub aqi: String,
    pub description: String,
    pub temperature: String,
    pub weather: String,
}

impl From<&CityWeather> for CitySummary {
    fn from(c: &CityWeather) -> Self {
        Self {
            city: c.city.clone(),
            aqi: c.current.air_quality.index.clone(),
            description: c.current.air_quality.description.clone(),
            temperature: c.temperature.clone(),
            weather: c.weather.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AqiReport {
    pub count: usize,
    pub threshold: f64,
    pub condition: &'static str,
    pub cities: Vec<CitySummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReport {
    pub count: usize,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub cities: Vec<CitySummary>,
}

#[derive(Debug, Deserialize)]
struct WeatherDataset {
    cities: BTreeMap<String, CityWeather>,
}

/// Read-only weather data keyed by lower-case city name.
#[derive(Debug, Clone)]
pub struct WeatherStore {
    cities: BTreeMap<String, CityWeather>,
}

impl WeatherStore {
    /// Load the bundled dataset.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json(WEATHER_JSON)
    }

    /// Load a dataset from JSON (`{"cities": {"<key>": {...}}}`).
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let dataset: WeatherDataset = serde_json::from_str(raw)?;
        Ok(Self {
            cities: dataset.cities,
        })
    }

    /// City keys in sorted order.
    pub fn city_names(&self) -> Vec<String> {
        self.cities.keys().cloned().collect()
    }

    /// Look up a city by name or alias, case-insensitively.
    pub fn by_city(&self, city: &str) -> Option<&CityWeather> {
        self.cities.get(&normalize_city_name(city))
    }

    /// Cities whose AQI is strictly above (`is_higher`) or below `threshold`.
    pub fn by_aqi(&self, threshold: f64, is_higher: bool) -> AqiReport {
        let cities: Vec<CitySummary> = self
            .cities
            .values()
            .filter(|c| match c.aqi() {
                Some(aqi) if is_higher => (aqi as f64) > threshold,
                Some(aqi) => (aqi as f64) < threshold,
                None => false,
            })
            .map(CitySummary::from)
            .collect();

        AqiReport {
            count: cities.len(),
            threshold,
            condition: if is_higher { "higher" } else { "lower" },
            cities,
        }
    }

    /// Cities whose current temperature lies within the inclusive bounds.
    pub fn by_temperature_range(&self, min: Option<f64>, max: Option<f64>) -> TemperatureReport {
        let cities: Vec<CitySummary> = self
            .cities
            .values()
            .filter(|c| match c.temperature_celsius() {
                Some(t) => min.map_or(true, |m| t >= m) && max.map_or(true, |m| t <= m),
                None => false,
            })
            .map(CitySummary::from)
            .collect();

        TemperatureReport {
            count: cities.len(),
            min_temp: min,
            max_temp: max,
            cities,
        }
    }
}

/// Map common alternative spellings onto dataset keys.
pub fn normalize_city_name(city: &str) -> String {
    let normalized = city.trim().to_lowercase();
    match normalized.as_str() {
        "calcutta" => "kolkata".to_string(),
        "bombay" => "mumbai".to_string(),
        "bengaluru" => "bangalore".to_string(),
        "new delhi" => "delhi".to_string(),
        _ => normalized,
    }
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}
