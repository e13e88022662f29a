use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Merged weather + place data for one pair of coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperatura: i64,
    pub bairro: String,
    pub cidade: Option<String>,
    pub icone: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClimaQuery {
    pub lat: f64,
    pub lon: f64,
}

// --- OpenWeather payloads (only the fields we read) ---

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub main: MainReadings,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoPlace {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub local_names: Option<HashMap<String, String>>,
}
