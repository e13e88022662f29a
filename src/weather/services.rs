use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use tracing::debug;

use crate::config::WeatherConfig;
use crate::error::AppError;
use crate::weather::dto::{CurrentWeather, GeoPlace, WeatherSnapshot};

/// The two upstream lookups the gateway composes.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(&self, lat: f64, lon: f64) -> anyhow::Result<CurrentWeather>;
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> anyhow::Result<Vec<GeoPlace>>;
    /// Key into `local_names` for the localized city name.
    fn locale(&self) -> &str;
}

/// OpenWeather current-weather + reverse-geocoding client.
#[derive(Clone)]
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    lang: String,
    locale: String,
}

impl OpenWeatherClient {
    pub fn new(cfg: &WeatherConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build weather http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            lang: cfg.lang.clone(),
            locale: locale_from_lang(&cfg.lang),
        })
    }
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    async fn current(&self, lat: f64, lon: f64) -> anyhow::Result<CurrentWeather> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", self.lang.clone()),
            ])
            .send()
            .await
            .context("current weather request")?
            .error_for_status()
            .context("current weather status")?;
        res.json::<CurrentWeather>()
            .await
            .context("current weather body")
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> anyhow::Result<Vec<GeoPlace>> {
        let url = format!("{}/geo/1.0/reverse", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("limit", "1".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .context("reverse geocode request")?
            .error_for_status()
            .context("reverse geocode status")?;
        res.json::<Vec<GeoPlace>>()
            .await
            .context("reverse geocode body")
    }

    fn locale(&self) -> &str {
        &self.locale
    }
}

/// `pt_br` -> `pt`
pub fn locale_from_lang(lang: &str) -> String {
    lang.split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Nearest integer, halves rounded up.
pub fn round_temperature(t: f64) -> i64 {
    (t + 0.5).floor() as i64
}

pub fn merge(
    current: CurrentWeather,
    places: Vec<GeoPlace>,
    locale: &str,
) -> anyhow::Result<WeatherSnapshot> {
    let icone = current
        .weather
        .into_iter()
        .next()
        .map(|c| c.icon)
        .context("weather response has no conditions")?;

    let cidade = places.into_iter().next().and_then(|p| {
        p.local_names
            .and_then(|mut names| names.remove(locale))
            .filter(|n| !n.is_empty())
            .or(p.name.filter(|n| !n.is_empty()))
    });

    Ok(WeatherSnapshot {
        temperatura: round_temperature(current.main.temp),
        bairro: current.name,
        cidade,
        icone,
    })
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::validation("lat must be between -90 and 90"));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::validation("lon must be between -180 and 180"));
    }
    Ok(())
}

/// Runs both lookups concurrently. Either failing fails the whole fetch.
pub async fn fetch_weather(
    api: &dyn WeatherApi,
    lat: f64,
    lon: f64,
) -> Result<WeatherSnapshot, AppError> {
    validate_coordinates(lat, lon)?;

    let (current, places) = tokio::try_join!(api.current(lat, lon), api.reverse_geocode(lat, lon))
        .map_err(AppError::Upstream)?;

    let snapshot = merge(current, places, api.locale()).map_err(AppError::Upstream)?;
    debug!(lat, lon, temperatura = snapshot.temperatura, "weather fetched");
    Ok(snapshot)
}
