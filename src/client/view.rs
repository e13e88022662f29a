use axum::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::plants::dto::{Plant, WateringStatus};
use crate::weather::dto::WeatherSnapshot;

use super::api::{ApiClient, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("location unavailable: {0}")]
pub struct LocationDenied(pub String);

/// Source of the device position.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, LocationDenied>;
}

/// Always answers with the same position, or always refuses.
pub struct FixedLocation(pub Option<Coordinates>);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn locate(&self) -> Result<Coordinates, LocationDenied> {
        self.0
            .ok_or_else(|| LocationDenied("permission denied".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureTier {
    Hot,
    Warm,
    Mild,
    Cool,
    Unknown,
}

impl TemperatureTier {
    /// Short caption shown next to the reading.
    pub fn label(self) -> &'static str {
        match self {
            TemperatureTier::Hot => "Muito quente",
            TemperatureTier::Warm => "Quente",
            TemperatureTier::Mild => "Agradável",
            TemperatureTier::Cool => "Fresco",
            TemperatureTier::Unknown => "Sem dados",
        }
    }
}

/// Thresholds are strict: exactly 30 is still `Warm`.
pub fn temperature_tier(temperature: Option<i64>) -> TemperatureTier {
    match temperature {
        None => TemperatureTier::Unknown,
        Some(t) if t > 30 => TemperatureTier::Hot,
        Some(t) if t > 25 => TemperatureTier::Warm,
        Some(t) if t > 20 => TemperatureTier::Mild,
        Some(_) => TemperatureTier::Cool,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WateringUrgency {
    WateredToday,
    Urgent,
    NeedsWatering,
}

pub fn watering_urgency(status: WateringStatus, tier: TemperatureTier) -> WateringUrgency {
    match (status, tier) {
        (WateringStatus::Success, _) => WateringUrgency::WateredToday,
        (WateringStatus::Pending, TemperatureTier::Hot) => WateringUrgency::Urgent,
        (WateringStatus::Pending, _) => WateringUrgency::NeedsWatering,
    }
}

pub fn icon_url(icon: &str) -> String {
    format!("https://openweathermap.org/img/wn/{icon}@2x.png")
}

/// Everything the home view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub plant: Plant,
    pub weather: Option<WeatherSnapshot>,
}

impl ViewModel {
    /// Live reading only; without weather the tier is `Unknown`.
    pub fn temperature(&self) -> Option<i64> {
        self.weather.as_ref().map(|w| w.temperatura)
    }

    pub fn tier(&self) -> TemperatureTier {
        temperature_tier(self.temperature())
    }

    pub fn urgency(&self) -> WateringUrgency {
        watering_urgency(self.plant.status, self.tier())
    }

    pub fn can_water(&self) -> bool {
        self.plant.status == WateringStatus::Pending
    }

    pub fn last_watered(&self) -> Option<OffsetDateTime> {
        self.plant.last_watered_at
    }

    pub fn icon_url(&self) -> Option<String> {
        self.weather.as_ref().map(|w| icon_url(&w.icone))
    }
}

/// Loads the plant, and the weather too when a position is available.
/// With a position both requests run together and either failing fails the load.
pub async fn load_home(
    api: &ApiClient,
    locator: &dyn Geolocator,
) -> Result<ViewModel, ClientError> {
    match locator.locate().await {
        Ok(at) => {
            let (plant, weather) = tokio::try_join!(api.plant(), api.weather(at))?;
            info!(plant_id = %plant.id, "home loaded");
            Ok(ViewModel {
                plant,
                weather: Some(weather),
            })
        }
        Err(denied) => {
            debug!(reason = %denied, "no location; loading plant only");
            let plant = api.plant().await?;
            Ok(ViewModel {
                plant,
                weather: None,
            })
        }
    }
}

/// Waters the shown plant and swaps in the server's copy, keeping the weather.
pub async fn water(api: &ApiClient, vm: &mut ViewModel) -> Result<String, ClientError> {
    let res = api.water(vm.plant.id).await?;
    vm.plant = res.dados;
    Ok(res.message)
}
