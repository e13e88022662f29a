use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::plants::dto::{Plant, WateringEntry, WateringStatus};

#[derive(Debug, FromRow)]
pub struct PlantRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub species: String,
    pub status: String,
    pub last_watered_at: Option<OffsetDateTime>,
    pub temperature: Option<i32>,
    pub image_url: Option<String>,
    pub is_default: bool,
}

impl PlantRow {
    pub fn into_plant(self, history: Vec<WateringEntry>) -> anyhow::Result<Plant> {
        let status = WateringStatus::parse(&self.status)
            .ok_or_else(|| anyhow::anyhow!("unknown watering status {:?}", self.status))?;
        Ok(Plant {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            species: self.species,
            status,
            last_watered_at: self.last_watered_at,
            temperature: self.temperature,
            image_url: self.image_url,
            is_default: self.is_default,
            history,
        })
    }
}

/// Values for a plant that is about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPlant {
    pub owner_id: Uuid,
    pub name: String,
    pub species: String,
    pub status: WateringStatus,
    pub last_watered_at: Option<OffsetDateTime>,
    pub temperature: Option<i32>,
    pub image_url: Option<String>,
    pub is_default: bool,
}
