use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::plants::dto::{Plant, WaterRequest, WateringStatus};
use crate::plants::repo::PlantStore;
use crate::plants::repo_types::NewPlant;
use crate::storage::{ext_from_mime, StorageClient};

pub const DEFAULT_PLANT_NAME: &str = "Kalanchoe";
pub const DEFAULT_PLANT_SPECIES: &str = "Flor-da-fortuna";
pub const DEFAULT_PLANT_TEMPERATURE: i32 = 32;
pub const DEFAULT_PLANT_IMAGE: &str =
    "https://images.unsplash.com/photo-1509423350716-97f9360b4e09?w=500";

/// The record every owner starts with.
pub fn default_seed(owner_id: Uuid, now: OffsetDateTime) -> NewPlant {
    NewPlant {
        owner_id,
        name: DEFAULT_PLANT_NAME.into(),
        species: DEFAULT_PLANT_SPECIES.into(),
        status: WateringStatus::Pending,
        last_watered_at: Some(now),
        temperature: Some(DEFAULT_PLANT_TEMPERATURE),
        image_url: Some(DEFAULT_PLANT_IMAGE.into()),
        is_default: true,
    }
}

/// Looks up the owner's default plant and seeds it when absent.
pub async fn get_or_create_default_plant(
    store: &dyn PlantStore,
    owner_id: Uuid,
) -> Result<Plant, AppError> {
    if let Some(p) = store.find_default(owner_id).await.map_err(AppError::Storage)? {
        return Ok(p);
    }

    let plant = store
        .insert_default(default_seed(owner_id, OffsetDateTime::now_utc()))
        .await
        .map_err(AppError::Storage)?;
    info!(%owner_id, plant_id = %plant.id, "default plant seeded");
    Ok(plant)
}

/// Which plant a watering request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WateringTarget {
    Id(Uuid),
    Name(String),
}

impl TryFrom<WaterRequest> for WateringTarget {
    type Error = AppError;

    fn try_from(req: WaterRequest) -> Result<Self, Self::Error> {
        if let Some(id) = req.id {
            return Ok(WateringTarget::Id(id));
        }
        match req.nome.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => Ok(WateringTarget::Name(n)),
            _ => Err(AppError::validation("Missing plant id or nome")),
        }
    }
}

/// Marks the plant watered at `now`. Repeating it re-stamps the time.
pub async fn record_watering(
    store: &dyn PlantStore,
    owner_id: Uuid,
    target: WateringTarget,
    now: OffsetDateTime,
) -> Result<Plant, AppError> {
    let plant_id = match target {
        WateringTarget::Id(id) => id,
        WateringTarget::Name(name) => {
            store
                .find_by_name(owner_id, &name)
                .await
                .map_err(AppError::Storage)?
                .ok_or(AppError::NotFound("Plant"))?
                .id
        }
    };

    let plant = store
        .record_watering(owner_id, plant_id, now)
        .await
        .map_err(AppError::Storage)?
        .ok_or(AppError::NotFound("Plant"))?;

    info!(%owner_id, %plant_id, "watering recorded");
    Ok(plant)
}

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Fields of the "add plant" form.
pub struct PlantForm {
    pub name: String,
    pub species: String,
    pub user_id: Option<Uuid>,
    pub image: Option<UploadItem>,
}

pub async fn create_plant(
    store: &dyn PlantStore,
    storage: Option<&dyn StorageClient>,
    owner_id: Uuid,
    form: PlantForm,
) -> Result<Plant, AppError> {
    let name = form.name.trim();
    let species = form.species.trim();
    if name.is_empty() {
        return Err(AppError::validation("Missing fields"));
    }
    if form.user_id.is_some_and(|id| id != owner_id) {
        warn!(%owner_id, "userId does not match the session");
        return Err(AppError::Forbidden);
    }

    let mut uploaded: Option<(&dyn StorageClient, String)> = None;
    if let Some(img) = form.image {
        let storage = storage.ok_or_else(|| AppError::validation("Image upload is not available"))?;
        let ext = ext_from_mime(&img.content_type)
            .ok_or_else(|| AppError::validation("imagem must be an image"))?;
        let key = format!("plants/{}/{}.{}", owner_id, Uuid::new_v4(), ext);
        storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .map_err(AppError::Storage)?;
        uploaded = Some((storage, key));
    }

    let new = NewPlant {
        owner_id,
        name: name.to_string(),
        species: species.to_string(),
        status: WateringStatus::Pending,
        last_watered_at: None,
        temperature: None,
        image_url: uploaded.as_ref().map(|(s, key)| s.object_url(key)),
        is_default: false,
    };

    match store.insert(new).await {
        Ok(plant) => {
            info!(%owner_id, plant_id = %plant.id, "plant created");
            Ok(plant)
        }
        Err(e) => {
            if let Some((s, key)) = uploaded {
                if let Err(del) = s.delete_object(&key).await {
                    warn!(error = %del, %key, "orphaned plant image");
                }
            }
            Err(AppError::Storage(e))
        }
    }
}
