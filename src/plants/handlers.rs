use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        multipart::MultipartRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{handlers::bad_json, AuthUser},
    error::AppError,
    state::AppState,
};

use super::dto::{Plant, WaterRequest, WaterResponse};
use super::services::{self, PlantForm, UploadItem, WateringTarget};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/planta", get(get_plant))
        .route("/plantas", get(list_plants))
        .route("/plantas/:id", get(get_plant_by_id))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/regar", post(water_plant))
        .route("/plantas", post(create_plant_multipart)) // multipart nome, especie, userId, imagem
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

// --- handlers ---

/// GET /planta: the caller's default plant, seeded on first read.
#[instrument(skip(state))]
pub async fn get_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Plant>, AppError> {
    let plant = services::get_or_create_default_plant(state.plants.as_ref(), user_id).await?;
    Ok(Json(plant))
}

#[instrument(skip(state))]
pub async fn list_plants(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Plant>>, AppError> {
    let plants = state
        .plants
        .list_by_owner(user_id)
        .await
        .map_err(AppError::Storage)?;
    Ok(Json(plants))
}

/// GET /plantas/:id, scoped to the caller.
#[instrument(skip(state, id))]
pub async fn get_plant_by_id(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Plant>, AppError> {
    let Path(id) = id.map_err(|_| AppError::validation("Invalid plant id"))?;
    let plant = state
        .plants
        .find_by_id(user_id, id)
        .await
        .map_err(AppError::Storage)?
        .ok_or(AppError::NotFound("Plant"))?;
    Ok(Json(plant))
}

/// POST /regar { id } or { nome }
#[instrument(skip(state))]
pub async fn water_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<WaterRequest>, JsonRejection>,
) -> Result<Json<WaterResponse>, AppError> {
    let Json(body) = body.map_err(bad_json)?;
    let target = WateringTarget::try_from(body)?;
    let plant = services::record_watering(
        state.plants.as_ref(),
        user_id,
        target,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(WaterResponse {
        message: "Watering recorded".into(),
        dados: plant,
    }))
}

/// POST /plantas (multipart)
#[instrument(skip(state, mp))]
pub async fn create_plant_multipart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Plant>), AppError> {
    let mut mp = mp.map_err(|e| AppError::validation(e.body_text()))?;
    let mut form = PlantForm {
        name: String::new(),
        species: String::new(),
        user_id: None,
        image: None,
    };

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("nome") => form.name = field.text().await.map_err(bad_multipart)?,
            Some("especie") => form.species = field.text().await.map_err(bad_multipart)?,
            Some("userId") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                if !raw.trim().is_empty() {
                    let id = Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::validation("Invalid userId"))?;
                    form.user_id = Some(id);
                }
            }
            Some("imagem") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_multipart)?;
                if !body.is_empty() {
                    form.image = Some(UploadItem { body, content_type });
                }
            }
            _ => {}
        }
    }

    let plant = services::create_plant(
        state.plants.as_ref(),
        state.storage.as_deref(),
        user_id,
        form,
    )
    .await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/plantas/{}", plant.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(plant)))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("Invalid form data: {}", e))
}
