use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{auth::AuthUser, error::AppError, state::AppState};

use super::dto::{ClimaQuery, WeatherSnapshot};
use super::services::fetch_weather;

pub fn routes() -> Router<AppState> {
    Router::new().route("/clima", get(get_weather))
}

/// GET /clima?lat=..&lon=..
#[instrument(skip(state, query))]
pub async fn get_weather(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<ClimaQuery>, QueryRejection>,
) -> Result<Json<WeatherSnapshot>, AppError> {
    let Query(q) = query.map_err(|_| AppError::validation("lat and lon are required numbers"))?;
    let snapshot = fetch_weather(state.weather.as_ref(), q.lat, q.lon).await?;
    Ok(Json(snapshot))
}
