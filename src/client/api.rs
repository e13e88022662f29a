use std::time::Duration;

use reqwest::{
    multipart::{Form, Part},
    RequestBuilder, StatusCode,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest};
use crate::error::ErrorBody;
use crate::plants::dto::{Plant, WaterRequest, WaterResponse};
use crate::weather::dto::WeatherSnapshot;

use super::view::Coordinates;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error body.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Could not reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Fields of the add-plant form. `especie` may be left empty.
#[derive(Debug, Clone, Default)]
pub struct PlantDraft {
    pub nome: String,
    pub especie: String,
    pub image: Option<ImageFile>,
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Typed wrapper over the REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3001`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(req.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }
        let message = match res.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        warn!(%status, %message, "api request failed");
        Err(ClientError::Api { status, message })
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        nome: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = RegisterRequest {
            email: email.into(),
            password: password.into(),
            nome: nome.into(),
        };
        self.send(self.http.post(self.url("/auth/register")).json(&body))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        self.send(self.http.post(self.url("/auth/login")).json(&body))
            .await
    }

    /// The caller's default plant.
    pub async fn plant(&self) -> Result<Plant, ClientError> {
        let req = self.authed(self.http.get(self.url("/planta")))?;
        self.send(req).await
    }

    pub async fn weather(&self, at: Coordinates) -> Result<WeatherSnapshot, ClientError> {
        let req = self.authed(
            self.http
                .get(self.url("/clima"))
                .query(&[("lat", at.latitude), ("lon", at.longitude)]),
        )?;
        self.send(req).await
    }

    /// All of the caller's plants, oldest first.
    pub async fn list_plants(&self) -> Result<Vec<Plant>, ClientError> {
        let req = self.authed(self.http.get(self.url("/plantas")))?;
        self.send(req).await
    }

    /// Posts the add-plant form as multipart, stamped with `user_id`.
    pub async fn create_plant(
        &self,
        user_id: Uuid,
        draft: PlantDraft,
    ) -> Result<Plant, ClientError> {
        let mut form = Form::new()
            .text("nome", draft.nome)
            .text("especie", draft.especie)
            .text("userId", user_id.to_string());
        if let Some(img) = draft.image {
            let part = Part::bytes(img.bytes)
                .file_name(img.file_name)
                .mime_str(&img.content_type)?;
            form = form.part("imagem", part);
        }

        let req = self.authed(self.http.post(self.url("/plantas")).multipart(form))?;
        let plant: Plant = self.send(req).await?;
        debug!(plant_id = %plant.id, "plant created");
        Ok(plant)
    }

    pub async fn water(&self, plant_id: Uuid) -> Result<WaterResponse, ClientError> {
        let body = WaterRequest {
            id: Some(plant_id),
            nome: None,
        };
        let req = self.authed(self.http.post(self.url("/regar")).json(&body))?;
        let res: WaterResponse = self.send(req).await?;
        debug!(%plant_id, "plant watered");
        Ok(res)
    }
}
