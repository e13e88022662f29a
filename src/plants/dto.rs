use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Whether the plant has been watered since it was last marked pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WateringStatus {
    #[serde(alias = "pendente")]
    Pending,
    #[serde(alias = "sucesso")]
    Success,
}

impl WateringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WateringStatus::Pending => "pending",
            WateringStatus::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" | "pendente" => Some(WateringStatus::Pending),
            "success" | "sucesso" => Some(WateringStatus::Success),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringEntry {
    #[serde(rename = "dataRega", with = "time::serde::rfc3339")]
    pub watered_at: OffsetDateTime,
}

/// Plant document as stored and as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub owner_id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "especie")]
    pub species: String,
    #[serde(rename = "statusRega")]
    pub status: WateringStatus,
    #[serde(rename = "ultimaRega", with = "time::serde::rfc3339::option", default)]
    pub last_watered_at: Option<OffsetDateTime>,
    #[serde(rename = "temperatura", default)]
    pub temperature: Option<i32>,
    #[serde(rename = "imagem", default)]
    pub image_url: Option<String>,
    #[serde(rename = "padrao", default)]
    pub is_default: bool,
    #[serde(rename = "historico", default)]
    pub history: Vec<WateringEntry>,
}

/// Body of `POST /regar`. `id` wins over `nome` when both are present.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WaterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaterResponse {
    pub message: String,
    pub dados: Plant,
}
