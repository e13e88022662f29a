use serde::Deserialize;
use tracing::warn;

const DEV_JWT_SECRET: &str = "jardim-dev-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub lang: String,
    pub timeout_secs: u64,
}

/// S3-compatible bucket used for plant photos.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub weather: WeatherConfig,
    pub storage: Option<StorageConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("JWT_SECRET is not set; signing tokens with the insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "jardim".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "jardim-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        let weather = WeatherConfig {
            api_key: std::env::var("WEATHER_API_KEY")?,
            base_url: std::env::var("WEATHER_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".into()),
            lang: std::env::var("WEATHER_LANG").unwrap_or_else(|_| "pt_br".into()),
            timeout_secs: std::env::var("WEATHER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        };

        let storage = match (
            std::env::var("MINIO_ENDPOINT").ok(),
            std::env::var("MINIO_BUCKET").ok(),
        ) {
            (Some(endpoint), Some(bucket)) => Some(StorageConfig {
                public_url: std::env::var("MINIO_PUBLIC_URL").unwrap_or_else(|_| endpoint.clone()),
                access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_default(),
                secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_default(),
                endpoint,
                bucket,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            weather,
            storage,
        })
    }
}
