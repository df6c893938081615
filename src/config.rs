use std::{env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    services::{geo::ServiceArea, pricing::PricingConfig, promo::PromoCatalog},
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub ride_config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://vandi.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let ride_config_path = env::var("RIDE_CONFIG_PATH").ok().map(PathBuf::from);

        Ok(Self {
            database_url,
            listen_addr,
            ride_config_path,
        })
    }

    /// Loads the ride rules from `RIDE_CONFIG_PATH`, falling back to the
    /// built-in defaults when no file is configured.
    pub async fn load_ride_config(&self) -> Result<RideConfig, AppError> {
        let Some(path) = &self.ride_config_path else {
            return Ok(RideConfig::default());
        };
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw).map_err(|err| {
            AppError::Config(format!("invalid ride config {}: {err}", path.display()))
        })
    }
}

/// Business rules handed to the services at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RideConfig {
    pub pricing: PricingConfig,
    pub service_area: ServiceArea,
    pub promos: PromoCatalog,
}
