use serde::Deserialize;

use crate::notification::{DeliveryMode, DEFAULT_TARGET_NUMBER};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Directory holding `leads.json` when no database is configured.
    pub data_dir: String,
    /// Selects the Postgres lead store when set.
    pub database_url: Option<String>,
    pub whatsapp_api_url: Option<String>,
    pub whatsapp_api_key: Option<String>,
    pub whatsapp_target_number: String,
    /// Bearer token for the administrative lead routes.
    pub admin_token: Option<String>,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            data_dir: optional_var("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            database_url: optional_var("DATABASE_URL")
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            whatsapp_api_url: optional_var("WHATSAPP_API_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("WHATSAPP_API_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            whatsapp_api_key: optional_var("WHATSAPP_API_KEY"),
            whatsapp_target_number: optional_var("WHATSAPP_TARGET_NUMBER")
                .map(|number| {
                    if !number.chars().all(|c| c.is_ascii_digit()) {
                        anyhow::bail!("WHATSAPP_TARGET_NUMBER must contain digits only");
                    }
                    Ok(number)
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_TARGET_NUMBER.to_string()),
            admin_token: optional_var("ADMIN_TOKEN"),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        match &config.database_url {
            Some(url) => tracing::debug!(
                "Database URL: {}...",
                url.chars().take(20).collect::<String>()
            ),
            None => tracing::debug!("Lead data directory: {}", config.data_dir),
        }
        if config.delivery_mode().is_offline() {
            tracing::warn!("WhatsApp API not configured; notifications run in offline mode");
        }
        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set; administrative lead routes are disabled");
        }

        Ok(config)
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_credentials(self.whatsapp_api_url.clone(), self.whatsapp_api_key.clone())
    }
}
