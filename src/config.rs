// Settings loaded with the 'config' crate, layered over .env and APP_* variables

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    pub proxy_url: Option<String>,

    // Document store (Firestore REST)
    pub firebase_project_id: Option<String>,
    pub firestore_base_url: String,

    // Hosted search index (Algolia). The index is only used when all three are set.
    pub algolia_app_id: Option<String>,
    pub algolia_api_key: Option<String>,
    pub algolia_index: Option<String>,

    pub request_timeout_ms: u64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("firestore_base_url", "https://firestore.googleapis.com/v1")?
            .set_default("request_timeout_ms", 10_000)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_FIREBASE_PROJECT_ID).
            // No separator: the keys themselves contain underscores.
            .add_source(Environment::with_prefix("APP").prefix_separator("_").try_parsing(true));

        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize settings")?;
        Ok(settings)
    }

    /// Index credentials, if every piece is present and non-empty.
    pub fn algolia_credentials(&self) -> Option<(&str, &str, &str)> {
        let app_id = non_empty(self.algolia_app_id.as_deref())?;
        let api_key = non_empty(self.algolia_api_key.as_deref())?;
        let index = non_empty(self.algolia_index.as_deref())?;
        Some((app_id, api_key, index))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
