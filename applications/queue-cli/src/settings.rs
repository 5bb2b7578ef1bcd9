/// CLI configuration
use serde::{Deserialize, Serialize};
use soul_catalog::CatalogConfig;
use soul_queue::QueueConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Settings {
    /// Load configuration from file and environment
    ///
    /// `path` defaults to `config.toml` in the working directory; a missing
    /// default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. SOUL_QUEUE__WINDOW_SIZE
        settings = settings.add_source(
            config::Environment::with_prefix("SOUL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| SettingsError::Config(e.to_string()))?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| SettingsError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = &self.catalog.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SettingsError::Config(format!(
                "Catalog URL must start with http:// or https:// (got {:?})",
                url
            )));
        }

        if self.queue.window_chunk_size == 0 || self.queue.background_chunk_size == 0 {
            return Err(SettingsError::Config(
                "Chunk sizes must be at least 1".to_string(),
            ));
        }

        if self.queue.concurrency == 0 {
            return Err(SettingsError::Config(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
