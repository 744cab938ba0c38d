use std::path::{Path, PathBuf};
use tracing::{info, warn};

use seedsmith_core::SeedError;

use crate::schema::SeedsmithConfig;

/// Loads the Seedsmith configuration.
pub struct ConfigLoader {
    config: SeedsmithConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SEEDSMITH_CONFIG env > ~/.seedsmith/seedsmith.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SEEDSMITH_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".seedsmith")
            .join("seedsmith.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> seedsmith_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                SeedError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SeedsmithConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(SeedError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse TOML text into a config without touching the environment.
    pub fn parse(raw: &str) -> Result<SeedsmithConfig, toml::de::Error> {
        toml::from_str::<SeedsmithConfig>(raw)
    }

    /// A copy of the loaded config.
    pub fn get(&self) -> SeedsmithConfig {
        self.config.clone()
    }

    /// Path the config was resolved from (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (SEEDSMITH_MODEL, SEEDSMITH_LOG_LEVEL, OPENAI_BASE_URL).
    pub fn apply_env_overrides(mut config: SeedsmithConfig) -> SeedsmithConfig {
        if let Ok(v) = std::env::var("SEEDSMITH_MODEL") {
            config.llm.model = v;
        }
        if let Ok(v) = std::env::var("SEEDSMITH_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
            config.llm.base_url = v;
        }
        // Config file wins, env is the fallback.
        if config.services.openai_api_key.is_none() {
            if let Ok(v) = std::env::var("OPENAI_API_KEY") {
                config.services.openai_api_key = Some(v);
            }
        }
        config
    }
}
