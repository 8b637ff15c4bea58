use super::{global_config_dir, SupervisorConfig, CONFIG_FILE_NAME};
use crate::error::{CrawlwatchError, ErrorCode, ErrorExt, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Finds, parses and validates the supervisor config.
///
/// Lookup order: an explicit path, `<base_dir>/crawlwatch.toml`, the platform
/// config directory, then built-in defaults. Environment overrides are applied
/// last.
pub struct ConfigLoader {
    base_dir: PathBuf,
    global_dir: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            global_dir: global_config_dir(),
        }
    }

    /// Replace the platform config directory; `None` disables that lookup
    pub fn with_global_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.global_dir = dir;
        self
    }

    pub async fn load(&self, explicit: Option<&Path>) -> Result<SupervisorConfig> {
        let mut config = match self.locate(explicit).await? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path).await?
            }
            None => {
                debug!("No configuration file found, using defaults");
                SupervisorConfig::default()
            }
        };
        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }

    pub async fn load_file(path: &Path) -> Result<SupervisorConfig> {
        let content = fs::read_to_string(path)
            .await
            .to_storage_error(path, "read config file")?;
        Self::parse(&content).map_err(|e| e.with_context(path.display()))
    }

    pub fn parse(content: &str) -> Result<SupervisorConfig> {
        toml::from_str(content).map_err(|e| {
            CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_PARSE_ERROR,
                format!("invalid TOML: {}", e.message()),
                None,
            )
            .with_source(e)
        })
    }

    async fn locate(&self, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !exists(path).await {
                return Err(CrawlwatchError::config_with_code(
                    ErrorCode::CONFIG_NOT_FOUND,
                    format!("config file {} does not exist", path.display()),
                    None,
                ));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let local = self.base_dir.join(CONFIG_FILE_NAME);
        if exists(&local).await {
            return Ok(Some(local));
        }

        if let Some(dir) = &self.global_dir {
            let global = dir.join(CONFIG_FILE_NAME);
            if exists(&global).await {
                return Ok(Some(global));
            }
        }
        Ok(None)
    }
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}
