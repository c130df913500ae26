use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::storage::PoolSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestodirConfig {
    pub database: Option<String>,
    pub pool_size: Option<u32>,
    pub connection_timeout_secs: Option<u64>,
}

impl RestodirConfig {
    /// Database file, falling back to `.restodir/restodir.db` under `base`
    pub fn database_path(&self, base: &Path) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(base))
    }

    pub fn pool_settings(&self) -> PoolSettings {
        let defaults = PoolSettings::default();
        PoolSettings {
            max_size: self.pool_size.filter(|n| *n > 0).unwrap_or(defaults.max_size),
            connection_timeout: self
                .connection_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection_timeout),
            ..defaults
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("restodir.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".restodir").join("restodir.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RestodirConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RestodirConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RestodirConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
