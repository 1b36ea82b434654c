use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::{resolve_model, DEFAULT_MODEL};
use crate::store::{Store, KEY_LLM_SETTINGS};

const DB_FILE: &str = "jobtrack.db";

/// Runtime configuration resolved from flags and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Level applied to this crate's targets when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// `--db` wins over `JOBTRACK_DB`, which wins over the platform data dir.
    pub fn resolve(cli_db: Option<PathBuf>) -> Result<Self> {
        Self::from_sources(
            cli_db,
            std::env::var("JOBTRACK_DB").ok(),
            std::env::var("JOBTRACK_LOG").ok(),
        )
    }

    fn from_sources(
        cli_db: Option<PathBuf>,
        env_db: Option<String>,
        env_log: Option<String>,
    ) -> Result<Self> {
        let db_path = match (cli_db, env_db.filter(|p| !p.trim().is_empty())) {
            (Some(path), _) => path,
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => default_db_path(),
        };
        let log_level = env_log
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "warn".to_string());
        if !["error", "warn", "info", "debug", "trace", "off"].contains(&log_level.as_str()) {
            return Err(anyhow!(
                "JOBTRACK_LOG must be one of error, warn, info, debug, trace, off (got '{}')",
                log_level
            ));
        }
        Ok(Self { db_path, log_level })
    }

    pub fn log_filter(&self) -> String {
        format!("{}={}", env!("CARGO_PKG_NAME"), self.log_level)
    }
}

fn default_db_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", "jobtrack") {
        Some(dirs) => dirs.data_dir().join(DB_FILE),
        None => PathBuf::from(DB_FILE),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl LlmSettings {
    pub fn load(store: &Store) -> Result<Self> {
        store.load_or_default(KEY_LLM_SETTINGS)
    }

    /// Persists the model after checking it names a known one.
    pub fn set_model(store: &Store, model: &str) -> Result<Self> {
        let spec = resolve_model(model)?;
        let settings = Self {
            model: spec.short_name,
        };
        store.save(KEY_LLM_SETTINGS, &settings)?;
        Ok(settings)
    }
}
