// src/config/mod.rs
//! Service configuration.
//!
//! Lookup order:
//! 1) `$RANKER_CONFIG_PATH`
//! 2) `config/ranker.toml`
//! 3) built-in defaults
//!
//! After the file, a few env vars override single fields
//! (`RANKER_DATABASE_PATH`, `RANKER_RECENCY_DAYS`, `RANKER_MAX_CONCURRENCY`,
//! `RANKER_MAX_UPLOAD_BYTES`, `EVALUATOR_TEST_MODE=mock`).

pub mod evaluator;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub use evaluator::EvaluatorConfig;

use crate::dedup::{DEFAULT_RECENCY_WINDOW_DAYS, MAX_RECENCY_WINDOW_DAYS};
use crate::extract::DEFAULT_IDENTITY;

pub const DEFAULT_CONFIG_PATH: &str = "config/ranker.toml";
pub const ENV_CONFIG_PATH: &str = "RANKER_CONFIG_PATH";

fn default_database_path() -> PathBuf {
    PathBuf::from("data/resume_ranker.db")
}
fn default_recency_days() -> i64 {
    DEFAULT_RECENCY_WINDOW_DAYS
}
fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}
fn default_max_concurrent() -> usize {
    4
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_recency_days")]
    pub recency_window_days: i64,
    /// Identity assigned to résumés without an e-mail address.
    #[serde(default = "default_identity")]
    pub default_identity: String,
    /// Upper bound on simultaneous evaluator calls.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_evaluations: usize,
    /// Request-body cap for the multipart upload routes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            recency_window_days: default_recency_days(),
            default_identity: default_identity(),
            max_concurrent_evaluations: default_max_concurrent(),
            max_upload_bytes: default_max_upload_bytes(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl RankerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ranker config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: RankerConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// File (env path → default path → defaults) plus env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from_file(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.sanitize()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(p) = std::env::var("RANKER_DATABASE_PATH") {
            if !p.trim().is_empty() {
                self.database_path = PathBuf::from(p);
            }
        }
        if let Some(days) = parse_env::<i64>("RANKER_RECENCY_DAYS") {
            self.recency_window_days = days;
        }
        if let Some(n) = parse_env::<usize>("RANKER_MAX_CONCURRENCY") {
            self.max_concurrent_evaluations = n;
        }
        if let Some(n) = parse_env::<usize>("RANKER_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = n;
        }
        if std::env::var("EVALUATOR_TEST_MODE").is_ok_and(|v| v == "mock") {
            self.evaluator.provider = "mock".to_string();
        }
    }

    fn sanitize(mut self) -> Result<Self> {
        if self.recency_window_days < 0 {
            self.recency_window_days = default_recency_days();
        }
        if self.recency_window_days > MAX_RECENCY_WINDOW_DAYS {
            return Err(anyhow!(
                "recency_window_days = {} exceeds the maximum of {MAX_RECENCY_WINDOW_DAYS}",
                self.recency_window_days
            ));
        }
        if self.max_concurrent_evaluations == 0 {
            self.max_concurrent_evaluations = default_max_concurrent();
        }
        if self.max_upload_bytes == 0 {
            self.max_upload_bytes = default_max_upload_bytes();
        }
        if self.default_identity.trim().is_empty() {
            self.default_identity = default_identity();
        }
        self.evaluator = self.evaluator.resolve()?;
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
