use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::classifier::sequence::DEFAULT_TIMESTEPS;
use crate::error::{PipelineError, PipelineResult};
use crate::eval::DEFAULT_PERMUTATION_REPEATS;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Everything one pipeline run needs to know about what to build.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub companies: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_window_sizes")]
    pub window_sizes: Vec<usize>,
    #[serde(default = "default_split_fraction")]
    pub split_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub permutation_repeats: usize,
    pub timesteps: usize,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub forest_min_samples_leaf: usize,
    pub logistic_epochs: usize,
    pub logistic_learning_rate: f64,
    pub logistic_l2: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

fn default_window_sizes() -> Vec<usize> {
    vec![3, 7, 14]
}

fn default_split_fraction() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    42
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl DataConfig {
    pub fn price_csv(&self, company: &str) -> PathBuf {
        self.data_dir
            .join("financial_data")
            .join(format!("{}.csv", company))
    }

    pub fn sentiment_csv(&self, company: &str) -> PathBuf {
        self.data_dir
            .join("sentiment_data")
            .join(format!("{}_sent.csv", company))
    }

    pub fn indicators_csv(&self) -> PathBuf {
        self.data_dir
            .join("financial_data")
            .join("external_indicators.csv")
    }

    pub fn feature_store(&self) -> PathBuf {
        self.data_dir.join("feature_tables.sqlite")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            permutation_repeats: DEFAULT_PERMUTATION_REPEATS,
            timesteps: DEFAULT_TIMESTEPS,
            forest_trees: 100,
            forest_max_depth: 10,
            forest_min_samples_leaf: 2,
            logistic_epochs: 500,
            logistic_learning_rate: 0.05,
            logistic_l2: 1e-3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.start_date > self.end_date {
            return Err(PipelineError::InvalidRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.companies.iter().all(|c| c.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(
                "run.companies must name at least one company".to_string(),
            ));
        }
        if self.window_sizes.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "run.window_sizes must not be empty".to_string(),
            ));
        }
        if let Some(w) = self.window_sizes.iter().find(|w| **w < 2) {
            return Err(PipelineError::InvalidConfig(format!(
                "run.window_sizes entry {} is too small: a sample std needs at least 2 observations",
                w
            )));
        }
        if let Some((i, w)) = self
            .window_sizes
            .iter()
            .enumerate()
            .find(|(i, w)| self.window_sizes[..*i].contains(w))
        {
            return Err(PipelineError::InvalidConfig(format!(
                "run.window_sizes entry {} at position {} is a duplicate",
                w, i
            )));
        }
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "run.split_fraction must be in (0, 1), got {}",
                self.split_fraction
            )));
        }
        Ok(())
    }

    /// Lowercased, trimmed, de-duplicated company identifiers in config order.
    pub fn company_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for c in &self.companies {
            let id = c.trim().to_ascii_lowercase();
            if !id.is_empty() && !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    pub fn calendar_days(&self) -> usize {
        usize::try_from((self.end_date - self.start_date).num_days() + 1).unwrap_or(0)
    }
}

impl ModelConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.permutation_repeats == 0 {
            return Err(PipelineError::InvalidConfig(
                "model.permutation_repeats must be > 0".to_string(),
            ));
        }
        if self.timesteps == 0 {
            return Err(PipelineError::InvalidConfig(
                "model.timesteps must be > 0".to_string(),
            ));
        }
        if self.forest_trees == 0 {
            return Err(PipelineError::InvalidConfig(
                "model.forest_trees must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_path() -> PathBuf {
    std::env::var("SF_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from_path(&config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config toml")?;
        config.run.validate().context("run section is invalid")?;
        config.model.validate().context("model section is invalid")?;
        Ok(config)
    }
}
