//! Engine configuration (spec §2 [EXPANDED], §6).
//!
//! Loaded from a JSON file in the data directory, schema-versioned and
//! migrated forward with the same [`migration::Migrate`] trait the teacher
//! crate uses for its own config. Loading config (or the credentials file it
//! points at, or opening the database it names) is one of the few
//! operations in this crate allowed to abort the process with configuration
//! exit code `2` — everything past this point assumes a valid config.

pub mod migration;

use anyhow::{anyhow, Context, Result};
use migration::Migrate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const APP_DIR_NAME: &str = "filekeep";
const CONFIG_FILE_NAME: &str = "engine.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: u32,
    pub data_dir: PathBuf,
    pub remote: RemoteConfig,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_poll_soft_deadline_secs")]
    pub poll_soft_deadline_secs: u64,
    #[serde(default = "default_poll_hard_deadline_secs")]
    pub poll_hard_deadline_secs: u64,
    #[serde(default = "default_stuck_threshold_secs")]
    pub stuck_transition_threshold_secs: u64,
    #[serde(default)]
    pub searchability_tolerance: SearchabilityTolerance,
    /// Query the verifier issues for assertion 5 (spec §4.7): "a canonical
    /// semantic query returns at least N citations".
    #[serde(default = "default_canonical_query")]
    pub verifier_canonical_query: String,
    #[serde(default = "default_min_citations")]
    pub verifier_min_citations: usize,
    /// K in assertion 7's "K randomly sampled INDEXED files".
    #[serde(default = "default_sample_size")]
    pub verifier_sample_size: usize,
    /// M in assertion 7's "top-M results".
    #[serde(default = "default_top_m")]
    pub verifier_top_m: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub credentials_path: PathBuf,
}

/// Per-category tolerance for verifier assertion 7 (spec §4.7, Open
/// Question — resolved in DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchabilityTolerance {
    /// Categories skipped by the per-file searchability sample entirely:
    /// large numbered runs (podcast episodes, office-hours recordings)
    /// where near-identical entries make top-M discrimination unreliable
    /// by construction, not by a bug in the engine or the remote store.
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,
    /// Fraction (0.0-1.0) of sampled files outside the excluded categories
    /// allowed to miss the top-M cutoff before assertion 7 fails.
    #[serde(default = "default_tolerance_fraction")]
    pub tolerance_fraction: f64,
}

impl Default for SearchabilityTolerance {
    fn default() -> Self {
        Self {
            excluded_categories: default_excluded_categories(),
            tolerance_fraction: default_tolerance_fraction(),
        }
    }
}

fn default_excluded_categories() -> Vec<String> {
    vec!["podcast_episode".to_string(), "numbered_series".to_string()]
}
fn default_tolerance_fraction() -> f64 {
    0.1
}
fn default_batch_size() -> usize {
    25
}
fn default_concurrency() -> usize {
    8
}
fn default_limit() -> usize {
    100
}
fn default_poll_soft_deadline_secs() -> u64 {
    30
}
fn default_poll_hard_deadline_secs() -> u64 {
    300
}
fn default_stuck_threshold_secs() -> u64 {
    3600
}
fn default_canonical_query() -> String {
    "status report".to_string()
}
fn default_min_citations() -> usize {
    1
}
fn default_sample_size() -> usize {
    20
}
fn default_top_m() -> usize {
    5
}

impl EngineConfig {
    /// `~/.local/share/filekeep` (platform-appropriate via `dirs::data_dir`).
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or_else(|| anyhow!("no data directory available on this platform"))
    }

    /// Load configuration from `data_dir`, migrating and re-saving if the
    /// file is older than [`Migrate::target_version`]. Writes a fresh
    /// default config if none exists yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            info!(path = %config_path.display(), "loading engine config");
            let json = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let mut config: EngineConfig = serde_json::from_str(&json)
                .with_context(|| format!("parsing {}", config_path.display()))?;

            if config.needs_migration() {
                info!(
                    from = config.version,
                    to = Self::target_version(),
                    "migrating engine config"
                );
                config.migrate()?;
                config.save()?;
            }
            Ok(config)
        } else {
            warn!(path = %config_path.display(), "no engine config found, writing default");
            let config = Self::default_with_dir(data_dir.to_path_buf());
            config.save()?;
            Ok(config)
        }
    }

    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: Self::target_version(),
            remote: RemoteConfig {
                base_url: "https://api.example-vectorstore.invalid".to_string(),
                credentials_path: data_dir.join("credentials.json"),
            },
            default_batch_size: default_batch_size(),
            default_concurrency: default_concurrency(),
            default_limit: default_limit(),
            poll_soft_deadline_secs: default_poll_soft_deadline_secs(),
            poll_hard_deadline_secs: default_poll_hard_deadline_secs(),
            stuck_transition_threshold_secs: default_stuck_threshold_secs(),
            searchability_tolerance: SearchabilityTolerance::default(),
            verifier_canonical_query: default_canonical_query(),
            verifier_min_citations: default_min_citations(),
            verifier_sample_size: default_sample_size(),
            verifier_top_m: default_top_m(),
            data_dir,
        }
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(CONFIG_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!(path = %config_path.display(), "saved engine config");
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("engine.sqlite3")
    }

    pub fn poll_soft_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_soft_deadline_secs)
    }

    pub fn poll_hard_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_hard_deadline_secs)
    }

    pub fn stuck_transition_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_transition_threshold_secs)
    }
}

impl Migrate for EngineConfig {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn target_version() -> u32 {
        1
    }

    fn migrate(&mut self) -> Result<()> {
        match self.version {
            0 => {
                self.version = 1;
                Ok(())
            }
            1 => Ok(()),
            v => Err(anyhow!("unknown engine config version: {v}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();

        let loaded = EngineConfig::load(&data_dir).unwrap();
        assert_eq!(loaded.version, EngineConfig::target_version());
        assert_eq!(loaded.default_batch_size, default_batch_size());

        let reloaded = EngineConfig::load(&data_dir).unwrap();
        assert_eq!(reloaded.remote.base_url, loaded.remote.base_url);
    }

    #[test]
    fn stale_version_is_migrated_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();
        let mut config = EngineConfig::default_with_dir(data_dir.clone());
        config.version = 0;
        config.save().unwrap();

        let reloaded = EngineConfig::load(&data_dir).unwrap();
        assert_eq!(reloaded.version, EngineConfig::target_version());
    }
}
