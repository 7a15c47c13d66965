//! Two-layer application configuration.
//!
//! Layer 1 (environment) is read once at process start. Layer 2
//! (persisted `settings` rows) is re-readable via [`AppConfig::reload`]
//! without restarting the process, mirroring this crate's original
//! settings-cache invalidation for hot-reloadable values.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::models::Setting;
use crate::db::schema::settings::dsl::*;
use crate::db::DbPool;
use diesel::prelude::*;

const DEFAULT_CONFIG_DIR: &str = "/config";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_dir: PathBuf,
    pub database_url: String,
    pub poll_interval_secs: u64,
    pub max_concurrent_probes: usize,
    pub probe_timeout_secs: u64,
    pub probe_retry_count: u32,
    pub probe_retry_delay_secs: u64,
    pub bitrate_sample_duration_secs: u64,
    pub bandwidth_retention_days: u32,
    pub notification_min_interval_secs: u64,
    pub pipeline_cron_schedule: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            database_url: format!("{DEFAULT_CONFIG_DIR}/journal.db"),
            poll_interval_secs: 10,
            max_concurrent_probes: 8,
            probe_timeout_secs: 30,
            probe_retry_count: 2,
            probe_retry_delay_secs: 3,
            bitrate_sample_duration_secs: 10,
            bandwidth_retention_days: 90,
            notification_min_interval_secs: 5,
            pipeline_cron_schedule: "0 0 */6 * * *".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppConfig {
    /// Reads `CONFIG_DIR`/`DATABASE_URL`/`RUST_LOG` from the environment,
    /// then overlays the persisted `settings` table on top of the
    /// compiled-in defaults.
    pub async fn load(pool: &DbPool) -> Result<Self, ConfigError> {
        let mut config = Self::from_env();
        config.apply_settings(pool).await?;
        Ok(config)
    }

    /// Re-reads the persisted `settings` layer only; environment values
    /// (`config_dir`, `database_url`) are fixed for the process lifetime.
    pub async fn reload(&self, pool: &DbPool) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        next.apply_settings(pool).await?;
        Ok(next)
    }

    fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("CONFIG_DIR") {
            config.config_dir = PathBuf::from(&dir);
            config.database_url = format!("{dir}/journal.db");
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        config
    }

    async fn apply_settings(&mut self, pool: &DbPool) -> Result<(), ConfigError> {
        let pool = pool.clone();
        let rows: Vec<Setting> =
            tokio::task::spawn_blocking(move || -> Result<Vec<Setting>, ConfigError> {
                let mut conn = pool.get()?;
                Ok(settings.load::<Setting>(&mut conn)?)
            })
            .await??;

        for row in rows {
            self.apply_one(&row.key, &row.value);
        }
        Ok(())
    }

    fn apply_one(&mut self, setting_key: &str, raw_value: &str) {
        macro_rules! parse_into {
            ($field:expr) => {
                if let Ok(v) = raw_value.parse() {
                    $field = v;
                }
            };
        }

        match setting_key {
            "poll_interval_secs" => parse_into!(self.poll_interval_secs),
            "max_concurrent_probes" => parse_into!(self.max_concurrent_probes),
            "probe_timeout_secs" => parse_into!(self.probe_timeout_secs),
            "probe_retry_count" => parse_into!(self.probe_retry_count),
            "probe_retry_delay_secs" => parse_into!(self.probe_retry_delay_secs),
            "bitrate_sample_duration_secs" => parse_into!(self.bitrate_sample_duration_secs),
            "bandwidth_retention_days" => parse_into!(self.bandwidth_retention_days),
            "notification_min_interval_secs" => parse_into!(self.notification_min_interval_secs),
            "pipeline_cron_schedule" => self.pipeline_cron_schedule = raw_value.to_string(),
            _ => {}
        }
    }

    pub fn probe_history_path(&self) -> PathBuf {
        self.config_dir.join("probe_history.json")
    }
}

/// Shared, reloadable handle to the current [`AppConfig`].
pub type SharedConfig = Arc<RwLock<AppConfig>>;

pub fn shared(config: AppConfig) -> SharedConfig {
    Arc::new(RwLock::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval_secs, 10);
        assert!(config.max_concurrent_probes <= 16);
    }

    #[test]
    fn apply_one_parses_known_keys() {
        let mut config = AppConfig::default();
        config.apply_one("max_concurrent_probes", "12");
        assert_eq!(config.max_concurrent_probes, 12);
    }

    #[test]
    fn apply_one_ignores_unknown_keys() {
        let mut config = AppConfig::default();
        config.apply_one("totally_unknown", "whatever");
        assert_eq!(config, AppConfig::default());
    }

    impl PartialEq for AppConfig {
        fn eq(&self, other: &Self) -> bool {
            self.poll_interval_secs == other.poll_interval_secs
                && self.max_concurrent_probes == other.max_concurrent_probes
                && self.probe_timeout_secs == other.probe_timeout_secs
        }
    }
}
