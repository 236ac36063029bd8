//! A small builder around loading and normalizing a single YAML file.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::ShiroConfig;
use crate::normalize::normalize;

/// Loads a [`ShiroConfig`] from a single YAML file, applying the
/// normalization rules once deserialization succeeds.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the file, then normalizes it. Returns
    /// [`ConfigError::NotFound`] if the file does not exist, distinct from
    /// a generic I/O error, since a missing config file is the most common
    /// setup mistake and deserves its own message.
    pub fn load(&self) -> Result<ShiroConfig, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.display().to_string()));
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut config: ShiroConfig = serde_yaml::from_str(&raw)?;
        apply_env_overrides(&mut config);
        normalize(&mut config)?;
        Ok(config)
    }

    /// Like [`ConfigLoader::load`], but falls back to
    /// [`ShiroConfig::default`] (still normalized) when the file does not
    /// exist, rather than failing.
    pub fn load_or_default(&self) -> Result<ShiroConfig, ConfigError> {
        match self.load() {
            Err(ConfigError::NotFound(_)) => {
                let mut config = ShiroConfig::default();
                apply_env_overrides(&mut config);
                normalize(&mut config)?;
                Ok(config)
            }
            other => other,
        }
    }
}

/// `SHIRO_*` environment overrides for the handful of top-level scalars an
/// operator most often wants to flip per-invocation without editing the
/// YAML file (only these named variables are recognized, not a full
/// struct-path mapping). Applied before normalization so e.g. an
/// env-provided `SHIRO_DATABASE` still gets injected into the DSN.
fn apply_env_overrides(config: &mut ShiroConfig) {
    if let Ok(v) = std::env::var("SHIRO_DSN") {
        config.dsn = v;
    }
    if let Ok(v) = std::env::var("SHIRO_DATABASE") {
        config.database = v;
    }
    if let Some(v) = std::env::var("SHIRO_SEED").ok().and_then(|v| v.parse().ok()) {
        config.seed = v;
    }
    if let Some(v) = std::env::var("SHIRO_ITERATIONS").ok().and_then(|v| v.parse().ok()) {
        config.iterations = v;
    }
    if let Some(v) = std::env::var("SHIRO_WORKERS").ok().and_then(|v| v.parse().ok()) {
        config.workers = v;
    }
    if let Some(v) = std::env::var("SHIRO_PLAN_CACHE_ONLY").ok().and_then(|v| v.parse().ok()) {
        config.plan_cache_only = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shiro.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_errors_on_load() {
        let loader = ConfigLoader::new("/nonexistent/shiro.yaml");
        assert!(matches!(loader.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn missing_file_falls_back_to_default_on_load_or_default() {
        let loader = ConfigLoader::new("/nonexistent/shiro.yaml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn partial_yaml_fills_in_documented_defaults() {
        let (_dir, path) = write_temp("dsn: \"10.0.0.1:4000\"\nworkers: 8\n");
        let config = ConfigLoader::new(&path).load().unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.max_tables, 8);
        assert!(config.features.joins);
    }

    #[test]
    fn loaded_config_is_normalized() {
        let (_dir, path) = write_temp("database: testdb\ndsn: \"10.0.0.1:4000\"\n");
        let config = ConfigLoader::new(&path).load().unwrap();
        assert_eq!(config.dsn, "10.0.0.1:4000/testdb");
    }

    #[test]
    fn env_override_wins_over_yaml() {
        let (_dir, path) = write_temp("workers: 8\n");
        std::env::set_var("SHIRO_WORKERS", "2");
        let config = ConfigLoader::new(&path).load();
        std::env::remove_var("SHIRO_WORKERS");
        assert_eq!(config.unwrap().workers, 2);
    }
}
