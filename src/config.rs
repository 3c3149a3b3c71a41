use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::RelationPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relation_retry_interval_ms: u64,
    pub deploy_retry_interval_ms: u64,
    /// 0 keeps retrying until every relation is set.
    pub max_relation_attempts: u32,
    pub max_deploy_passes: u32,
    pub relation_policy: RelationPolicy,
    pub charm_plugin_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relation_retry_interval_ms: 5000,
            deploy_retry_interval_ms: 5000,
            max_relation_attempts: 0,
            max_deploy_passes: 100,
            relation_policy: RelationPolicy::default(),
            charm_plugin_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// File values (or defaults) with environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("CLOUDCHARM_PLUGIN_DIR") {
            self.charm_plugin_dir = Some(PathBuf::from(dir));
        }
        if let Some(policy) = var("CLOUDCHARM_RELATION_POLICY") {
            self.relation_policy = policy
                .parse::<RelationPolicy>()
                .with_context(|| format!("Invalid CLOUDCHARM_RELATION_POLICY '{}'", policy))?;
        }
        if let Some(level) = var("CLOUDCHARM_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn relation_retry_interval(&self) -> Duration {
        Duration::from_millis(self.relation_retry_interval_ms)
    }

    pub fn deploy_retry_interval(&self) -> Duration {
        Duration::from_millis(self.deploy_retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.relation_retry_interval(), Duration::from_secs(5));
        assert_eq!(config.max_relation_attempts, 0);
        assert_eq!(config.relation_policy, RelationPolicy::ContinueOnFailure);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloudcharm.toml");
        std::fs::write(
            &path,
            r#"
relation_retry_interval_ms = 250
relation_policy = "abort_on_failure"
charm_plugin_dir = "/etc/cloudcharm/charms"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.relation_retry_interval_ms, 250);
        assert_eq!(config.relation_policy, RelationPolicy::AbortOnFailure);
        assert_eq!(
            config.charm_plugin_dir,
            Some(PathBuf::from("/etc/cloudcharm/charms"))
        );
        assert_eq!(config.deploy_retry_interval_ms, 5000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_file_rejects_bad_policy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloudcharm.toml");
        std::fs::write(&path, "relation_policy = \"whenever\"\n").unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("CLOUDCHARM_PLUGIN_DIR", "/srv/charms"),
                ("CLOUDCHARM_RELATION_POLICY", "abort-on-failure"),
                ("CLOUDCHARM_LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.charm_plugin_dir, Some(PathBuf::from("/srv/charms")));
        assert_eq!(config.relation_policy, RelationPolicy::AbortOnFailure);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_relation_attempts, 0);
    }

    #[test]
    fn test_env_rejects_bad_policy() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("CLOUDCHARM_RELATION_POLICY", "bogus")]))
            .unwrap_err();

        assert!(format!("{:#}", err).contains("CLOUDCHARM_RELATION_POLICY 'bogus'"));
        assert_eq!(config.relation_policy, RelationPolicy::ContinueOnFailure);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
