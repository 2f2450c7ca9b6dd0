//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file,
//! then CLI flags and environment variables (applied in `main`).

use std::path::Path;
use std::time::Duration;

use herd_cluster::ClientConfig;
use herd_core::DEFAULT_CLUSTER;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Everything a herd node needs to come up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HerdConfig {
    /// Cluster address shared by every node of the cluster.
    pub cluster: String,
    /// This node's id. Generated at startup when empty.
    pub node: String,
    /// Groups this node joins.
    pub groups: Vec<String>,
    pub reply_timeout_ms: u64,
    pub runtime_timeout_ms: u64,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_owned(),
            node: String::new(),
            groups: vec!["default".to_owned()],
            reply_timeout_ms: 30_000,
            runtime_timeout_ms: 30_000,
        }
    }
}

impl HerdConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the values that have no sensible fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster must not be empty".into()));
        }
        if let Some(bad) = self.groups.iter().find(|g| g.trim().is_empty() || g.contains('.')) {
            return Err(ConfigError::Invalid(format!(
                "invalid group name '{bad}': must be non-empty and contain no '.'"
            )));
        }
        if self.node.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "invalid node id '{}': must not contain '.'",
                self.node
            )));
        }
        if self.reply_timeout_ms == 0 || self.runtime_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 ms".into()));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            runtime_timeout: Duration::from_millis(self.runtime_timeout_ms),
            ..ClientConfig::new(self.cluster.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn template_round_trips() {
        let cfg = HerdConfig::default();
        let text = cfg.to_toml().unwrap();
        assert!(text.contains("reply-timeout-ms = 30000"));
        let parsed: HerdConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cluster = \"prod\"\ngroups = [\"web\", \"jobs\"]").unwrap();
        let cfg = HerdConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.cluster, "prod");
        assert_eq!(cfg.groups, ["web", "jobs"]);
        // untouched keys keep their defaults
        assert_eq!(cfg.runtime_timeout_ms, 30_000);
    }

    #[test]
    fn bad_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "groups = 3").unwrap();
        let err = HerdConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let err = HerdConfig::from_file(Path::new("/nonexistent/herd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn validation() {
        assert!(HerdConfig::default().validate().is_ok());
        let dotted = HerdConfig {
            groups: vec!["a.b".into()],
            ..HerdConfig::default()
        };
        assert!(dotted.validate().is_err());
        let no_cluster = HerdConfig {
            cluster: " ".into(),
            ..HerdConfig::default()
        };
        assert!(no_cluster.validate().is_err());
    }

    #[test]
    fn client_config_carries_timeouts() {
        let cfg = HerdConfig {
            reply_timeout_ms: 250,
            ..HerdConfig::default()
        };
        let client = cfg.client_config();
        assert_eq!(client.cluster, DEFAULT_CLUSTER);
        assert_eq!(client.reply_timeout, Duration::from_millis(250));
        assert_eq!(client.probe_timeout, Duration::from_millis(1));
    }
}
