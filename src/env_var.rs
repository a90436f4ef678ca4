use crate::error::{Error, Result};

use serde::Deserialize;
use std::path::PathBuf;

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_visibility_timeout() -> f64 {
    600.0
}

fn default_backend() -> String {
    "local".to_owned()
}

fn default_job_id() -> String {
    "0".to_owned()
}

fn default_chunk_height() -> usize {
    500
}

fn default_coordinator_computes() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Delay between two visibility checks in milliseconds, default: 100
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long (in seconds) a node waits for a store entry before failing with a not-ready error.
    /// 0 waits forever. default: 600.0 seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout: f64,

    /// The shared store backend to use
    /// local -- in process store, nodes are threads of one process (default)
    /// fs -- directory shared by all node processes, see `store_dir`
    #[serde(default = "default_backend")]
    pub backend: String, //local,fs

    /// Root directory of the fs backend
    pub store_dir: Option<PathBuf>,

    /// Run identifier, keeps the entries of different runs apart in a persistent store
    #[serde(default = "default_job_id")]
    pub job_id: String,

    /// Identity of this node
    pub node_id: Option<String>,

    /// Comma separated ids of every node in the cluster
    pub members: Option<Vec<String>>,

    /// Maximum number of rows of the left operand per chunk, default: 500
    #[serde(default = "default_chunk_height")]
    pub chunk_height: usize,

    /// Whether the coordinator also multiplies chunks, default: true
    #[serde(default = "default_coordinator_computes")]
    pub coordinator_computes: bool,

    /// Seed for operand generation, random when unset
    pub seed: Option<u64>,

    /// flag used to print runtime warnings. Default: true
    pub runtime_warnings: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout: default_visibility_timeout(),
            backend: default_backend(),
            store_dir: None,
            job_id: default_job_id(),
            node_id: None,
            members: None,
            chunk_height: default_chunk_height(),
            coordinator_computes: default_coordinator_computes(),
            seed: None,
            runtime_warnings: None,
        }
    }
}

impl Config {
    /// Read the `DISTMM_` prefixed environment variables
    pub fn from_env() -> Result<Config> {
        Config::from_iter(std::env::vars())
    }

    /// Same as [Config::from_env] but over an explicit set of variables
    pub fn from_iter<I>(vars: I) -> Result<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("DISTMM_")
            .from_iter::<_, Config>(vars)
            .map_err(|e| Error::config(format!("invalid DISTMM_ environment: {}", e)))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` when the wait is unbounded. Timeouts too large for a `Duration` saturate.
    pub fn deadline(&self) -> Option<std::time::Duration> {
        if self.visibility_timeout > 0.0 {
            Some(
                std::time::Duration::try_from_secs_f64(self.visibility_timeout)
                    .unwrap_or(std::time::Duration::MAX),
            )
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_height == 0 {
            return Err(Error::config("chunk height must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll interval must be at least 1ms"));
        }
        if std::time::Duration::try_from_secs_f64(self.visibility_timeout).is_err() {
            return Err(Error::config(format!(
                "visibility timeout must be a non-negative number of seconds, got {}",
                self.visibility_timeout
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_iter(vars(&[("PATH", "/usr/bin")])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval().as_millis(), 100);
        assert_eq!(config.deadline().unwrap().as_secs(), 600);
    }

    #[test]
    fn prefixed_overrides() {
        let config = Config::from_iter(vars(&[
            ("DISTMM_POLL_INTERVAL_MS", "5"),
            ("DISTMM_VISIBILITY_TIMEOUT", "0"),
            ("DISTMM_BACKEND", "fs"),
            ("DISTMM_STORE_DIR", "/tmp/distmm"),
            ("DISTMM_NODE_ID", "10.0.0.2"),
            ("DISTMM_MEMBERS", "10.0.0.1,10.0.0.2"),
            ("DISTMM_CHUNK_HEIGHT", "64"),
            ("DISTMM_COORDINATOR_COMPUTES", "false"),
            ("DISTMM_SEED", "9"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval_ms, 5);
        assert!(config.deadline().is_none());
        assert_eq!(config.backend, "fs");
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/distmm")));
        assert_eq!(
            config.members,
            Some(vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()])
        );
        assert_eq!(config.chunk_height, 64);
        assert!(!config.coordinator_computes);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn invalid_values() {
        assert!(Config::from_iter(vars(&[("DISTMM_CHUNK_HEIGHT", "many")])).is_err());
        let config = Config {
            chunk_height: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
        let config = Config {
            visibility_timeout: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = Config {
            visibility_timeout: 1e20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
        assert_eq!(config.deadline(), Some(std::time::Duration::MAX));
        let config = Config::from_iter(vars(&[("DISTMM_VISIBILITY_TIMEOUT", "inf")])).unwrap();
        assert!(config.validate().is_err());
    }
}
