use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub data_dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `HOSTNAME:PORT`; port 0 lets the environment choose.
    pub listen: String,
    pub seeds: Vec<String>,
    pub max_connections: usize,
    pub announcement_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                data_dir: PathBuf::from("./data"),
                name: "bazaar-node".to_string(),
            },
            network: NetworkConfig {
                listen: "localhost:0".to_string(),
                seeds: vec![],
                max_connections: 12,
                announcement_interval_secs: 10,
            },
            storage: StorageConfig {
                purge_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: NodeConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Environment variables win over the config file; CLI flags win over
    /// both (applied by the caller).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("BAZAAR_DATA_DIR") {
            self.node.data_dir = PathBuf::from(dir);
        }
        if let Ok(listen) = env::var("BAZAAR_LISTEN") {
            self.network.listen = listen;
        }
        if let Ok(seeds) = env::var("BAZAAR_SEEDS") {
            self.network.seeds = seeds
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(level) = env::var("BAZAAR_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_toml() {
        let config = NodeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.listen, config.network.listen);
        assert_eq!(parsed.storage.purge_interval_secs, 60);
    }
}
