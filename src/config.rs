//! Agent configuration accessor
//!
//! The agent configuration is a YAML document. Probes read their own keys
//! through [`Config::get`] using dotted paths (`agent.topology.docker.endpoint`);
//! the assembler reads the typed [`TopologySettings`] under `agent.topology`.

use crate::{Result, TopoprobeError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TOPOLOGY_KEY: &str = "agent.topology";

pub const DEFAULT_EXTENSIONS_DIR: &str = "/usr/lib/topoprobe/extensions";

#[derive(Debug, Clone, Default)]
pub struct Config {
    root: Value,
}

impl Config {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let root: Value = serde_yaml::from_str(yaml)
            .map_err(|e| TopoprobeError::ConfigError(format!("Invalid YAML: {}", e)))?;

        Ok(Self { root })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents).map_err(|e| match e {
            TopoprobeError::ConfigError(msg) => {
                TopoprobeError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Look up the raw value at a dotted key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| node.get(segment))
            .filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Deserialize the value at a dotted key. A missing key is `Ok(None)`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.value(key) {
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|e| TopoprobeError::ConfigError(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        self.get_or(key, Vec::new())
    }

    pub fn topology(&self) -> Result<TopologySettings> {
        self.get_or(TOPOLOGY_KEY, TopologySettings::default())
    }
}

/// Settings consumed by bundle assembly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Built-in probe names to activate, in order.
    pub probes: Vec<String>,
    #[serde(alias = "plugins_dir")]
    pub extensions_dir: PathBuf,
    /// Extension names to load from `extensions_dir`, in order.
    #[serde(alias = "plugins")]
    pub extensions: Vec<String>,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            extensions_dir: PathBuf::from(DEFAULT_EXTENSIONS_DIR),
            extensions: Vec::new(),
        }
    }
}

impl TopologySettings {
    pub fn with_probes<I, S>(probes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            probes: probes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
agent:
  topology:
    probes:
      - ovsdb
      - docker
    plugins_dir: /opt/probes
    plugins: [custom]
    docker:
      endpoint: /run/docker.sock
    lldp:
      interfaces: [eth0, eth1]
"#;

    #[test]
    fn test_topology_settings_with_aliases() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let settings = config.topology().unwrap();

        assert_eq!(settings.probes, vec!["ovsdb", "docker"]);
        assert_eq!(settings.extensions_dir, PathBuf::from("/opt/probes"));
        assert_eq!(settings.extensions, vec!["custom"]);
    }

    #[test]
    fn test_missing_topology_uses_defaults() {
        let config = Config::from_yaml_str("agent: {}").unwrap();
        let settings = config.topology().unwrap();

        assert!(settings.probes.is_empty());
        assert!(settings.extensions.is_empty());
        assert_eq!(
            settings.extensions_dir,
            PathBuf::from(DEFAULT_EXTENSIONS_DIR)
        );
    }

    #[test]
    fn test_dotted_lookup() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(
            config.get_string("agent.topology.docker.endpoint").as_deref(),
            Some("/run/docker.sock")
        );
        assert_eq!(
            config
                .get_string_list("agent.topology.lldp.interfaces")
                .unwrap(),
            vec!["eth0", "eth1"]
        );
        assert!(!config.contains("agent.topology.neutron.endpoint"));
        assert_eq!(config.get::<u32>("agent.nope").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_is_config_error() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let err = config.get::<u32>("agent.topology.probes").unwrap_err();
        assert!(matches!(err, TopoprobeError::ConfigError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.topology().unwrap().probes.len(), 2);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Config::from_yaml_str("agent: [unclosed").unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }
}
