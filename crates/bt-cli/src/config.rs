//! Runner configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bt_runtime::BindMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a project keeps its configuration, relative to the project root.
pub const CONFIG_PATH: &str = ".bt/config.yaml";

/// Runner configuration, loaded from .bt/config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory tree documents are loaded from (relative to project root)
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Tick limit for `bt run` when none is given
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// How deep tree references may nest
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: usize,

    /// Binding mode for loaded trees
    pub mode: LoadMode,

    /// Print status trace events as JSON lines
    pub trace: bool,

    /// Initial global blackboard entries
    pub globals: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    #[default]
    Live,
    Edit,
}

impl From<LoadMode> for BindMode {
    fn from(mode: LoadMode) -> Self {
        match mode {
            LoadMode::Live => BindMode::Live,
            LoadMode::Edit => BindMode::EditTime,
        }
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("trees")
}
fn default_max_ticks() -> u64 {
    100
}
fn default_max_reference_depth() -> usize {
    bt_asset::asset::DEFAULT_MAX_DEPTH
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            max_ticks: default_max_ticks(),
            max_reference_depth: default_max_reference_depth(),
            mode: LoadMode::default(),
            trace: false,
            globals: Map::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load from project root (looks for .bt/config.yaml)
    pub fn load_from_project(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_PATH);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve paths relative to project root
    pub fn resolve_paths(&mut self, project_root: &Path) {
        self.asset_root = project_root.join(&self.asset_root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load_from_project(dir.path()).unwrap();
        assert_eq!(config.asset_root, PathBuf::from("trees"));
        assert_eq!(config.max_ticks, 100);
        assert_eq!(config.mode, LoadMode::Live);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".bt")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_PATH),
            "max_ticks: 7\nmode: edit\nglobals:\n  alarm: false\n  speed: 2.5\n",
        )
        .unwrap();

        let mut config = RuntimeConfig::load_from_project(dir.path()).unwrap();
        assert_eq!(config.max_ticks, 7);
        assert_eq!(BindMode::from(config.mode), BindMode::EditTime);
        assert_eq!(config.globals.get("speed"), Some(&Value::from(2.5)));
        assert_eq!(config.max_reference_depth, bt_asset::asset::DEFAULT_MAX_DEPTH);

        config.resolve_paths(dir.path());
        assert_eq!(config.asset_root, dir.path().join("trees"));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "max_ticks: [").unwrap();
        assert!(RuntimeConfig::load(&path).is_err());
    }
}
