use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::DiseaseMode;

pub const DEFAULT_CONFIG_NAME: &str = "radiodx.toml";

/// Model file locations, one optional path per mode
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    pub fracture: Option<PathBuf>,
    pub tb: Option<PathBuf>,
}

impl ModelsConfig {
    pub fn path(&self, mode: DiseaseMode) -> Option<&Path> {
        match mode {
            DiseaseMode::Fracture => self.fracture.as_deref(),
            DiseaseMode::Tuberculosis => self.tb.as_deref(),
        }
    }

    fn resolve_against(&mut self, base: &Path) {
        for path in [&mut self.fracture, &mut self.tb].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub models: ModelsConfig,
}

impl EngineConfig {
    /// Parse a config file. Relative model paths are taken relative to the
    /// directory holding the file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let mut config = Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        if let Some(base) = path.parent() {
            config.models.resolve_against(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load `radiodx.toml` from the working directory if present
    pub fn discover() -> anyhow::Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_NAME);
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Explicit paths win over whatever the file said
    pub fn with_overrides(mut self, fracture: Option<PathBuf>, tb: Option<PathBuf>) -> Self {
        if fracture.is_some() {
            self.models.fracture = fracture;
        }
        if tb.is_some() {
            self.models.tb = tb;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_has_no_models() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("radiodx.toml");
        std::fs::write(&path, "[models]\nfracture = \"models/fracture.json\"\n").unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(
            config.models.path(DiseaseMode::Fracture),
            Some(dir.path().join("models/fracture.json").as_path())
        );
        assert_eq!(config.models.path(DiseaseMode::Tuberculosis), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EngineConfig::from_toml_str("[models]\nxray = \"a.json\"\n").is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = EngineConfig::from_toml_str("[models]\ntb = \"a.json\"\n")
            .unwrap()
            .with_overrides(None, Some(PathBuf::from("b.json")));
        assert_eq!(config.models.tb, Some(PathBuf::from("b.json")));
    }
}
