use super::{
    catalog::CatalogConfig,
    layers::LayerSamplingConfig,
    mutation::MutationOptions,
    search::SearchConfig,
    traits::{ConfigManifest, ConfigSection},
};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix for environment overrides, e.g. `EVOGRAPH__SEARCH__MAX_NODES=40`
pub const ENV_PREFIX: &str = "EVOGRAPH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub layers: LayerSamplingConfig,
    pub mutation: MutationOptions,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), GenomeError> {
        self.search.validate()?;
        self.layers.validate()?;
        self.mutation.validate()?;
        self.catalog.validate()?;
        Ok(())
    }

    pub fn manifests(&self) -> Vec<ConfigManifest> {
        vec![
            self.search.to_manifest(),
            self.layers.to_manifest(),
            self.mutation.to_manifest(),
            self.catalog.to_manifest(),
        ]
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Replace the current configuration with the contents of a TOML file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GenomeError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GenomeError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| GenomeError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        self.replace(config);
        Ok(())
    }

    /// Load an optional file, then apply `EVOGRAPH__SECTION__FIELD` environment overrides
    pub fn load_layered(&self, path: Option<&Path>) -> Result<(), GenomeError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        self.replace(config);
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GenomeError> {
        let toml_str = toml::to_string_pretty(&self.get())
            .map_err(|e| GenomeError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| GenomeError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply `f` and keep the result only if it still validates
    pub fn update<F>(&self, f: F) -> Result<(), GenomeError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        candidate.validate()?;
        self.replace(candidate);
        Ok(())
    }

    fn replace(&self, config: AppConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
        assert_eq!(AppConfig::default().manifests().len(), 4);
    }

    #[test]
    fn test_manifest_sections_name_toml_tables() {
        let config = AppConfig::default();
        let sections: Vec<String> = config.manifests().into_iter().map(|m| m.section).collect();
        assert_eq!(sections, vec!["search", "layers", "mutation", "catalog"]);

        let text = toml::to_string(&config).unwrap();
        for section in &sections {
            assert!(text.contains(&format!("[{}]", section)), "missing table {}", section);
        }
    }

    #[test]
    fn test_update_rejects_invalid_values() {
        let manager = ConfigManager::new();
        let result = manager.update(|c| c.search.min_fragments = 9);
        assert!(matches!(result, Err(GenomeError::Configuration(_))));
        assert_eq!(manager.get().search.min_fragments, 2);

        manager.update(|c| c.search.max_nodes = Some(30)).unwrap();
        assert_eq!(manager.get().search.max_nodes, Some(30));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("[search]\nmax_nodes = 12\n").unwrap();
        assert_eq!(config.search.max_nodes, Some(12));
        assert_eq!(config.search.replacement_attempts, 10);
        assert_eq!(config.layers, LayerSamplingConfig::default());
    }
}
