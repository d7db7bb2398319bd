use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub directory: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("genomes"),
        }
    }
}

impl ConfigSection for CatalogConfig {
    fn section_name() -> &'static str {
        "catalog"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        if self.directory.as_os_str().is_empty() {
            return Err(GenomeError::Configuration(
                "catalog directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: Self::section_name().to_string(),
            fields: vec![FieldManifest {
                name: "directory".to_string(),
                field_type: "path".to_string(),
                default: serde_json::json!("genomes"),
                min: None,
                max: None,
                description: "Where saved genomes and their index live".to_string(),
            }],
        }
    }
}
