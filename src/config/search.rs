use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Offspring with more nodes than this are discarded
    pub max_nodes: Option<usize>,
    pub dtype_bytes: u64,
    pub replacement_attempts: usize,
    pub min_fragments: usize,
    pub max_fragments: usize,
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_nodes: None,
            dtype_bytes: 4,
            replacement_attempts: 10,
            min_fragments: 2,
            max_fragments: 4,
            seed: None,
        }
    }
}

impl ConfigSection for SearchConfig {
    fn section_name() -> &'static str {
        "search"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        if self.max_nodes == Some(0) {
            return Err(GenomeError::Configuration(
                "max_nodes must be positive when set".to_string(),
            ));
        }
        if !matches!(self.dtype_bytes, 1 | 2 | 4 | 8) {
            return Err(GenomeError::Configuration(
                "dtype_bytes must be one of 1, 2, 4 or 8".to_string(),
            ));
        }
        if self.replacement_attempts == 0 {
            return Err(GenomeError::Configuration(
                "replacement_attempts must be at least 1".to_string(),
            ));
        }
        if self.min_fragments == 0 || self.min_fragments > self.max_fragments {
            return Err(GenomeError::Configuration(format!(
                "fragment range {}..={} is empty",
                self.min_fragments, self.max_fragments
            )));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: Self::section_name().to_string(),
            fields: vec![
                FieldManifest {
                    name: "max_nodes".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(null),
                    min: Some(1.0),
                    max: None,
                    description: "Node budget for offspring, unlimited when unset".to_string(),
                },
                FieldManifest {
                    name: "dtype_bytes".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(4),
                    min: Some(1.0),
                    max: Some(8.0),
                    description: "Bytes per tensor element used for resource figures".to_string(),
                },
                FieldManifest {
                    name: "replacement_attempts".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(10),
                    min: Some(1.0),
                    max: Some(100.0),
                    description: "Retries for replacement crossover".to_string(),
                },
                FieldManifest {
                    name: "min_fragments".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(2),
                    min: Some(1.0),
                    max: None,
                    description: "Fewest donor fragments in multi-point crossover".to_string(),
                },
                FieldManifest {
                    name: "max_fragments".to_string(),
                    field_type: "integer".to_string(),
                    default: serde_json::json!(4),
                    min: Some(1.0),
                    max: None,
                    description: "Most donor fragments in multi-point crossover".to_string(),
                },
            ],
        }
    }
}
