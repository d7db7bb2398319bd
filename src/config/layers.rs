use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

/// Choices drawn from when a mutation invents a new layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSamplingConfig {
    pub conv_filters: Vec<usize>,
    pub conv_kernel_sizes: Vec<usize>,
    /// Chance that a new 3-D layer is a convolution rather than a pooling layer
    pub conv_probability: f64,
    pub dense_units: Vec<usize>,
    pub pool_kernel: usize,
    pub pool_stride: usize,
}

impl Default for LayerSamplingConfig {
    fn default() -> Self {
        Self {
            conv_filters: vec![16, 32, 64],
            conv_kernel_sizes: vec![3],
            conv_probability: 0.5,
            dense_units: vec![32, 64, 128],
            pool_kernel: 2,
            pool_stride: 2,
        }
    }
}

impl ConfigSection for LayerSamplingConfig {
    fn section_name() -> &'static str {
        "layers"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        if self.conv_filters.is_empty() || self.conv_filters.contains(&0) {
            return Err(GenomeError::Configuration(
                "conv_filters needs at least one positive entry".to_string(),
            ));
        }
        if self.conv_kernel_sizes.is_empty() || self.conv_kernel_sizes.iter().any(|k| k % 2 == 0) {
            return Err(GenomeError::Configuration(
                "conv_kernel_sizes must be non-empty and odd".to_string(),
            ));
        }
        if self.dense_units.is_empty() || self.dense_units.contains(&0) {
            return Err(GenomeError::Configuration(
                "dense_units needs at least one positive entry".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.conv_probability) {
            return Err(GenomeError::Configuration(
                "conv_probability must be between 0 and 1".to_string(),
            ));
        }
        if self.pool_kernel == 0 || self.pool_stride == 0 {
            return Err(GenomeError::Configuration(
                "pool_kernel and pool_stride must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: Self::section_name().to_string(),
            fields: vec![
                FieldManifest {
                    name: "conv_filters".to_string(),
                    field_type: "integer_list".to_string(),
                    default: serde_json::json!([16, 32, 64]),
                    min: Some(1.0),
                    max: None,
                    description: "Filter counts for new convolutions".to_string(),
                },
                FieldManifest {
                    name: "conv_probability".to_string(),
                    field_type: "float".to_string(),
                    default: serde_json::json!(0.5),
                    min: Some(0.0),
                    max: Some(1.0),
                    description: "Share of new 3-D layers that are convolutions".to_string(),
                },
                FieldManifest {
                    name: "dense_units".to_string(),
                    field_type: "integer_list".to_string(),
                    default: serde_json::json!([32, 64, 128]),
                    min: Some(1.0),
                    max: None,
                    description: "Unit counts for new dense layers".to_string(),
                },
            ],
        }
    }
}
