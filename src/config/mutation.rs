use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

/// Per-hyperparameter probabilities used by parameter mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationOptions {
    pub conv2d_filters: f64,
    pub conv2d_kernel_size: f64,
    pub conv2d_stride_size: f64,
    pub conv2d_padding: f64,
    pub conv2d_dilation: f64,
    pub conv2d_use_bias: f64,
    pub pooling_pool_type: f64,
    pub pooling_kernel_size: f64,
    pub dense_units: f64,
    pub dense_activation: f64,
    pub dense_use_bias: f64,
}

impl Default for MutationOptions {
    fn default() -> Self {
        Self {
            conv2d_filters: 0.1,
            conv2d_kernel_size: 0.1,
            conv2d_stride_size: 0.05,
            conv2d_padding: 0.05,
            conv2d_dilation: 0.05,
            conv2d_use_bias: 0.05,
            pooling_pool_type: 0.1,
            pooling_kernel_size: 0.1,
            dense_units: 0.1,
            dense_activation: 0.05,
            dense_use_bias: 0.05,
        }
    }
}

impl MutationOptions {
    fn probabilities(&self) -> [(&'static str, f64); 11] {
        [
            ("conv2d_filters", self.conv2d_filters),
            ("conv2d_kernel_size", self.conv2d_kernel_size),
            ("conv2d_stride_size", self.conv2d_stride_size),
            ("conv2d_padding", self.conv2d_padding),
            ("conv2d_dilation", self.conv2d_dilation),
            ("conv2d_use_bias", self.conv2d_use_bias),
            ("pooling_pool_type", self.pooling_pool_type),
            ("pooling_kernel_size", self.pooling_kernel_size),
            ("dense_units", self.dense_units),
            ("dense_activation", self.dense_activation),
            ("dense_use_bias", self.dense_use_bias),
        ]
    }
}

impl ConfigSection for MutationOptions {
    fn section_name() -> &'static str {
        "mutation"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        for (name, p) in self.probabilities() {
            if !(0.0..=1.0).contains(&p) {
                return Err(GenomeError::Configuration(format!(
                    "{} must be a probability between 0 and 1, got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = MutationOptions::default();
        ConfigManifest {
            section: Self::section_name().to_string(),
            fields: defaults
                .probabilities()
                .iter()
                .map(|(name, p)| FieldManifest {
                    name: name.to_string(),
                    field_type: "float".to_string(),
                    default: serde_json::json!(p),
                    min: Some(0.0),
                    max: Some(1.0),
                    description: format!("Chance to resample {}", name.replace('_', " ")),
                })
                .collect(),
        }
    }
}
