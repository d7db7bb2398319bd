//! Persistent store of serialized genomes.

pub mod directory;
pub mod summary;

pub use directory::DirectoryCatalog;
pub use summary::{check_stream_compatibility, Compatibility, DataStream, GenomeSummary, StreamRole, StreamType};

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// RFC 3339
    pub created_at: String,
    #[serde(flatten)]
    pub summary: GenomeSummary,
    #[serde(default)]
    pub best_loss: Option<f32>,
    #[serde(default)]
    pub best_accuracy: Option<f32>,
}

impl CatalogEntry {
    /// Fold in one evaluation, keeping the lowest loss and highest accuracy seen
    pub fn record(&mut self, loss: f32, accuracy: f32) {
        if self.best_loss.map_or(true, |best| loss < best) {
            self.best_loss = Some(loss);
        }
        if self.best_accuracy.map_or(true, |best| accuracy > best) {
            self.best_accuracy = Some(accuracy);
        }
    }
}

pub trait GenomeCatalog {
    fn save(&self, serialized: &str, name: &str, tags: &[String]) -> Result<CatalogEntry>;

    fn load(&self, id: &str) -> Result<String>;

    fn list(&self) -> Result<Vec<CatalogEntry>>;

    /// Deleting an unknown id is not an error
    fn delete(&self, id: &str) -> Result<()>;

    fn record_evaluation(&self, id: &str, loss: f32, accuracy: f32) -> Result<CatalogEntry>;
}
