use super::{CatalogEntry, GenomeCatalog, GenomeSummary};
use crate::config::CatalogConfig;
use crate::error::{GenomeError, Result};
use chrono::Utc;
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

const META_FILE: &str = "meta.json";
const GENOME_EXTENSION: &str = "evog";

/// Catalog backed by one directory: a `<id>.evog` file per genome and a
/// `meta.json` index describing all of them.
pub struct DirectoryCatalog {
    root: PathBuf,
    // Serializes read-modify-write cycles on meta.json
    meta_lock: Mutex<()>,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            meta_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.directory.clone())
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    fn genome_path(&self, id: &str) -> Result<PathBuf> {
        // Ids double as file names, so only accept what `save` hands out
        Uuid::parse_str(id).map_err(|_| GenomeError::Catalog(format!("invalid genome id {:?}", id)))?;
        Ok(self.root.join(format!("{}.{}", id, GENOME_EXTENSION)))
    }

    /// A missing index is an empty catalog; an unreadable one is logged and
    /// treated the same way.
    fn read_meta(&self) -> Result<Vec<CatalogEntry>> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Ignoring unparsable catalog index {}: {}", path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn write_meta(&self, entries: &[CatalogEntry]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.meta_path(), serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl GenomeCatalog for DirectoryCatalog {
    fn save(&self, serialized: &str, name: &str, tags: &[String]) -> Result<CatalogEntry> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|e| e.into_inner());

        let id = Uuid::new_v4().to_string();
        fs::create_dir_all(&self.root)?;
        fs::write(self.genome_path(&id)?, serialized)?;

        let entry = CatalogEntry {
            id,
            name: name.to_string(),
            tags: tags.to_vec(),
            created_at: Utc::now().to_rfc3339(),
            summary: GenomeSummary::from_serialized(serialized),
            best_loss: None,
            best_accuracy: None,
        };

        let mut entries = self.read_meta()?;
        entries.push(entry.clone());
        self.write_meta(&entries)?;

        debug!("Saved genome {} ({}) to {}", entry.id, entry.name, self.root.display());
        Ok(entry)
    }

    fn load(&self, id: &str) -> Result<String> {
        let path = self.genome_path(id)?;
        if !path.exists() {
            return Err(GenomeError::Catalog(format!("no genome with id {}", id)));
        }
        Ok(fs::read_to_string(path)?)
    }

    fn list(&self) -> Result<Vec<CatalogEntry>> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_meta()
    }

    fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.genome_path(id)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let mut entries = self.read_meta()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() != before {
            self.write_meta(&entries)?;
        }
        Ok(())
    }

    fn record_evaluation(&self, id: &str, loss: f32, accuracy: f32) -> Result<CatalogEntry> {
        let _guard = self.meta_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = self.read_meta()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GenomeError::Catalog(format!("no genome with id {}", id)))?;
        entry.record(loss, accuracy);
        let updated = entry.clone();

        self.write_meta(&entries)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FLATTEN: &str = "{\"node\":\"Input\",\"params\":{\"output_shape\":[28,28,1]}}\n\
        {\"node\":\"Flatten\",\"params\":{}}\n\
        {\"node\":\"Output\",\"params\":{\"input_shape\":[784]}}\n\
        CONNECTIONS\n0 1\n1 2\n";

    #[test]
    fn test_save_load_list_delete() {
        let dir = TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(dir.path().join("lib"));

        let entry = catalog.save(FLATTEN, "flat", &["baseline".to_string()]).unwrap();
        assert_eq!(entry.summary.total_nodes, 3);
        assert_eq!(entry.summary.input_dims, vec![3]);
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.created_at).is_ok());

        assert_eq!(catalog.load(&entry.id).unwrap(), FLATTEN);
        assert_eq!(catalog.list().unwrap(), vec![entry.clone()]);

        catalog.delete(&entry.id).unwrap();
        assert!(catalog.list().unwrap().is_empty());
        assert!(catalog.load(&entry.id).is_err());
    }

    #[test]
    fn test_record_keeps_best_scores() {
        let dir = TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(dir.path());
        let entry = catalog.save(FLATTEN, "flat", &[]).unwrap();

        catalog.record_evaluation(&entry.id, 0.8, 0.6).unwrap();
        catalog.record_evaluation(&entry.id, 0.5, 0.4).unwrap();
        let updated = catalog.record_evaluation(&entry.id, 0.9, 0.7).unwrap();

        assert_eq!(updated.best_loss, Some(0.5));
        assert_eq!(updated.best_accuracy, Some(0.7));
        assert_eq!(catalog.list().unwrap()[0].best_loss, Some(0.5));
    }

    #[test]
    fn test_corrupt_index_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(META_FILE), "{ not a list").unwrap();
        let catalog = DirectoryCatalog::new(dir.path());
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_must_be_uuids() {
        let dir = TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(dir.path());
        assert!(matches!(catalog.load("../meta"), Err(GenomeError::Catalog(_))));
        assert!(catalog.record_evaluation(&Uuid::new_v4().to_string(), 1.0, 0.0).is_err());
    }
}
