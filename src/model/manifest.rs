use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    pub task: String,
    pub model: String,
    pub size: String,
    pub repo_id: String,
    pub model_path: PathBuf,
    pub fetched_at: String,
}

impl InstalledModel {
    pub fn key(&self) -> String {
        manifest_key(&self.task, &self.model, &self.size)
    }
}

/// Models fetched into the local cache, persisted as TOML.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    models: BTreeMap<String, InstalledModel>,
}

fn manifest_key(task: &str, model: &str, size: &str) -> String {
    format!("{}/{}/{}", task, model, size)
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let manifest: Manifest = toml::from_str(&content)?;
        Ok(manifest)
    }

    /// Writes to a sibling temp file and renames it over `path`, so readers
    /// never see a partially written manifest.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn add(&mut self, model: InstalledModel) {
        self.models.insert(model.key(), model);
    }

    pub fn get(&self, task: &str, model: &str, size: &str) -> Result<&InstalledModel> {
        let key = manifest_key(task, model, size);
        self.models
            .get(&key)
            .ok_or(Error::NotCached {
                task: task.to_string(),
                model: model.to_string(),
                size: size.to_string(),
            })
    }

    pub fn list(&self) -> Vec<&InstalledModel> {
        self.models.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(model: &str, fetched_at: &str) -> InstalledModel {
        InstalledModel {
            task: "relevancy".to_string(),
            model: model.to_string(),
            size: "base".to_string(),
            repo_id: format!("ns/relevancy-{}-base", model),
            model_path: PathBuf::from("/tmp/snapshots").join(model),
            fetched_at: fetched_at.to_string(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("models.toml")).unwrap();
        assert!(manifest.list().is_empty());
    }

    #[test]
    fn save_and_reload_keeps_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.toml");

        let mut manifest = Manifest::default();
        manifest.add(entry("xlnet", "2024-01-01T00:00:00+00:00"));
        manifest.add(entry("bert", "2024-01-02T00:00:00+00:00"));
        manifest.save(&path).unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        let models: Vec<&str> = reloaded.list().iter().map(|m| m.model.as_str()).collect();
        assert_eq!(models, vec!["bert", "xlnet"]);
        assert_eq!(
            reloaded.get("relevancy", "xlnet", "base").unwrap(),
            &entry("xlnet", "2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.toml");
        fs::write(&path, "models = [[[").unwrap();

        let mut manifest = Manifest::default();
        manifest.add(entry("bert", "2024-01-01T00:00:00+00:00"));
        manifest.save(&path).unwrap();

        assert!(!dir.path().join("models.toml.tmp").exists());
        assert_eq!(Manifest::load(&path).unwrap().list().len(), 1);
    }

    #[test]
    fn add_replaces_previous_fetch() {
        let mut manifest = Manifest::default();
        manifest.add(entry("bert", "2024-01-01T00:00:00+00:00"));
        manifest.add(entry("bert", "2024-03-01T00:00:00+00:00"));

        assert_eq!(manifest.list().len(), 1);
        assert_eq!(
            manifest.get("relevancy", "bert", "base").unwrap().fetched_at,
            "2024-03-01T00:00:00+00:00"
        );
    }

    #[test]
    fn get_unknown_entry_is_not_cached() {
        let manifest = Manifest::default();
        let err = manifest.get("relevancy", "bert", "small").unwrap_err();
        assert!(matches!(err, Error::NotCached { .. }));
    }
}
