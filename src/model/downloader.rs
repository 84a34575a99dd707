use crate::classifier::TransformerClassifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{InstalledModel, LoadRequest, Manifest, ModelLoader};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::Cache;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Loads classifiers from Hugging Face repositories laid out as one
/// `{namespace}/{task}-{model}-{size}` repo holding an exported graph and its
/// tokenizer.
pub struct HubLoader {
    manifest_path: PathBuf,
    manifest_lock: Mutex<()>,
}

impl HubLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            manifest_path: config.manifest_path.clone(),
            manifest_lock: Mutex::new(()),
        }
    }

    /// Bookkeeping only: a manifest that cannot be read is rebuilt, and one
    /// that cannot be written is logged, without failing the load.
    fn record(&self, installed: InstalledModel) {
        let _guard = self
            .manifest_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut manifest = Manifest::load(&self.manifest_path).unwrap_or_else(|e| {
            tracing::warn!("Rebuilding unreadable manifest {:?}: {}", self.manifest_path, e);
            Manifest::default()
        });
        manifest.add(installed);

        if let Err(e) = manifest.save(&self.manifest_path) {
            tracing::warn!("Could not update manifest {:?}: {}", self.manifest_path, e);
        }
    }

    fn fetch(&self, request: &LoadRequest<'_>) -> Result<PathBuf> {
        let repo_id = repo_id(request);
        tracing::info!("Fetching {} from HuggingFace: {}", request.task, repo_id);

        let api = ApiBuilder::new()
            .with_cache_dir(request.local.to_path_buf())
            .with_progress(false)
            .build()
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;

        let repo = api.model(repo_id.clone());

        let model_file = repo
            .get(MODEL_FILE)
            .map_err(|e| Error::DownloadFailed(format!("Could not fetch {}: {}", MODEL_FILE, e)))?;

        repo.get(TOKENIZER_FILE).map_err(|e| {
            Error::DownloadFailed(format!("Could not fetch {}: {}", TOKENIZER_FILE, e))
        })?;

        let model_dir = artifact_dir(&model_file)?;

        self.record(InstalledModel {
            task: request.task.to_string(),
            model: request.model.to_string(),
            size: request.size.to_string(),
            repo_id,
            model_path: model_dir.clone(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        });

        Ok(model_dir)
    }

    fn cached(&self, request: &LoadRequest<'_>) -> Result<PathBuf> {
        let repo_id = repo_id(request);
        tracing::debug!("Looking up {} in local cache", repo_id);

        let not_cached = || Error::NotCached {
            task: request.task.to_string(),
            model: request.model.to_string(),
            size: request.size.to_string(),
        };

        let repo = Cache::new(request.local.to_path_buf()).model(repo_id);
        let model_file = repo.get(MODEL_FILE).ok_or_else(not_cached)?;
        repo.get(TOKENIZER_FILE).ok_or_else(not_cached)?;

        artifact_dir(&model_file)
    }
}

impl ModelLoader for HubLoader {
    type Handle = TransformerClassifier;

    fn load(&self, request: &LoadRequest<'_>) -> Result<TransformerClassifier> {
        let model_dir = if request.validate {
            self.fetch(request)?
        } else {
            self.cached(request)?
        };

        TransformerClassifier::load(&model_dir, request.model, request.size, request.labels)
    }
}

fn repo_id(request: &LoadRequest<'_>) -> String {
    format!(
        "{}/{}-{}-{}",
        request.remote, request.task, request.model, request.size
    )
}

fn artifact_dir(model_file: &Path) -> Result<PathBuf> {
    model_file
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::ModelLoadFailed("Invalid model path".to_string()))
}
