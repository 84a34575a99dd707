use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_REMOTE_NAMESPACE: &str = "huseinzol05";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub data_dir: PathBuf,
	pub models_dir: PathBuf,
	pub manifest_path: PathBuf,
	pub remote_namespace: String,
}

/// Where the artifacts of one task live: the local hf-hub cache root and the
/// Hugging Face namespace holding one repository per (model, size).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
	pub local: PathBuf,
	pub remote: String,
}

impl Config {
	pub fn new() -> crate::error::Result<Self> {
		let project_dirs = ProjectDirs::from("", "", "relevancy")
			.ok_or_else(|| crate::error::Error::ConfigError("Could not determine config directory".to_string()))?;

		Self::with_data_dir(project_dirs.data_dir())
	}

	pub fn from_env() -> crate::error::Result<Self> {
		let mut config = match std::env::var("RELEVANCY_DATA_DIR") {
			Ok(data_dir) => Self::with_data_dir(Path::new(&data_dir))?,
			Err(_) => Self::new()?,
		};

		if let Ok(namespace) = std::env::var("RELEVANCY_REMOTE_NAMESPACE") {
			if namespace.trim().is_empty() {
				return Err(crate::error::Error::ConfigError(
					"RELEVANCY_REMOTE_NAMESPACE is set but empty".to_string(),
				));
			}
			config.remote_namespace = namespace;
		}

		Ok(config)
	}

	pub fn with_data_dir(data_dir: &Path) -> crate::error::Result<Self> {
		let data_dir = data_dir.to_path_buf();
		let models_dir = data_dir.join("models");
		let manifest_path = data_dir.join("models.toml");

		std::fs::create_dir_all(&data_dir)?;
		std::fs::create_dir_all(&models_dir)?;

		Ok(Self {
			data_dir,
			models_dir,
			manifest_path,
			remote_namespace: DEFAULT_REMOTE_NAMESPACE.to_string(),
		})
	}

	pub fn task_paths(&self) -> TaskPaths {
		TaskPaths {
			local: self.models_dir.clone(),
			remote: self.remote_namespace.clone(),
		}
	}
}
