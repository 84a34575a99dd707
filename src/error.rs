use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("{0}")]
	InvalidType(&'static str),
	#[error("model `{0}` not supported, please check supported models from relevancy::available_transformer_model()")]
	UnsupportedModel(String),
	#[error("size `{0}` not supported, please check supported sizes from relevancy::available_transformer_model()")]
	UnsupportedSize(String),
	#[error("{task}/{model}/{size} is not available locally, retry with validate enabled")]
	NotCached {
		task: String,
		model: String,
		size: String,
	},
	#[error("Download failed: {0}")]
	DownloadFailed(String),
	#[error("Failed to load model: {0}")]
	ModelLoadFailed(String),
	#[error("Classification error: {0}")]
	ClassificationError(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Configuration error: {0}")]
	ConfigError(String),
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	SerializationError(String),
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::ser::Error> for Error {
	fn from(err: toml::ser::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<candle_core::Error> for Error {
	fn from(err: candle_core::Error) -> Self {
		Error::ClassificationError(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
