//! Maps a requested (architecture, size) pair to a ready classifier.
//!
//! Arguments are type-checked (for untyped JSON input), lowercased, checked
//! against the availability registry and only then handed to the injected
//! [`ModelLoader`]. Nothing is retried and no state survives a call.

use crate::classifier::TransformerClassifier;
use crate::config::{Config, TaskPaths};
use crate::error::{Error, Result};
use crate::model::{HubLoader, LoadRequest, ModelLoader};
use crate::registry::{self, DEFAULT_MODEL, DEFAULT_SIZE, LABELS, TASK};
use serde_json::Value;

/// A normalized, registry-checked request. Only constructible through
/// [`Request::new`], [`Request::from_values`] and [`Request::from_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    model: String,
    size: String,
    validate: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            size: DEFAULT_SIZE.to_string(),
            validate: true,
        }
    }
}

impl Request {
    pub fn new(model: &str, size: &str, validate: bool) -> Result<Self> {
        let model = model.to_lowercase();
        let size = size.to_lowercase();

        registry::check_model(&model)?;
        registry::check_size(&size)?;

        Ok(Self {
            model,
            size,
            validate,
        })
    }

    /// Type-checks all three values before any registry lookup.
    pub fn from_values(model: &Value, size: &Value, validate: &Value) -> Result<Self> {
        let model = model
            .as_str()
            .ok_or(Error::InvalidType("model must be a string"))?;
        let size = size
            .as_str()
            .ok_or(Error::InvalidType("size must be a string"))?;
        let validate = validate
            .as_bool()
            .ok_or(Error::InvalidType("validate must be a boolean"))?;

        Self::new(model, size, validate)
    }

    /// Reads `model`, `size` and `validate` from a JSON object. Absent fields
    /// take their defaults; present ones, `null` included, must have the
    /// right type.
    pub fn from_json(body: &Value) -> Result<Self> {
        let defaults = Self::default();
        let model = body
            .get("model")
            .cloned()
            .unwrap_or_else(|| Value::from(defaults.model));
        let size = body
            .get("size")
            .cloned()
            .unwrap_or_else(|| Value::from(defaults.size));
        let validate = body
            .get("validate")
            .cloned()
            .unwrap_or(Value::Bool(defaults.validate));

        Self::from_values(&model, &size, &validate)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn validate(&self) -> bool {
        self.validate
    }
}

pub struct Resolver<L> {
    loader: L,
    paths: TaskPaths,
}

impl<L: ModelLoader> Resolver<L> {
    pub fn new(loader: L, paths: TaskPaths) -> Self {
        Self { loader, paths }
    }

    pub fn resolve(&self, model: &str, size: &str, validate: bool) -> Result<L::Handle> {
        let request = Request::new(model, size, validate)?;
        self.resolve_request(&request)
    }

    pub fn resolve_value(&self, model: &Value, size: &Value, validate: &Value) -> Result<L::Handle> {
        let request = Request::from_values(model, size, validate)?;
        self.resolve_request(&request)
    }

    pub fn resolve_request(&self, request: &Request) -> Result<L::Handle> {
        registry::check_model(&request.model)?;
        registry::check_size(&request.size)?;

        tracing::info!(
            "Resolving {} classifier: model={} size={} validate={}",
            TASK,
            request.model,
            request.size,
            request.validate
        );

        self.loader.load(&LoadRequest {
            local: &self.paths.local,
            remote: &self.paths.remote,
            task: TASK,
            labels: LABELS,
            model: &request.model,
            size: &request.size,
            validate: request.validate,
        })
    }
}

impl Resolver<HubLoader> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(HubLoader::new(config), config.task_paths())
    }
}

/// Load a transformer relevancy classifier.
///
/// `model` is one of `bert` or `xlnet` and `size` one of `base` or `small`,
/// both case-insensitive. With `validate` set, missing artifacts are fetched;
/// otherwise only the local cache is used.
pub fn transformer(
    config: &Config,
    model: &str,
    size: &str,
    validate: bool,
) -> Result<TransformerClassifier> {
    Resolver::from_config(config).resolve(model, size, validate)
}
