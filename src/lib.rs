//! Resolve pretrained transformer relevancy classifiers by architecture and
//! size, fetching their artifacts from Hugging Face when allowed.

pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod server;

pub use classifier::{Prediction, TransformerClassifier};
pub use config::{Config, TaskPaths};
pub use error::{Error, Result};
pub use model::{HubLoader, LoadRequest, ModelLoader};
pub use registry::available_transformer_model;
pub use resolver::{transformer, Request, Resolver};
