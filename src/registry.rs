//! Static table of the architectures and sizes a relevancy classifier can be
//! resolved for.

use crate::error::{Error, Result};
use serde::Serialize;

pub const TASK: &str = "relevancy";
pub const LABELS: &[&str] = &["negative", "positive"];

pub const MODELS: &[&str] = &["bert", "xlnet"];
pub const SIZES: &[&str] = &["base", "small"];

pub const DEFAULT_MODEL: &str = "xlnet";
pub const DEFAULT_SIZE: &str = "base";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Availability {
    pub model: &'static [&'static str],
    pub size: &'static [&'static str],
}

static AVAILABILITY: Availability = Availability {
    model: MODELS,
    size: SIZES,
};

/// List the transformer architectures and sizes available for relevancy
/// classification.
pub fn available_transformer_model() -> &'static Availability {
    &AVAILABILITY
}

/// Expects an already lowercased name.
pub fn check_model(model: &str) -> Result<()> {
    if MODELS.contains(&model) {
        Ok(())
    } else {
        Err(Error::UnsupportedModel(model.to_string()))
    }
}

/// Expects an already lowercased name.
pub fn check_size(size: &str) -> Result<()> {
    if SIZES.contains(&size) {
        Ok(())
    } else {
        Err(Error::UnsupportedSize(size.to_string()))
    }
}
