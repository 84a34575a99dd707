pub mod downloader;
pub mod manifest;

pub use downloader::HubLoader;
pub use manifest::{InstalledModel, Manifest};

use crate::error::Result;
use std::path::Path;

/// Everything a loader needs to construct one classifier. `model` and `size`
/// are already normalized and known to be supported.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub local: &'a Path,
    pub remote: &'a str,
    pub task: &'a str,
    pub labels: &'a [&'a str],
    pub model: &'a str,
    pub size: &'a str,
    pub validate: bool,
}

/// Constructs classifiers, fetching or caching their artifacts as needed.
///
/// The handle is opaque to callers of the resolver; errors returned here reach
/// them unchanged.
pub trait ModelLoader {
    type Handle;

    fn load(&self, request: &LoadRequest<'_>) -> Result<Self::Handle>;
}
