//! Collection configuration loaded from a YAML file.
//!
//! The config names the metadata fields to project from each run summary,
//! the metric set a run must carry to be reported, the metric-name patterns
//! excluded from normalization, and where the resulting CSV goes.

use crate::{Error, Result};

use serde::Deserialize;
use std::fs::File;
use std::path::Path;

fn default_chunk_size() -> usize {
    500
}

/// Chunked object-storage upload settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Target bucket.
    pub bucket: String,
    /// Key prefix under the bucket.
    pub folder: String,
    /// Rows per uploaded CSV chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Top-level collection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Run-summary fields projected into run metadata.
    pub metadata: Vec<String>,
    /// Metric names a run must have; runs missing any are dropped.
    pub metrics: Vec<String>,
    /// Regex patterns for metric names excluded from normalization.
    #[serde(default)]
    pub exclude_normalization: Vec<String>,
    /// Local CSV output path.
    pub output_file: String,
    /// Optional chunked upload to object storage.
    #[serde(default)]
    pub s3: Option<UploadConfig>,
}

impl CollectionConfig {
    /// Load and parse the YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Config(format!("cannot open config file {}: {}", path.display(), e))
        })?;
        let config: CollectionConfig = serde_yaml::from_reader(file)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Exclusion patterns joined into the comma-separated form the
    /// normalizer's pattern filter consumes.
    pub fn exclude_patterns(&self) -> String {
        self.exclude_normalization.join(",")
    }
}
