use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Application configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// changes. Command-line flags override the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serialized classifier, loaded once at startup.
    pub model_path: PathBuf,
    /// Stylesheet injected verbatim into the page.
    pub stylesheet_path: PathBuf,
    pub address: SocketAddr,
    /// Reject uploads containing labels with no code instead of passing
    /// missing cells to the classifier.
    pub strict_labels: bool,
    /// Maximum accepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/stroke_forest.json"),
            stylesheet_path: PathBuf::from("assets/style.css"),
            address: SocketAddr::from(([127, 0, 0, 1], 8501)),
            strict_labels: false,
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_model_path(mut self, path: PathBuf) -> Self {
        self.model_path = path;
        self
    }

    pub fn with_stylesheet_path(mut self, path: PathBuf) -> Self {
        self.stylesheet_path = path;
        self
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    pub fn with_strict_labels(mut self, strict: bool) -> Self {
        self.strict_labels = strict;
        self
    }
}
