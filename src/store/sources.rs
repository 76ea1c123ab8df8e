use std::path::PathBuf;

use crate::config::BehaviorSettings;
use crate::error::{BrokerError, BrokerResult};
use crate::model::BehaviorConfig;
use crate::seed;
use crate::store::traits::BehaviorSource;

/// Behaviors compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource;

impl BehaviorSource for EmbeddedSource {
    fn load(&self) -> BrokerResult<BehaviorConfig> {
        seed::default_behaviors().map_err(|e| BrokerError::Source {
            source_name: self.describe(),
            message: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        "embedded defaults".to_string()
    }
}

/// Behaviors read from a JSON document on disk, re-read on every load.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BehaviorSource for FileSource {
    fn load(&self) -> BrokerResult<BehaviorConfig> {
        let source_error = |message: String| BrokerError::Source {
            source_name: self.describe(),
            message,
        };
        let raw = std::fs::read_to_string(&self.path).map_err(|e| source_error(e.to_string()))?;
        BehaviorConfig::from_json(&raw).map_err(|e| source_error(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Behaviors supplied inline, typically through an environment variable.
#[derive(Debug, Clone)]
pub struct InlineSource {
    json: String,
}

impl InlineSource {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }
}

impl BehaviorSource for InlineSource {
    fn load(&self) -> BrokerResult<BehaviorConfig> {
        BehaviorConfig::from_json(&self.json).map_err(|e| BrokerError::Source {
            source_name: self.describe(),
            message: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        "inline configuration".to_string()
    }
}

/// Pick the behavior source: inline JSON, then file, then embedded defaults.
pub fn source_from_settings(settings: &BehaviorSettings) -> Box<dyn BehaviorSource> {
    if let Some(json) = settings.json.as_ref().filter(|json| !json.trim().is_empty()) {
        return Box::new(InlineSource::new(json.clone()));
    }
    if let Some(path) = settings.file.as_ref().filter(|path| !path.trim().is_empty()) {
        return Box::new(FileSource::new(path));
    }
    Box::new(EmbeddedSource)
}
