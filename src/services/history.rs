// Scan History
// Caller-owned, newest-first log of completed analyses

use crate::models::{AnalysisResult, ScanHistoryItem, Verdict};
use crate::services::image_input::ImageInput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("History file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    Ai,
    Human,
}

impl HistoryFilter {
    pub fn from_str(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "ai" => Self::Ai,
            "human" => Self::Human,
            _ => Self::All,
        }
    }

    fn matches(&self, verdict: Verdict) -> bool {
        match self {
            Self::All => true,
            Self::Ai => verdict == Verdict::AiGenerated,
            Self::Human => verdict == Verdict::HumanMade,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    items: Vec<ScanHistoryItem>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished analysis. The id, thumbnail and file name are attached here,
    /// outside the analysis core.
    pub fn append(&mut self, result: AnalysisResult, image: &ImageInput) -> &ScanHistoryItem {
        let item = ScanHistoryItem {
            id: Uuid::new_v4().to_string(),
            thumbnail: image.data_url(),
            file_name: image.file_name.clone(),
            result,
        };
        self.items.insert(0, item);
        &self.items[0]
    }

    pub fn items(&self) -> &[ScanHistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items matching the verdict filter whose file name contains `query` (case-insensitive).
    pub fn search(&self, filter: HistoryFilter, query: &str) -> Vec<&ScanHistoryItem> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| filter.matches(item.result.verdict))
            .filter(|item| needle.is_empty() || item.file_name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a log written by `save`; a missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let log = Self::from_json(&content)?;
        info!("[HISTORY] Loaded {} entries from {}", log.len(), path.display());
        Ok(log)
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
