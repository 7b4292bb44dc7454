// Analysis Pipeline
// One-shot traversal per image:
// heuristics + specialist (concurrently) -> reasoning model -> ensemble synthesis

use crate::models::{AnalysisResult, AnalysisStage, LocalMetrics, SpecialistScore};
use crate::services::config_store::{AppConfig, ConfigError, ConfigStore, DetectionConfig};
use crate::services::image_input::{ImageInput, ImageInputError};
use crate::services::providers::{
    resolve_api_key, ProviderClient, ProviderError, PROVIDER_GEMINI, PROVIDER_HUGGING_FACE,
};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ensemble::{finalize, OverridePolicy};
use super::heuristics::analyze_bytes;
use super::reasoning::query_reasoning;
use super::specialist::query_specialist;

/// Errors that escape the core. Analysis itself never fails once an `Analyzer` exists.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Reasoning model API key is missing. Configure API_KEY or GEMINI_API_KEY.")]
    MissingReasoningKey,
    #[error(transparent)]
    Image(#[from] ImageInputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] ProviderError),
}

pub struct Analyzer {
    client: ProviderClient,
    detection: DetectionConfig,
    reasoning_key: String,
    specialist_key: Option<String>,
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

impl Analyzer {
    /// Fails before any network activity when the reasoning credential is absent.
    pub fn new(
        client: ProviderClient,
        detection: DetectionConfig,
        reasoning_key: Option<String>,
        specialist_key: Option<String>,
    ) -> Result<Self, AnalysisError> {
        let reasoning_key = non_blank(reasoning_key).ok_or(AnalysisError::MissingReasoningKey)?;
        Ok(Self {
            client,
            detection,
            reasoning_key,
            specialist_key: non_blank(specialist_key),
        })
    }

    /// Build from an explicit config. Keys come from the environment, then `config.api_keys`;
    /// no other config file is consulted.
    pub fn from_config(config: &AppConfig) -> Result<Self, AnalysisError> {
        let proxy = config.proxy.as_ref().and_then(|p| p.active_url());
        let base_url = |provider: &str| {
            config
                .providers
                .get(provider)
                .and_then(|p| p.base_url.as_deref())
        };
        let client = ProviderClient::configured(
            proxy,
            base_url(PROVIDER_GEMINI),
            base_url(PROVIDER_HUGGING_FACE),
        )?;

        let reasoning_key = resolve_api_key(PROVIDER_GEMINI, &config.api_keys);
        let specialist_key = resolve_api_key(PROVIDER_HUGGING_FACE, &config.api_keys);
        info!(
            "[PIPELINE] reasoning key: {}, specialist key: {}",
            reasoning_key.as_ref().map_or(0, |k| k.len()),
            specialist_key.as_ref().map_or(0, |k| k.len())
        );

        Self::new(client, config.detection.clone(), reasoning_key, specialist_key)
    }

    /// Build from the default config file (if any) and the environment.
    pub fn from_environment() -> Result<Self, AnalysisError> {
        let config = match ConfigStore::open_default() {
            Some(store) => store.load().unwrap_or_else(|e| {
                warn!("[PIPELINE] Ignoring unreadable config: {}", e);
                AppConfig::default()
            }),
            None => AppConfig::default(),
        };
        Self::from_config(&config)
    }

    /// Drop the specialist credential so every analysis runs on the reasoning model alone.
    pub fn without_specialist(mut self) -> Self {
        self.specialist_key = None;
        self
    }

    async fn local_heuristics(&self, image: &ImageInput) -> Option<LocalMetrics> {
        let bytes = image.bytes.clone();
        match tokio::task::spawn_blocking(move || analyze_bytes(&bytes)).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("[PIPELINE] heuristics task failed: {}", e);
                None
            }
        }
    }

    async fn specialist(&self, image: &ImageInput) -> SpecialistScore {
        query_specialist(
            &self.client,
            &self.detection.specialist_model,
            self.specialist_key.as_deref(),
            &image.bytes,
        )
        .await
    }

    /// Run one analysis. Always returns a result; reasoning failures surface as `ModelUsed::Error`.
    pub async fn analyze(&self, image: &ImageInput) -> AnalysisResult {
        let started = Instant::now();
        let mut stage = AnalysisStage::Pending;
        info!(
            "[PIPELINE] Starting analysis file={} media_type={} bytes={}",
            image.file_name,
            image.media_type,
            image.bytes.len()
        );

        // Neither depends on the other; the reasoning call needs both.
        let (local, specialist) = tokio::join!(self.local_heuristics(image), self.specialist(image));
        advance(&mut stage, AnalysisStage::HeuristicsComputed);
        advance(&mut stage, AnalysisStage::SpecialistQueried);

        let judgment = query_reasoning(
            &self.client,
            &self.detection.reasoning_model,
            &self.reasoning_key,
            image,
            local.as_ref(),
            &specialist,
        )
        .await;
        advance(&mut stage, AnalysisStage::ReasoningQueried);

        let policy = OverridePolicy::from(&self.detection);
        let result = finalize(&policy, specialist, judgment, local);
        let terminal = if result.is_error() {
            AnalysisStage::SynthesizedError
        } else {
            AnalysisStage::Synthesized
        };
        advance(&mut stage, terminal);

        info!(
            "[PIPELINE] Done file={} verdict={} confidence={} ai_probability={} model_used={} elapsed_ms={}",
            image.file_name,
            result.verdict,
            result.confidence,
            result.ai_probability,
            result.model_used,
            started.elapsed().as_millis()
        );
        result
    }
}

fn advance(stage: &mut AnalysisStage, next: AnalysisStage) {
    debug_assert!(!stage.is_terminal(), "analysis re-entered after {}", stage.as_str());
    debug!("[PIPELINE] stage {} -> {}", stage.as_str(), next.as_str());
    *stage = next;
}
