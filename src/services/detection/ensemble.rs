// Ensemble Synthesizer
// Merges the specialist probability with the reasoning model's judgment into the final result.
// Only an uncertain reasoning verdict can be overridden, and only toward AI-Generated.

use crate::models::{
    AnalysisResult, LocalMetrics, ModelUsed, ReasoningJudgment, SpecialistScore, Verdict,
};
use crate::services::config_store::DetectionConfig;
use chrono::Utc;
use tracing::{info, warn};

use super::reasoning::ReasoningError;

const CONNECTION_ERROR_ARTIFACT: &str = "Connection Error";
const CONNECTION_ERROR_REASONING: &str = "Failed to connect to forensic engines.";
/// Upper bound on aiProbability for a Human-Made verdict.
const HUMAN_PROBABILITY_CAP: f64 = 50.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OverridePolicy {
    /// Specialist probability (0-1) that must be exceeded.
    pub threshold: f64,
    /// Minimum aiProbability (0-100) after an override.
    pub probability_floor: f64,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self {
            threshold: 0.98,
            probability_floor: 95.0,
        }
    }
}

impl From<&DetectionConfig> for OverridePolicy {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            threshold: config.override_threshold,
            probability_floor: config.override_probability_floor,
        }
    }
}

#[inline]
fn clamp_percent(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Whether the specialist is sure enough to overrule an undecided reasoning model.
pub fn should_override(policy: &OverridePolicy, specialist: &SpecialistScore, verdict: Verdict) -> bool {
    match specialist.probability() {
        Some(p) => p > policy.threshold && verdict == Verdict::Uncertain,
        None => false,
    }
}

/// Combine a successful reasoning judgment with the specialist score.
pub fn synthesize(
    policy: &OverridePolicy,
    specialist: SpecialistScore,
    judgment: ReasoningJudgment,
    local_analysis: Option<LocalMetrics>,
) -> AnalysisResult {
    let mut verdict = Verdict::from_label(&judgment.verdict);
    let confidence = clamp_percent(judgment.confidence);
    let mut ai_probability = clamp_percent(judgment.ai_probability);
    let mut reasoning = judgment.reasoning;

    if should_override(policy, &specialist, verdict) {
        let p = specialist.probability().unwrap_or_default();
        info!(
            "[ENSEMBLE] override: specialist={:.3} reasoning verdict={} -> {}",
            p,
            verdict,
            Verdict::AiGenerated
        );
        verdict = Verdict::AiGenerated;
        ai_probability = ai_probability.max(policy.probability_floor).min(100.0);
        reasoning = format!(
            "External specialist model detected distinct AI signatures ({:.1}%). {}",
            p * 100.0,
            reasoning
        );
    }

    if verdict == Verdict::HumanMade && ai_probability > HUMAN_PROBABILITY_CAP {
        warn!(
            "[ENSEMBLE] Human-Made verdict with aiProbability={} capped to {}",
            ai_probability, HUMAN_PROBABILITY_CAP
        );
        ai_probability = HUMAN_PROBABILITY_CAP;
    }

    let model_used = if specialist.is_available() {
        ModelUsed::Ensemble
    } else {
        ModelUsed::ReasoningOnly
    };

    AnalysisResult {
        verdict,
        confidence,
        ai_probability,
        visual_artifacts: judgment.visual_artifacts,
        reasoning,
        metrics: judgment.metrics,
        local_analysis,
        specialist_score: specialist,
        model_used,
        timestamp: Utc::now(),
    }
}

/// Terminal result for a reasoning failure. Distinguished downstream by `ModelUsed::Error`.
pub fn error_fallback(
    error: &ReasoningError,
    specialist: SpecialistScore,
    local_analysis: Option<LocalMetrics>,
) -> AnalysisResult {
    warn!("[ENSEMBLE] analysis failed, returning error result: {}", error);
    AnalysisResult {
        verdict: Verdict::Uncertain,
        confidence: 0.0,
        ai_probability: 0.0,
        visual_artifacts: vec![CONNECTION_ERROR_ARTIFACT.to_string()],
        reasoning: CONNECTION_ERROR_REASONING.to_string(),
        metrics: Vec::new(),
        local_analysis,
        specialist_score: specialist,
        model_used: ModelUsed::Error,
        timestamp: Utc::now(),
    }
}

/// Entry point for the pipeline: success and failure both yield a result.
pub fn finalize(
    policy: &OverridePolicy,
    specialist: SpecialistScore,
    judgment: Result<ReasoningJudgment, ReasoningError>,
    local_analysis: Option<LocalMetrics>,
) -> AnalysisResult {
    match judgment {
        Ok(j) => synthesize(policy, specialist, j, local_analysis),
        Err(e) => error_fallback(&e, specialist, local_analysis),
    }
}
