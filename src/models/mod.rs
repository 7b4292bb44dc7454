// Veritas Data Models
// Shapes exchanged between the detection stages and the result consumer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Verdict ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AI-Generated")]
    AiGenerated,
    #[serde(rename = "Human-Made")]
    HumanMade,
    #[serde(rename = "Uncertain")]
    Uncertain,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AiGenerated => "AI-Generated",
            Self::HumanMade => "Human-Made",
            Self::Uncertain => "Uncertain",
        }
    }

    /// Map a free-form model label onto a verdict. Anything unrecognised is `Uncertain`.
    pub fn from_label(val: &str) -> Self {
        let normalized: String = val
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "ai-generated" => Self::AiGenerated,
            "human-made" => Self::HumanMade,
            _ => Self::Uncertain,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============ Local Heuristics ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMetrics {
    pub dimensions: Dimensions,
    #[serde(rename = "isStandardAIRes")]
    pub is_standard_ai_res: bool,
    /// Luminance variance of the centre patch, rounded to 2 decimals.
    pub noise_variance: f64,
    pub file_size_bytes: u64,
    /// Human-readable size, e.g. `"1.25MB"`.
    pub file_size: String,
}

// ============ Specialist Signal ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NoCredential,
    Transport,
    Rejected,
    UnrecognizedSchema,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoCredential => "no credential configured",
            Self::Transport => "transport failure",
            Self::Rejected => "request rejected",
            Self::UnrecognizedSchema => "unrecognized label schema",
        };
        f.write_str(s)
    }
}

/// Probability in [0, 1] that the image is synthetic, as reported by the specialist classifier.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SpecialistScore {
    Available { probability: f64 },
    Unavailable { reason: UnavailableReason },
}

impl SpecialistScore {
    pub fn probability(&self) -> Option<f64> {
        match self {
            Self::Available { probability } => Some(*probability),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

// ============ Reasoning Model Output ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub label: String,
    pub value: f64,
}

/// Validated response of the reasoning model. Every field is required;
/// a response missing any of them does not deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningJudgment {
    pub verdict: String,
    pub confidence: f64,
    pub ai_probability: f64,
    pub visual_artifacts: Vec<String>,
    pub reasoning: String,
    pub metrics: Vec<MetricEntry>,
}

// ============ Analysis Result ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModelUsed {
    #[serde(rename = "Ensemble (Specialist + Reasoning)")]
    Ensemble,
    #[serde(rename = "Reasoning Only")]
    ReasoningOnly,
    #[serde(rename = "Error")]
    Error,
}

impl ModelUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ensemble => "Ensemble (Specialist + Reasoning)",
            Self::ReasoningOnly => "Reasoning Only",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ModelUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub verdict: Verdict,
    /// How sure the system is of its own verdict (0-100).
    pub confidence: f64,
    /// How likely the image is synthetic (0-100).
    pub ai_probability: f64,
    pub visual_artifacts: Vec<String>,
    pub reasoning: String,
    pub metrics: Vec<MetricEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_analysis: Option<LocalMetrics>,
    pub specialist_score: SpecialistScore,
    pub model_used: ModelUsed,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    /// True for the terminal fallback produced when the reasoning model could not be used.
    pub fn is_error(&self) -> bool {
        self.model_used == ModelUsed::Error
    }
}

// ============ History ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryItem {
    pub id: String,
    /// Data URL of the analysed image.
    pub thumbnail: String,
    pub file_name: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

// ============ Pipeline Stages ============

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AnalysisStage {
    Pending,
    HeuristicsComputed,
    SpecialistQueried,
    ReasoningQueried,
    Synthesized,
    SynthesizedError,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::HeuristicsComputed => "heuristics_computed",
            Self::SpecialistQueried => "specialist_queried",
            Self::ReasoningQueried => "reasoning_queried",
            Self::Synthesized => "synthesized",
            Self::SynthesizedError => "synthesized_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Synthesized | Self::SynthesizedError)
    }
}
