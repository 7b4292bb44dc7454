// Detection Module
// Image provenance detection organized into specialized submodules:
// - heuristics: local pixel statistics (resolution flag, centre-patch noise variance)
// - specialist: hosted binary classifier, normalized to a synthetic probability
// - reasoning: multimodal model brief, request and judgment validation
// - ensemble: verdict synthesis and the specialist override rule
// - pipeline: per-image orchestration of the stages above

pub mod heuristics;
pub mod specialist;
pub mod reasoning;
pub mod ensemble;
pub mod pipeline;

pub use heuristics::{analyze_bytes, extract_metrics, is_standard_ai_resolution, STANDARD_AI_RESOLUTIONS};
pub use specialist::{query_specialist, score_from_response};
pub use reasoning::{build_brief, parse_judgment, query_reasoning, response_schema, ReasoningError};
pub use ensemble::{error_fallback, finalize, should_override, synthesize, OverridePolicy};
pub use pipeline::{AnalysisError, Analyzer};
