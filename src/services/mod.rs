// Veritas Core Services

pub mod config_store;
pub mod providers;
pub mod image_input;
pub mod history;
pub mod detection;

pub use config_store::*;
pub use providers::*;
pub use image_input::*;
pub use history::{HistoryError, HistoryFilter, HistoryLog};

pub use detection::{
    analyze_bytes,
    build_brief,
    extract_metrics,
    finalize,
    parse_judgment,
    query_reasoning,
    query_specialist,
    score_from_response,
    synthesize,
    AnalysisError,
    Analyzer,
    OverridePolicy,
    ReasoningError,
};
