// Specialist Classifier
// Queries a hosted binary AI-image detector and normalizes it to one probability

use crate::models::{SpecialistScore, UnavailableReason};
use crate::services::providers::{ProviderClient, ProviderError};
use serde::Deserialize;
use tracing::{info, warn};

const SYNTHETIC_LABELS: [&str; 2] = ["artificial", "synthetic"];
const HUMAN_LABELS: [&str; 2] = ["human", "natural"];

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

fn find_label<'a>(pairs: &'a [LabelScore], names: &[&str]) -> Option<&'a LabelScore> {
    pairs
        .iter()
        .find(|p| names.iter().any(|n| p.label.trim().eq_ignore_ascii_case(n)))
}

/// Map a classifier response body onto a synthetic probability.
///
/// A synthetic label's score is used directly; otherwise a human label's score is inverted.
/// Anything else, including scores outside [0, 1], is an unrecognized schema.
pub fn score_from_response(body: &serde_json::Value) -> SpecialistScore {
    let unrecognized = SpecialistScore::Unavailable {
        reason: UnavailableReason::UnrecognizedSchema,
    };

    let pairs: Vec<LabelScore> = match serde_json::from_value(body.clone()) {
        Ok(p) => p,
        Err(_) => return unrecognized,
    };

    let probability = if let Some(synthetic) = find_label(&pairs, &SYNTHETIC_LABELS) {
        synthetic.score
    } else if let Some(human) = find_label(&pairs, &HUMAN_LABELS) {
        1.0 - human.score
    } else {
        return unrecognized;
    };

    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return unrecognized;
    }
    SpecialistScore::Available { probability }
}

/// Single best-effort classification. Never fails: every problem degrades to `Unavailable`.
pub async fn query_specialist(
    client: &ProviderClient,
    model: &str,
    api_key: Option<&str>,
    image: &[u8],
) -> SpecialistScore {
    let api_key = match api_key {
        Some(k) if !k.trim().is_empty() => k,
        _ => {
            warn!("[SPECIALIST] API key missing, skipping external expert model");
            return SpecialistScore::Unavailable {
                reason: UnavailableReason::NoCredential,
            };
        }
    };

    match client.call_hugging_face(model, api_key, image.to_vec()).await {
        Ok((body, latency_ms)) => {
            let score = score_from_response(&body);
            match score {
                SpecialistScore::Available { probability } => info!(
                    "[SPECIALIST] model={} probability={:.3} latency_ms={}",
                    model, probability, latency_ms
                ),
                SpecialistScore::Unavailable { reason } => warn!(
                    "[SPECIALIST] model={} unusable response ({}) latency_ms={}",
                    model, reason, latency_ms
                ),
            }
            score
        }
        Err(ProviderError::ApiError { status, message }) => {
            warn!("[SPECIALIST] model={} rejected request: {} {}", model, status, message);
            SpecialistScore::Unavailable {
                reason: UnavailableReason::Rejected,
            }
        }
        Err(ProviderError::JsonError(e)) => {
            warn!("[SPECIALIST] model={} returned non-JSON body: {}", model, e);
            SpecialistScore::Unavailable {
                reason: UnavailableReason::UnrecognizedSchema,
            }
        }
        Err(e) => {
            warn!("[SPECIALIST] model={} call failed: {}", model, e);
            SpecialistScore::Unavailable {
                reason: UnavailableReason::Transport,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prob(body: serde_json::Value) -> Option<f64> {
        score_from_response(&body).probability()
    }

    #[test]
    fn test_artificial_label_used_directly() {
        assert_eq!(prob(json!([{"label": "artificial", "score": 0.7}])), Some(0.7));
    }

    #[test]
    fn test_human_label_inverted() {
        let p = prob(json!([{"label": "human", "score": 0.7}])).unwrap();
        assert!((p - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_label_unavailable() {
        assert_eq!(
            score_from_response(&json!([{"label": "unknown", "score": 0.7}])),
            SpecialistScore::Unavailable {
                reason: UnavailableReason::UnrecognizedSchema
            }
        );
    }

    #[test]
    fn test_synthetic_label_preferred_over_human() {
        let body = json!([
            {"label": "human", "score": 0.01},
            {"label": "Artificial", "score": 0.99}
        ]);
        assert_eq!(prob(body), Some(0.99));
    }

    #[test]
    fn test_malformed_shapes_unavailable() {
        assert_eq!(prob(json!({"error": "Model is loading"})), None);
        assert_eq!(prob(json!([])), None);
        assert_eq!(prob(json!([{"label": "artificial"}])), None);
        assert_eq!(prob(json!([{"label": "artificial", "score": 1.5}])), None);
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        // Unroutable endpoint: a network attempt would surface as Transport, not NoCredential.
        let client = ProviderClient::new().with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        let score = query_specialist(&client, "detector", None, b"bytes").await;
        assert_eq!(
            score,
            SpecialistScore::Unavailable {
                reason: UnavailableReason::NoCredential
            }
        );
        let blank = query_specialist(&client, "detector", Some("  "), b"bytes").await;
        assert!(!blank.is_available());
    }
}
