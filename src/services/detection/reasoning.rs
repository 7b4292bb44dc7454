// Reasoning Model Analyzer
// Sends the image plus heuristic and specialist context to a multimodal model
// and validates its structured judgment.

use crate::models::{LocalMetrics, ReasoningJudgment, SpecialistScore};
use crate::services::image_input::ImageInput;
use crate::services::providers::{ProviderClient, ProviderError, VisionRequest};
use thiserror::Error;
use tracing::{info, warn};

use super::heuristics::LOW_NOISE_VARIANCE;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("reasoning model call failed: {0}")]
    Call(#[from] ProviderError),
    #[error("malformed reasoning output: {0}")]
    Malformed(String),
}

const FORENSIC_TASK: &str = r#"TASK:
Analyze the image visually to independently corroborate or refute the external model's score.
If the external score is high (>90%), look for the subtle evidence that proves it (perfect symmetry, texture smoothing, logic errors).
If the external score is low (<10%), look for evidence of human imperfection (sensor noise, focus errors, organic asymmetry).

Inspect these artifact categories explicitly:
- Lighting consistency: shadow directions, specular highlights, "hyper-consistent" illumination.
- Anatomical plausibility: hands, teeth, ears, limb joints, eye reflections.
- Text rendering: signage, labels, lettering that degrades into glyph-like noise.
- Skin and texture smoothness: "digital sheen", plastic-like skin, over-denoised surfaces.

Modern generators are extremely realistic. Do NOT rely solely on "bad hands" or "weird text".

Provide 4 distinct forensic metrics (Texture, Lighting, Anatomy, Consistency) in the "metrics" array,
each with a value 0-100 indicating the degree of AI artifacts found (0=Natural, 100=Artificial).

Respond with a JSON object containing: verdict ("AI-Generated", "Human-Made" or "Uncertain"),
confidence (0-100, how sure you are of the verdict), aiProbability (0-100, how likely the image is synthetic),
visualArtifacts (list of short findings), reasoning (explanation) and metrics.
OUTPUT JSON only."#;

/// JSON schema requested from the model; every field is required.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "verdict": { "type": "STRING", "enum": ["AI-Generated", "Human-Made", "Uncertain"] },
            "confidence": { "type": "NUMBER", "description": "Final confidence 0-100" },
            "aiProbability": { "type": "NUMBER", "description": "Final probability 0-100" },
            "visualArtifacts": { "type": "ARRAY", "items": { "type": "STRING" } },
            "reasoning": { "type": "STRING" },
            "metrics": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "value": { "type": "NUMBER" }
                    },
                    "required": ["label", "value"]
                }
            }
        },
        "required": ["verdict", "confidence", "aiProbability", "visualArtifacts", "reasoning", "metrics"]
    })
}

/// Build the text brief that accompanies the image.
pub fn build_brief(local: Option<&LocalMetrics>, specialist: &SpecialistScore) -> String {
    let specialist_line = match specialist.probability() {
        Some(p) => format!(
            "EXTERNAL EXPERT AI MODEL SCORE: {:.1}% chance of being AI-Generated.",
            p * 100.0
        ),
        None => "EXTERNAL EXPERT MODEL: Unavailable (Network/Auth error).".to_string(),
    };

    let mut brief = String::from("You are a specialized image forensics engine.\n\nINPUT DATA:\n");
    brief.push_str(&specialist_line);
    brief.push('\n');

    if let Some(m) = local {
        brief.push_str("CLIENT-SIDE METRICS:\n");
        brief.push_str(&format!("- Dimensions: {}", m.dimensions));
        if m.is_standard_ai_res {
            brief.push_str(" (Matches common AI resolution)");
        }
        brief.push('\n');
        brief.push_str(&format!(
            "- Noise Variance: {} (Low < {} implies synthetic smoothness)\n",
            m.noise_variance, LOW_NOISE_VARIANCE
        ));
        brief.push_str(&format!("- File Size: {}\n", m.file_size));
    }

    brief.push('\n');
    brief.push_str(FORENSIC_TASK);
    brief
}

/// Extract JSON from response content
fn extract_json(content: &str) -> Result<&str, ReasoningError> {
    let start = content
        .find('{')
        .ok_or_else(|| ReasoningError::Malformed("no JSON object in response".to_string()))?;
    match content.rfind('}') {
        Some(end) if end > start => Ok(&content[start..=end]),
        _ => Err(ReasoningError::Malformed("unterminated JSON object".to_string())),
    }
}

/// Parse and validate the model's reply against the judgment schema.
pub fn parse_judgment(content: &str) -> Result<ReasoningJudgment, ReasoningError> {
    let json_str = extract_json(content.trim())?;
    let judgment: ReasoningJudgment = serde_json::from_str(json_str)
        .map_err(|e| ReasoningError::Malformed(format!("schema mismatch: {}", e)))?;

    if !judgment.confidence.is_finite() || !judgment.ai_probability.is_finite() {
        return Err(ReasoningError::Malformed(
            "confidence and aiProbability must be finite numbers".to_string(),
        ));
    }
    Ok(judgment)
}

/// One non-streaming, non-retried call. Failures are returned, never replaced by a default judgment.
pub async fn query_reasoning(
    client: &ProviderClient,
    model: &str,
    api_key: &str,
    image: &ImageInput,
    local: Option<&LocalMetrics>,
    specialist: &SpecialistScore,
) -> Result<ReasoningJudgment, ReasoningError> {
    let prompt = build_brief(local, specialist);
    let schema = response_schema();
    let image_base64 = image.base64_data();
    let request = VisionRequest {
        model,
        media_type: &image.media_type,
        image_base64: &image_base64,
        prompt: &prompt,
        response_schema: &schema,
    };

    let chat = client.call_gemini_vision(api_key, &request).await.map_err(|e| {
        warn!("[REASONING] model={} call failed: {}", model, e);
        ReasoningError::from(e)
    })?;

    match parse_judgment(&chat.content) {
        Ok(judgment) => {
            info!(
                "[REASONING] model={} verdict={} confidence={} ai_probability={} latency_ms={}",
                model, judgment.verdict, judgment.confidence, judgment.ai_probability, chat.latency_ms
            );
            Ok(judgment)
        }
        Err(e) => {
            warn!("[REASONING] model={} {}", model, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dimensions, UnavailableReason};

    fn metrics() -> LocalMetrics {
        LocalMetrics {
            dimensions: Dimensions { width: 1024, height: 1024 },
            is_standard_ai_res: true,
            noise_variance: 40.0,
            file_size_bytes: 2048,
            file_size: "0.00MB".to_string(),
        }
    }

    #[test]
    fn test_brief_with_all_context() {
        let brief = build_brief(Some(&metrics()), &SpecialistScore::Available { probability: 0.995 });
        assert!(brief.contains("99.5% chance of being AI-Generated"));
        assert!(brief.contains("1024x1024 (Matches common AI resolution)"));
        assert!(brief.contains("Noise Variance: 40"));
        for category in ["Lighting consistency", "Anatomical plausibility", "Text rendering", "Skin and texture smoothness"] {
            assert!(brief.contains(category), "missing {}", category);
        }
    }

    #[test]
    fn test_brief_without_context() {
        let brief = build_brief(
            None,
            &SpecialistScore::Unavailable {
                reason: UnavailableReason::NoCredential,
            },
        );
        assert!(brief.contains("EXTERNAL EXPERT MODEL: Unavailable"));
        assert!(!brief.contains("CLIENT-SIDE METRICS"));
    }

    #[test]
    fn test_schema_requires_every_field() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(
            required,
            vec!["verdict", "confidence", "aiProbability", "visualArtifacts", "reasoning", "metrics"]
        );
    }

    #[test]
    fn test_parse_judgment_wrapped_in_prose() {
        let content = r#"Here you go:
        {"verdict": "Uncertain", "confidence": 55, "aiProbability": 60,
         "visualArtifacts": ["soft background"], "reasoning": "mixed signals",
         "metrics": [{"label": "Texture", "value": 70}]}
        done"#;
        let judgment = parse_judgment(content).unwrap();
        assert_eq!(judgment.verdict, "Uncertain");
        assert_eq!(judgment.ai_probability, 60.0);
        assert_eq!(judgment.metrics.len(), 1);
    }

    #[test]
    fn test_parse_judgment_followed_by_prose() {
        let content = r#"{"verdict": "Human-Made", "confidence": 82, "aiProbability": 9,
            "visualArtifacts": [], "reasoning": "natural sensor grain", "metrics": []}
        Hope this helps."#;
        let judgment = parse_judgment(content).unwrap();
        assert_eq!(judgment.verdict, "Human-Made");
        assert_eq!(judgment.confidence, 82.0);

        let fenced = "```json\n{\"verdict\": \"Uncertain\", \"confidence\": 50, \"aiProbability\": 50, \"visualArtifacts\": [], \"reasoning\": \"\", \"metrics\": []}\n```";
        assert_eq!(parse_judgment(fenced).unwrap().ai_probability, 50.0);
    }

    #[test]
    fn test_parse_judgment_rejects_missing_fields() {
        let err = parse_judgment(r#"{"verdict": "AI-Generated", "confidence": 90}"#).unwrap_err();
        assert!(matches!(err, ReasoningError::Malformed(_)));
    }

    #[test]
    fn test_parse_judgment_rejects_non_json() {
        assert!(matches!(
            parse_judgment("I cannot help with that."),
            Err(ReasoningError::Malformed(_))
        ));
        assert!(matches!(parse_judgment("} {"), Err(ReasoningError::Malformed(_))));
    }

    #[test]
    fn test_parse_judgment_rejects_wrong_types() {
        let content = r#"{"verdict": "Uncertain", "confidence": "high", "aiProbability": 60,
            "visualArtifacts": [], "reasoning": "", "metrics": []}"#;
        assert!(parse_judgment(content).is_err());
    }
}
