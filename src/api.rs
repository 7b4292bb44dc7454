// Consumer-facing entry points
// Thin wrappers that turn user input into an `ImageInput` and run the pipeline.

use crate::models::AnalysisResult;
use crate::services::detection::{AnalysisError, Analyzer};
use crate::services::history::HistoryLog;
use crate::services::image_input::ImageInput;
use std::path::Path;

pub async fn analyze_image_file(analyzer: &Analyzer, path: &Path) -> Result<AnalysisResult, AnalysisError> {
    let image = ImageInput::from_path(path)?;
    Ok(analyzer.analyze(&image).await)
}

pub async fn analyze_image_bytes(analyzer: &Analyzer, bytes: Vec<u8>, file_name: &str) -> AnalysisResult {
    let image = ImageInput::from_bytes(bytes, file_name);
    analyzer.analyze(&image).await
}

/// Accepts the `data:<mime>;base64,...` form produced by browser file readers.
pub async fn analyze_data_url(
    analyzer: &Analyzer,
    data_url: &str,
    file_name: &str,
) -> Result<AnalysisResult, AnalysisError> {
    let image = ImageInput::from_data_url(data_url, file_name)?;
    Ok(analyzer.analyze(&image).await)
}

/// Analyze and append the result to a caller-owned history log as the final step.
pub async fn analyze_and_record(
    analyzer: &Analyzer,
    image: &ImageInput,
    history: &mut HistoryLog,
) -> AnalysisResult {
    let result = analyzer.analyze(image).await;
    history.append(result.clone(), image);
    result
}
