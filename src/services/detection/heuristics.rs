// Local Heuristics
// Cheap pixel statistics computed before any remote call

use crate::models::{Dimensions, LocalMetrics};
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

/// Output sizes commonly produced by image generators.
pub const STANDARD_AI_RESOLUTIONS: [u32; 6] = [512, 768, 1024, 1216, 1344, 1536];

/// Largest side of the centre sample patch.
const MAX_PATCH_SIZE: u32 = 100;

/// Below this the readout hints at synthetic smoothness.
pub const LOW_NOISE_VARIANCE: f64 = 100.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn is_standard_ai_resolution(width: u32, height: u32) -> bool {
    STANDARD_AI_RESOLUTIONS.contains(&width) || STANDARD_AI_RESOLUTIONS.contains(&height)
}

pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / BYTES_PER_MB)
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Population variance of luminance over the centred square patch.
pub fn center_patch_variance(img: &DynamicImage) -> f64 {
    let (width, height) = img.dimensions();
    let patch = MAX_PATCH_SIZE.min(width).min(height);
    if patch == 0 {
        return 0.0;
    }

    let x0 = width / 2 - patch / 2;
    let y0 = height / 2 - patch / 2;
    let mut sum = 0.0;
    let mut sq_sum = 0.0;
    let mut count = 0usize;
    for y in y0..y0 + patch {
        for x in x0..x0 + patch {
            let [r, g, b, _] = img.get_pixel(x, y).0;
            let lum = luminance(r, g, b);
            sum += lum;
            sq_sum += lum * lum;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    let variance = round2(sq_sum / count as f64 - mean * mean);
    // Cancellation on flat patches can land just below zero; never report -0.
    if variance <= 0.0 {
        0.0
    } else {
        variance
    }
}

/// Compute metrics for a decoded image. Zero-area images get a neutral readout.
pub fn extract_metrics(img: &DynamicImage, file_size_bytes: u64) -> LocalMetrics {
    let (width, height) = img.dimensions();
    let dimensions = Dimensions { width, height };

    if dimensions.is_zero_area() {
        return LocalMetrics {
            dimensions,
            is_standard_ai_res: false,
            noise_variance: 0.0,
            file_size_bytes,
            file_size: format_file_size(file_size_bytes),
        };
    }

    let metrics = LocalMetrics {
        dimensions,
        is_standard_ai_res: is_standard_ai_resolution(width, height),
        noise_variance: center_patch_variance(img),
        file_size_bytes,
        file_size: format_file_size(file_size_bytes),
    };
    debug!(
        dimensions = %metrics.dimensions,
        standard_res = metrics.is_standard_ai_res,
        noise_variance = metrics.noise_variance,
        "heuristics.computed"
    );
    metrics
}

/// Decode and measure raw image bytes. Undecodable input yields `None`.
///
/// Decoders reject zero-area images, so those also come back as `None` here;
/// the neutral readout in `extract_metrics` only applies to already-decoded buffers.
pub fn analyze_bytes(bytes: &[u8]) -> Option<LocalMetrics> {
    match image::load_from_memory(bytes) {
        Ok(img) => Some(extract_metrics(&img, bytes.len() as u64)),
        Err(e) => {
            warn!("[HEURISTICS] Could not decode image ({} bytes): {}", bytes.len(), e);
            None
        }
    }
}
