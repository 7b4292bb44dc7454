// Image Input
// Loads uploaded images and resolves their declared media type

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ImageInputError {
    #[error("Failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Image payload is empty")]
    Empty,
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// An uploaded image: raw bytes plus the media type sent to the reasoning model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub file_name: String,
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^data:([^;,]+);base64,(.+)$").expect("valid data URL pattern"))
}

impl ImageInput {
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let media_type = sniff_media_type(&bytes);
        Self {
            bytes,
            media_type,
            file_name: file_name.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageInputError> {
        let bytes = std::fs::read(path).map_err(|source| ImageInputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(ImageInputError::Empty);
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(bytes, file_name))
    }

    /// Accepts `data:<mime>;base64,<payload>`, a bare `<prefix>,<payload>`, or a bare payload.
    /// The declared media type wins over sniffing when present.
    pub fn from_data_url(url: &str, file_name: impl Into<String>) -> Result<Self, ImageInputError> {
        let url = url.trim();
        let (declared, payload) = match data_url_regex().captures(url) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().to_string()),
                caps.get(2).map_or("", |m| m.as_str()),
            ),
            None => match url.split_once(',') {
                Some((_, rest)) => (None, rest),
                None => (None, url),
            },
        };

        let bytes = BASE64.decode(payload.trim())?;
        if bytes.is_empty() {
            return Err(ImageInputError::Empty);
        }
        let media_type = declared.unwrap_or_else(|| sniff_media_type(&bytes));
        Ok(Self {
            bytes,
            media_type,
            file_name: file_name.into(),
        })
    }

    pub fn base64_data(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Full-size data URL, used as the history thumbnail.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data())
    }
}

/// Media type guessed from the magic bytes, falling back to JPEG.
pub fn sniff_media_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string()
}
