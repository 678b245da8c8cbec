use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};

use crate::llm::media::detect_mime_type;

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("data URI must start with 'data:'")]
    MissingScheme,
    #[error("data URI has no ',' separating header and payload")]
    MissingPayload,
    #[error("data URI is not base64 encoded")]
    NotBase64,
    #[error("data URI declares no MIME type")]
    MissingMimeType,
    #[error("data URI payload is empty")]
    EmptyPayload,
    #[error("data URI payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A self-describing base64 image, e.g. `data:image/png;base64,iVBOR...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Wraps an already-encoded payload without re-validating it.
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], fallback_mime: &str) -> Self {
        let mime_type = detect_mime_type(bytes).unwrap_or_else(|| fallback_mime.to_string());
        Self {
            mime_type,
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn parse(value: &str) -> Result<Self, DataUriError> {
        let rest = value
            .trim()
            .strip_prefix(DATA_SCHEME)
            .ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
        let mime_type = header
            .strip_suffix(BASE64_MARKER)
            .ok_or(DataUriError::NotBase64)?
            .trim();
        // Parameters such as `;charset=` are dropped.
        let mime_type = mime_type.split(';').next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(DataUriError::MissingMimeType);
        }
        if payload.is_empty() {
            return Err(DataUriError::EmptyPayload);
        }
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|err| DataUriError::InvalidBase64(err.to_string()))?;

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            data: payload.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64 payload with the `data:...;base64,` prefix stripped.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|err| DataUriError::InvalidBase64(err.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DATA_SCHEME}{}{BASE64_MARKER},{}", self.mime_type, self.data)
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
