pub mod gemini;
pub mod media;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiClient;

/// One image-editing call: the source image, the instruction and a coarse
/// shape hint for the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEditRequest {
    pub mime_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
    pub instruction: String,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    fn provider(&self) -> &str;

    fn name(&self) -> &str;

    /// Returns the content parts of the model's answer in order. Transport,
    /// auth, quota and decoding failures are errors; an answer without any
    /// image is not.
    async fn generate(&self, request: &ImageEditRequest) -> Result<Vec<ResponsePart>>;
}
