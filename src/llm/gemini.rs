use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{ImageEditRequest, ImageModel, ResponsePart};
use crate::utils::http::get_http_client;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: String,
    data: String,
}

/// Client for the `generateContent` endpoint of an image-capable Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    api_base: String,
    model: String,
    safety_profile: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        safety_profile: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
            safety_profile: safety_profile.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.gemini_api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is required to generate photos");
        }
        Ok(Self::new(
            config.gemini_api_key.clone(),
            config.gemini_api_base.clone(),
            config.gemini_image_model.clone(),
            config.gemini_safety_settings.clone(),
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn call_gemini_api(&self, client: &Client, payload: &Value) -> Result<GeminiResponse> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(payload);
            debug!(target: "llm.gemini", model = %self.model, payload = %payload_summary);
        }

        let response = client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err,
                    err.is_timeout(),
                    err.is_connect()
                );
                anyhow!("Gemini request failed: {}", err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        let body = response
            .text()
            .await
            .context("Failed to read Gemini response body")?;
        let value = parse_gemini_response(&body)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = %self.model, response = %response_summary);
        }
        Ok(value)
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ImageEditRequest) -> Result<Vec<ResponsePart>> {
        let payload = build_payload(request, &self.safety_profile)?;
        let response = self.call_gemini_api(get_http_client(), &payload).await?;
        Ok(first_candidate_parts(response))
    }
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn build_image_config(aspect_ratio: &str) -> Option<Value> {
    let trimmed = aspect_ratio.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut map = Map::new();
    map.insert("aspectRatio".to_string(), json!(trimmed));
    Some(Value::Object(map))
}

fn normalize_gemini_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

fn gemini_supports_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

fn build_payload(request: &ImageEditRequest, safety_profile: &str) -> Result<Value> {
    let mime_type = normalize_gemini_mime_type(&request.mime_type);
    if !gemini_supports_image_mime(&mime_type) {
        bail!("Gemini does not accept {} images", request.mime_type);
    }

    let mut generation_config = json!({
        "responseModalities": ["TEXT", "IMAGE"]
    });
    if let Some(image_config) = build_image_config(&request.aspect_ratio) {
        if let Some(config_object) = generation_config.as_object_mut() {
            config_object.insert("imageConfig".to_string(), image_config);
        }
    }

    Ok(json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "inlineData": { "mimeType": mime_type, "data": request.data } },
                { "text": request.instruction },
            ],
        }],
        "generationConfig": generation_config,
        "safetySettings": build_safety_settings(safety_profile),
    }))
}

fn parse_gemini_response(body: &str) -> Result<GeminiResponse> {
    serde_json::from_str::<GeminiResponse>(body).map_err(|err| {
        anyhow!(
            "Malformed Gemini response: {} (body={})",
            err,
            truncate_for_log(body, 500)
        )
    })
}

fn first_candidate_parts(response: GeminiResponse) -> Vec<ResponsePart> {
    let Some(candidate) = response.candidates.unwrap_or_default().into_iter().next() else {
        warn!("Gemini returned no candidates");
        return Vec::new();
    };
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            warn!("Gemini candidate finished with reason {}", reason);
        }
    }

    candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match part {
            GeminiPart::Text { text } => Some(ResponsePart::Text(text)),
            GeminiPart::InlineData { inline_data } => Some(ResponsePart::InlineData {
                mime_type: inline_data.mime_type,
                data: inline_data.data,
            }),
            GeminiPart::Other(_) => None,
        })
        .collect()
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized_contents: Vec<Value> = contents
            .iter()
            .map(|content| {
                let role = content
                    .get("role")
                    .and_then(|value| value.as_str())
                    .unwrap_or("user");
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_gemini_parts(parts))
                    .unwrap_or_default();
                json!({ "role": role, "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    text_parts += 1;
                    if text_preview.is_none() && !text.trim().is_empty() {
                        text_preview = Some(truncate_for_log(text, 200));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") {
                        image_parts += 1;
                    }
                }
                GeminiPart::Other(_) => {}
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mime_type: &str) -> ImageEditRequest {
        ImageEditRequest {
            mime_type: mime_type.to_string(),
            data: "/9j/4AAQ".to_string(),
            instruction: "make an id photo".to_string(),
            aspect_ratio: "3:4".to_string(),
        }
    }

    #[test]
    fn payload_carries_image_then_instruction_and_hint() {
        let payload = build_payload(&request("image/JPG"), "permissive").expect("payload");

        assert_eq!(
            payload.pointer("/contents/0/parts/0/inlineData/mimeType"),
            Some(&json!("image/jpeg"))
        );
        assert_eq!(
            payload.pointer("/contents/0/parts/0/inlineData/data"),
            Some(&json!("/9j/4AAQ"))
        );
        assert_eq!(
            payload.pointer("/contents/0/parts/1/text"),
            Some(&json!("make an id photo"))
        );
        assert_eq!(
            payload.pointer("/generationConfig/imageConfig/aspectRatio"),
            Some(&json!("3:4"))
        );
        assert_eq!(
            payload.pointer("/generationConfig/responseModalities"),
            Some(&json!(["TEXT", "IMAGE"]))
        );
        assert_eq!(
            payload.pointer("/safetySettings/0/threshold"),
            Some(&json!("OFF"))
        );
    }

    #[test]
    fn standard_safety_profile_blocks_medium_and_above() {
        let payload = build_payload(&request("image/png"), "standard").expect("payload");
        assert_eq!(
            payload.pointer("/safetySettings/4/threshold"),
            Some(&json!("BLOCK_MEDIUM_AND_ABOVE"))
        );
    }

    #[test]
    fn rejects_mime_types_gemini_cannot_read() {
        let err = build_payload(&request("image/gif"), "permissive").expect_err("gif rejected");
        assert!(err.to_string().contains("image/gif"));
    }

    #[test]
    fn keeps_parts_of_the_first_candidate_in_order() {
        let body = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Here you go" },
                            { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } },
                            { "thought": true }
                        ]
                    },
                    "finishReason": "STOP"
                },
                {
                    "content": { "parts": [ { "inlineData": { "mimeType": "image/png", "data": "AAAA" } } ] }
                }
            ]
        }"#;
        let parts = first_candidate_parts(parse_gemini_response(body).expect("parses"));
        assert_eq!(
            parts,
            vec![
                ResponsePart::Text("Here you go".to_string()),
                ResponsePart::InlineData {
                    mime_type: "image/png".to_string(),
                    data: "iVBORw0KGgo=".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_candidates_yield_no_parts() {
        let blocked = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        assert!(first_candidate_parts(parse_gemini_response(blocked).expect("parses")).is_empty());

        let no_content = r#"{ "candidates": [ { "finishReason": "IMAGE_SAFETY" } ] }"#;
        assert!(first_candidate_parts(parse_gemini_response(no_content).expect("parses")).is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = parse_gemini_response("<html>bad gateway</html>").expect_err("not json");
        assert!(err.to_string().starts_with("Malformed Gemini response"));
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, _) =
            summarize_error_body(r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#);
        assert_eq!(message.as_deref(), Some("Resource has been exhausted"));

        let (message, summary) = summarize_error_body("  ");
        assert_eq!(message, None);
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn payload_summary_hides_inline_data() {
        let payload = build_payload(&request("image/png"), "permissive").expect("payload");
        let summary = summarize_gemini_payload(&payload);
        assert_eq!(
            summary.pointer("/contents/0/parts/0/inlineData/dataLen"),
            Some(&json!(8))
        );
        assert_eq!(summary.pointer("/safetySettingsCount"), Some(&json!(5)));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let client = GeminiClient::new("key", "https://example.test/v1beta", "img-model", "permissive");
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/img-model:generateContent"
        );
        assert_eq!(client.name(), "img-model");
    }
}
