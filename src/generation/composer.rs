use serde_json::json;
use tracing::{debug, error, info};

use crate::catalog::GenerationConfig;
use crate::generation::prompt::{build_instruction, AspectRatioHint};
use crate::llm::media::is_image_mime;
use crate::llm::{ImageEditRequest, ImageModel, ResponsePart};
use crate::utils::data_uri::DataUri;
use crate::utils::timing::log_llm_timing;

const DEFAULT_RESULT_MIME: &str = "image/png";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The model call itself failed; the source error is kept intact.
    #[error(transparent)]
    Model(#[from] anyhow::Error),
}

pub fn build_request(source: &DataUri, config: &GenerationConfig) -> ImageEditRequest {
    let size = config.size();
    ImageEditRequest {
        mime_type: source.mime_type().to_string(),
        data: source.data().to_string(),
        instruction: build_instruction(config, size),
        aspect_ratio: AspectRatioHint::for_size(size).as_str().to_string(),
    }
}

/// Picks the first part that carries image data. Parts with an empty MIME
/// type are treated as PNG.
pub fn first_image_part(parts: Vec<ResponsePart>) -> Option<DataUri> {
    parts.into_iter().find_map(|part| match part {
        ResponsePart::InlineData { mime_type, data } if !data.trim().is_empty() => {
            let mime_type = mime_type.trim();
            if mime_type.is_empty() {
                Some(DataUri::from_base64(DEFAULT_RESULT_MIME, data))
            } else if is_image_mime(mime_type) {
                Some(DataUri::from_base64(mime_type.to_ascii_lowercase(), data))
            } else {
                debug!("Skipping non-image inline part ({})", mime_type);
                None
            }
        }
        _ => None,
    })
}

/// Sends one edit request for `source` and returns the first image in the
/// answer. `Ok(None)` means the model answered without an image.
pub async fn generate_id_photo<M>(
    model: &M,
    source: &DataUri,
    config: &GenerationConfig,
) -> Result<Option<DataUri>, GenerationError>
where
    M: ImageModel + ?Sized,
{
    let request = build_request(source, config);
    let metadata = json!({
        "size": config.size().id,
        "aspectRatio": request.aspect_ratio,
        "background": config.bg_color.id(),
        "clothing": config.clothing.id(),
        "faceRatio": config.face_ratio,
        "sourceMime": request.mime_type,
    });

    let parts = log_llm_timing(model.provider(), model.name(), "generate_id_photo", Some(metadata), || {
        model.generate(&request)
    })
    .await
    .map_err(|err| {
        error!("Error generating ID photo: {err:#}");
        GenerationError::Model(err)
    })?;

    let part_count = parts.len();
    let text_preview = parts.iter().find_map(|part| match part {
        ResponsePart::Text(text) if !text.trim().is_empty() => {
            Some(text.chars().take(200).collect::<String>())
        }
        _ => None,
    });
    let result = first_image_part(parts);
    match &result {
        Some(image) => info!(
            "Model {} returned an image ({}, {} base64 chars)",
            model.name(),
            image.mime_type(),
            image.data().len()
        ),
        None => info!(
            "Model {} returned {} part(s) and no image; text={:?}",
            model.name(),
            part_count,
            text_preview
        ),
    }
    Ok(result)
}
