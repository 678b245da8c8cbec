pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/heic" | "image/heif" => "heic",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    #[test]
    fn sniffs_png_signature() {
        assert_eq!(detect_mime_type(&PNG_HEADER).as_deref(), Some("image/png"));
    }

    #[test]
    fn recognises_heic_brand() {
        let mut data = vec![0, 0, 0, 0x18];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0; 8]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/heic"));
    }

    #[test]
    fn unknown_bytes_have_no_mime() {
        assert_eq!(detect_mime_type(b"plain text"), None);
    }

    #[test]
    fn extension_defaults_to_png() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }
}
