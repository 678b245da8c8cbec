use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_image_model: String,
    pub gemini_safety_settings: String,
    pub http_timeout_seconds: u64,
    pub print_dpi: u32,
    pub print_sheet_width_mm: u32,
    pub print_sheet_height_mm: u32,
    pub print_gap_mm: u32,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

fn normalize_api_base(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let print_dpi = env_u32("PRINT_DPI", 300);
        if print_dpi == 0 {
            return Err(anyhow!("PRINT_DPI must be greater than zero"));
        }

        let gemini_api_base = normalize_api_base(env_string(
            "GEMINI_API_BASE",
            "https://generativelanguage.googleapis.com/v1beta",
        ));
        if gemini_api_base.is_empty() {
            return Err(anyhow!("GEMINI_API_BASE must not be empty"));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_api_base,
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 120),
            print_dpi,
            print_sheet_width_mm: env_u32("PRINT_SHEET_WIDTH_MM", 150),
            print_sheet_height_mm: env_u32("PRINT_SHEET_HEIGHT_MM", 100),
            print_gap_mm: env_u32("PRINT_GAP_MM", 3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_settings_accept_aliases() {
        assert_eq!(normalize_gemini_safety_settings("OFF".into()), "permissive");
        assert_eq!(normalize_gemini_safety_settings(" standard ".into()), "standard");
        assert_eq!(normalize_gemini_safety_settings("".into()), "permissive");
    }

    #[test]
    fn unknown_safety_profile_falls_back_to_permissive() {
        assert_eq!(normalize_gemini_safety_settings("strict".into()), "permissive");
    }

    #[test]
    fn api_base_drops_trailing_slash() {
        assert_eq!(
            normalize_api_base("https://example.test/v1beta/ ".into()),
            "https://example.test/v1beta"
        );
    }
}
