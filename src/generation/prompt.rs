use std::fmt;

use crate::catalog::{GenerationConfig, PhotoSize};

/// Shape selector accepted by the image API. Only three buckets exist, so
/// 3:4, 3.5:4.5 and 4:6 all map to `Portrait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatioHint {
    Square,
    Portrait,
    Landscape,
}

impl AspectRatioHint {
    pub fn for_size(size: &PhotoSize) -> Self {
        if size.width == size.height {
            Self::Square
        } else if size.width < size.height {
            Self::Portrait
        } else {
            Self::Landscape
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "3:4",
            Self::Landscape => "4:3",
        }
    }
}

impl fmt::Display for AspectRatioHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn clothing_line(config: &GenerationConfig) -> String {
    if config.clothing.keeps_current() {
        format!(
            "Keep the subject's {} exactly as it is. Do not change the attire.",
            config.clothing.description()
        )
    } else {
        format!(
            "Change the attire to a {}. It must fit the subject's neck and shoulders naturally.",
            config.clothing.description()
        )
    }
}

pub fn build_instruction(config: &GenerationConfig, size: &PhotoSize) -> String {
    let mut sections = Vec::with_capacity(5);

    sections.push(
        "1. FACIAL IDENTITY (NON-NEGOTIABLE):\n\
         - The subject's face MUST remain 100% IDENTICAL to the source photo.\n\
         - DO NOT morph, slim, reshape, beautify, or \"enhance\" the facial features.\n\
         - The person must be immediately recognizable as the exact same person from the input."
            .to_string(),
    );

    sections.push(
        "2. SKIN TEXTURE AND REALISM (STRICT):\n\
         - DO NOT SMOOTH THE SKIN. NO airbrushing, blurring, or beauty filters.\n\
         - MAINTAIN NATURAL TEXTURE: pores, fine lines, natural shadows, and skin character must stay visible and sharp.\n\
         - EXCEPTION: only remove temporary, minor blemishes such as active acne or pimples."
            .to_string(),
    );

    sections.push(format!(
        "3. BACKGROUND AND CLOTHING:\n\
         - Replace the background with a completely SOLID {} color.\n\
         - {}",
        config.bg_color.id(),
        clothing_line(config)
    ));

    sections.push(format!(
        "4. COMPOSITION AND CROP (STRICT RATIO):\n\
         - Target Aspect Ratio: {}.\n\
         - FACE RATIO: The face (measured from the tip of the chin to the top of the head/crown) MUST occupy exactly {}% of the TOTAL VERTICAL HEIGHT of the resulting image.\n\
         - POSITIONING: Center the head horizontally. Leave a balanced margin (headroom) between the top of the hair and the top edge of the photo.\n\
         - The subject looks directly at the camera with a neutral expression.",
        size.ratio_label(),
        config.face_ratio
    ));

    sections.push(
        "5. QUALITY:\n\
         - Output must be ultra-sharp, professional studio quality."
            .to_string(),
    );

    format!(
        "CRITICAL INSTRUCTION: Transform the subject into a professional ID photo with strict adherence to composition and realism.\n\n{}",
        sections.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{resolve_size, BackgroundColor, ClothingOption, PHOTO_SIZES};

    fn config(bg: BackgroundColor, clothing: ClothingOption, size: &str, ratio: u32) -> GenerationConfig {
        GenerationConfig {
            bg_color: bg,
            clothing,
            target_size_id: size.to_string(),
            face_ratio: ratio,
        }
    }

    #[test]
    fn hint_buckets_follow_width_and_height() {
        let square = PhotoSize {
            id: "sq",
            label: "square",
            width: 5.0,
            height: 5.0,
            mm_width: 50,
            mm_height: 50,
        };
        let landscape = PhotoSize {
            width: 6.0,
            height: 4.0,
            ..square
        };
        assert_eq!(AspectRatioHint::for_size(&square).as_str(), "1:1");
        assert_eq!(AspectRatioHint::for_size(&landscape).as_str(), "4:3");
        for size in &PHOTO_SIZES {
            assert_eq!(AspectRatioHint::for_size(size), AspectRatioHint::Portrait);
        }
    }

    #[test]
    fn instruction_embeds_background_ratio_and_suit() {
        let config = config(BackgroundColor::Blue, ClothingOption::MaleSuit, "4x6", 80);
        let size = resolve_size(&config.target_size_id);
        let text = build_instruction(&config, size);

        assert_eq!((size.width, size.height), (4.0, 6.0));
        assert_eq!(AspectRatioHint::for_size(size).as_str(), "3:4");
        assert!(text.contains("SOLID blue color"));
        assert!(text.contains("80%"));
        assert!(text.contains("formal black suit with a white shirt and a professional tie"));
        assert!(text.contains("Target Aspect Ratio: 4:6."));
    }

    #[test]
    fn every_clothing_phrase_appears_verbatim() {
        for clothing in ClothingOption::ALL {
            let config = config(BackgroundColor::White, clothing, "3x4", 70);
            let text = build_instruction(&config, config.size());
            assert!(text.contains(clothing.description()), "{}", clothing.id());
        }
    }

    #[test]
    fn no_change_clothing_asks_to_keep_attire() {
        let config = config(BackgroundColor::Gray, ClothingOption::None, "3x4", 60);
        let text = build_instruction(&config, config.size());
        assert!(text.contains("Keep the subject's current clothing exactly as it is"));
        assert!(!text.contains("Change the attire"));
    }

    #[test]
    fn instruction_keeps_identity_and_texture_constraints() {
        let config = GenerationConfig::default();
        let text = build_instruction(&config, config.size());
        assert!(text.contains("100% IDENTICAL"));
        assert!(text.contains("DO NOT SMOOTH THE SKIN"));
        assert!(text.contains("acne or pimples"));
        assert!(text.contains("headroom"));
        assert!(text.contains("studio quality"));
    }

    #[test]
    fn instruction_is_deterministic() {
        let config = config(BackgroundColor::White, ClothingOption::FemaleShirt, "35x45", 75);
        let size = config.size();
        assert_eq!(build_instruction(&config, size), build_instruction(&config, size));
        assert!(build_instruction(&config, size).contains("3.5:4.5"));
    }
}
