use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown background color '{0}' (expected one of: white, blue, gray)")]
    UnknownBackground(String),
    #[error("unknown clothing option '{0}' (expected one of: none, male-shirt, male-suit, female-shirt, female-suit)")]
    UnknownClothing(String),
    #[error("face ratio must be between 1 and 100, got {0}")]
    FaceRatioOutOfRange(u32),
}

/// A printable photo format. `width`/`height` are the nominal ratio, the
/// `mm_*` fields the physical print dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSize {
    pub id: &'static str,
    pub label: &'static str,
    pub width: f32,
    pub height: f32,
    pub mm_width: u32,
    pub mm_height: u32,
}

impl PhotoSize {
    pub fn ratio_label(&self) -> String {
        format!("{}:{}", self.width, self.height)
    }
}

pub static PHOTO_SIZES: [PhotoSize; 4] = [
    PhotoSize {
        id: "3x4",
        label: "3x4 cm",
        width: 3.0,
        height: 4.0,
        mm_width: 30,
        mm_height: 40,
    },
    PhotoSize {
        id: "4x6",
        label: "4x6 cm",
        width: 4.0,
        height: 6.0,
        mm_width: 40,
        mm_height: 60,
    },
    PhotoSize {
        id: "35x45",
        label: "3.5x4.5 cm",
        width: 3.5,
        height: 4.5,
        mm_width: 35,
        mm_height: 45,
    },
    PhotoSize {
        id: "passport",
        label: "Passport (4x6)",
        width: 4.0,
        height: 6.0,
        mm_width: 40,
        mm_height: 60,
    },
];

pub fn find_size(id: &str) -> Option<&'static PhotoSize> {
    PHOTO_SIZES.iter().find(|size| size.id == id)
}

/// Unknown ids resolve to the first catalog entry instead of failing.
pub fn resolve_size(id: &str) -> &'static PhotoSize {
    match find_size(id) {
        Some(size) => size,
        None => {
            debug!(
                "Unknown photo size '{}', falling back to '{}'",
                id, PHOTO_SIZES[0].id
            );
            &PHOTO_SIZES[0]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundColor {
    #[default]
    White,
    Blue,
    Gray,
}

impl BackgroundColor {
    pub const ALL: [BackgroundColor; 3] = [Self::White, Self::Blue, Self::Gray];

    pub fn id(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Blue => "blue",
            Self::Gray => "gray",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Blue => "Blue",
            Self::Gray => "Gray",
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::White => "#FFFFFF",
            Self::Blue => "#0055A4",
            Self::Gray => "#808080",
        }
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BackgroundColor {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|color| color.id() == lowered)
            .ok_or_else(|| CatalogError::UnknownBackground(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClothingOption {
    #[default]
    None,
    MaleShirt,
    MaleSuit,
    FemaleShirt,
    FemaleSuit,
}

impl ClothingOption {
    pub const ALL: [ClothingOption; 5] = [
        Self::None,
        Self::MaleShirt,
        Self::MaleSuit,
        Self::FemaleShirt,
        Self::FemaleSuit,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MaleShirt => "male-shirt",
            Self::MaleSuit => "male-suit",
            Self::FemaleShirt => "female-shirt",
            Self::FemaleSuit => "female-suit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "Keep current",
            Self::MaleShirt => "Male - white shirt",
            Self::MaleSuit => "Male - suit",
            Self::FemaleShirt => "Female - white shirt",
            Self::FemaleSuit => "Female - office blazer",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::None => "👤",
            Self::MaleShirt => "👔",
            Self::MaleSuit => "🤵",
            Self::FemaleShirt => "👚",
            Self::FemaleSuit => "🧥",
        }
    }

    /// English attire phrase embedded verbatim in the model instruction.
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "current clothing",
            Self::MaleShirt => "white professional dress shirt with a neat collar",
            Self::MaleSuit => "formal black suit with a white shirt and a professional tie",
            Self::FemaleShirt => "white professional blouse with a neat collar",
            Self::FemaleSuit => "professional black blazer with a white blouse underneath",
        }
    }

    pub fn keeps_current(self) -> bool {
        self == Self::None
    }
}

impl fmt::Display for ClothingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ClothingOption {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|option| option.id() == lowered)
            .ok_or_else(|| CatalogError::UnknownClothing(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRatioPreset {
    pub label: &'static str,
    pub percent: u32,
}

pub const FACE_RATIO_PRESETS: [FaceRatioPreset; 3] = [
    FaceRatioPreset {
        label: "Small",
        percent: 60,
    },
    FaceRatioPreset {
        label: "Medium",
        percent: 70,
    },
    FaceRatioPreset {
        label: "Large",
        percent: 80,
    },
];

const FACE_RATIO_TYPICAL_MIN: u32 = 50;
const FACE_RATIO_TYPICAL_MAX: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub bg_color: BackgroundColor,
    pub clothing: ClothingOption,
    pub target_size_id: String,
    /// Percent of the output height the face (chin to crown) should fill.
    pub face_ratio: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            bg_color: BackgroundColor::White,
            clothing: ClothingOption::None,
            target_size_id: PHOTO_SIZES[0].id.to_string(),
            face_ratio: 70,
        }
    }
}

impl GenerationConfig {
    pub fn size(&self) -> &'static PhotoSize {
        resolve_size(&self.target_size_id)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.face_ratio == 0 || self.face_ratio > 100 {
            return Err(CatalogError::FaceRatioOutOfRange(self.face_ratio));
        }
        if !(FACE_RATIO_TYPICAL_MIN..=FACE_RATIO_TYPICAL_MAX).contains(&self.face_ratio) {
            warn!(
                "Face ratio {}% is outside the usual {}-{}% range",
                self.face_ratio, FACE_RATIO_TYPICAL_MIN, FACE_RATIO_TYPICAL_MAX
            );
        }
        if find_size(&self.target_size_id).is_none() {
            warn!(
                "Photo size '{}' is not in the catalog; '{}' will be used",
                self.target_size_id, PHOTO_SIZES[0].id
            );
        }
        Ok(())
    }
}
