use std::path::Path;

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::info;

use crate::catalog::PhotoSize;
use crate::config::Config;
use crate::llm::media::extension_for_mime;

const MM_PER_INCH: f64 = 25.4;

/// File name offered for a downloaded result, e.g. `id-photo-3x4-cm.png`.
pub fn download_file_name(size: &PhotoSize, mime_type: &str) -> String {
    let label: String = size
        .label
        .chars()
        .map(|ch| if ch.is_whitespace() { '-' } else { ch })
        .collect();
    format!("id-photo-{}.{}", label, extension_for_mime(mime_type))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSettings {
    pub width_mm: u32,
    pub height_mm: u32,
    pub gap_mm: u32,
    pub dpi: u32,
}

impl SheetSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            width_mm: config.print_sheet_width_mm,
            height_mm: config.print_sheet_height_mm,
            gap_mm: config.print_gap_mm,
            dpi: config.print_dpi,
        }
    }
}

impl Default for SheetSettings {
    fn default() -> Self {
        // 10x15 cm photo paper, landscape.
        Self {
            width_mm: 150,
            height_mm: 100,
            gap_mm: 3,
            dpi: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub columns: u32,
    pub rows: u32,
    pub photo_width_mm: u32,
    pub photo_height_mm: u32,
    pub gap_mm: u32,
}

fn copies_along(length_mm: u32, item_mm: u32, gap_mm: u32) -> u32 {
    if item_mm == 0 || item_mm > length_mm {
        return 0;
    }
    (length_mm + gap_mm) / (item_mm + gap_mm)
}

impl SheetLayout {
    /// Returns `None` when not even one photo fits on the sheet.
    pub fn plan(settings: &SheetSettings, size: &PhotoSize) -> Option<Self> {
        let columns = copies_along(settings.width_mm, size.mm_width, settings.gap_mm);
        let rows = copies_along(settings.height_mm, size.mm_height, settings.gap_mm);
        if columns == 0 || rows == 0 {
            return None;
        }
        Some(Self {
            columns,
            rows,
            photo_width_mm: size.mm_width,
            photo_height_mm: size.mm_height,
            gap_mm: settings.gap_mm,
        })
    }

    pub fn copies(&self) -> u32 {
        self.columns * self.rows
    }
}

fn mm_to_px(mm: u32, dpi: u32) -> u32 {
    (mm as f64 / MM_PER_INCH * dpi as f64).round() as u32
}

/// Tiles the photo across a white sheet, cropping each copy to fill its cell.
pub fn render_print_sheet(
    image_bytes: &[u8],
    size: &PhotoSize,
    settings: &SheetSettings,
) -> Result<RgbaImage> {
    let Some(layout) = SheetLayout::plan(settings, size) else {
        bail!(
            "A {} photo does not fit on a {}x{} mm sheet",
            size.label,
            settings.width_mm,
            settings.height_mm
        );
    };

    let photo = image::load_from_memory(image_bytes).context("Failed to decode result image")?;
    let cell_width = mm_to_px(layout.photo_width_mm, settings.dpi).max(1);
    let cell_height = mm_to_px(layout.photo_height_mm, settings.dpi).max(1);
    let gap = mm_to_px(layout.gap_mm, settings.dpi);
    let tile = photo
        .resize_to_fill(cell_width, cell_height, FilterType::Lanczos3)
        .to_rgba8();

    let sheet_width = mm_to_px(settings.width_mm, settings.dpi);
    let sheet_height = mm_to_px(settings.height_mm, settings.dpi);
    let mut sheet = RgbaImage::from_pixel(sheet_width, sheet_height, Rgba([255, 255, 255, 255]));

    let grid_width = layout.columns * cell_width + (layout.columns - 1) * gap;
    let grid_height = layout.rows * cell_height + (layout.rows - 1) * gap;
    let origin_x = sheet_width.saturating_sub(grid_width) / 2;
    let origin_y = sheet_height.saturating_sub(grid_height) / 2;

    for row in 0..layout.rows {
        for column in 0..layout.columns {
            let x = origin_x + column * (cell_width + gap);
            let y = origin_y + row * (cell_height + gap);
            imageops::overlay(&mut sheet, &tile, i64::from(x), i64::from(y));
        }
    }

    info!(
        "Rendered print sheet: {} copies of {} ({}x{}) at {} dpi",
        layout.copies(),
        size.label,
        layout.columns,
        layout.rows,
        settings.dpi
    );
    Ok(sheet)
}

pub fn save_print_sheet(sheet: &RgbaImage, path: &Path) -> Result<()> {
    sheet
        .save(path)
        .with_context(|| format!("Failed to write print sheet to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat};

    use super::*;
    use crate::catalog::resolve_size;

    fn blue_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn download_name_replaces_whitespace() {
        assert_eq!(
            download_file_name(resolve_size("3x4"), "image/png"),
            "id-photo-3x4-cm.png"
        );
        assert_eq!(
            download_file_name(resolve_size("passport"), "image/jpeg"),
            "id-photo-Passport-(4x6).jpg"
        );
    }

    #[test]
    fn ten_by_fifteen_sheet_holds_eight_small_photos() {
        let settings = SheetSettings::default();
        let layout = SheetLayout::plan(&settings, resolve_size("3x4")).expect("fits");
        assert_eq!((layout.columns, layout.rows), (4, 2));
        assert_eq!(layout.copies(), 8);

        let large = SheetLayout::plan(&settings, resolve_size("4x6")).expect("fits");
        assert_eq!((large.columns, large.rows), (3, 1));
    }

    #[test]
    fn oversized_photo_does_not_fit() {
        let settings = SheetSettings {
            width_mm: 20,
            ..SheetSettings::default()
        };
        assert_eq!(SheetLayout::plan(&settings, resolve_size("3x4")), None);
        assert!(render_print_sheet(&blue_png(3, 4), resolve_size("3x4"), &settings).is_err());
    }

    #[test]
    fn renders_centred_copies_on_white_paper() {
        // 127 dpi is exactly 5 px per mm.
        let settings = SheetSettings {
            dpi: 127,
            ..SheetSettings::default()
        };
        let sheet = render_print_sheet(&blue_png(60, 80), resolve_size("3x4"), &settings)
            .expect("renders");
        assert_eq!(sheet.dimensions(), (750, 500));
        assert_eq!(sheet.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));

        // Grid is 645x415 px, so the first cell starts at (52, 42).
        let centre = sheet.get_pixel(52 + 75, 42 + 100);
        assert!(centre[2] > 200 && centre[0] < 50, "{centre:?}");
        let last = sheet.get_pixel(52 + 3 * 165 + 75, 42 + 215 + 100);
        assert!(last[2] > 200 && last[0] < 50, "{last:?}");
    }

    #[test]
    fn undecodable_bytes_are_an_error() {
        let err = render_print_sheet(b"nope", resolve_size("3x4"), &SheetSettings::default())
            .expect_err("not an image");
        assert!(err.to_string().contains("decode"));
    }
}
