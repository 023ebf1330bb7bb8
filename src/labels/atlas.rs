//! ASCII glyph atlas: rasterizes a fixed printable-ASCII range with `fontdue`
//! and shelf-packs the bitmaps into a single CPU-side texture.
//!
//! Uses a simple shelf packer (`next_x`/`next_y`/`row_height`); this module
//! stops at producing the packed bitmap and UV table -- GPU upload is the
//! host's concern (see `renderer::buffer`), which owns no texture of its
//! own either, only CPU-side staging.

use std::collections::HashMap;

use fontdue::{Font, FontSettings};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, TessError};

/// First and last printable ASCII codepoints packed into the atlas.
const FIRST_CHAR: u8 = 0x20;
const LAST_CHAR: u8 = 0x7E;

/// Fixed per-glyph metrics used by label layout: every glyph is treated as
/// 7.5px wide and 14px tall regardless of its rasterized extent, so layout
/// never needs to consult the atlas.
pub const GLYPH_WIDTH_PX: f32 = 7.5;
pub const GLYPH_HEIGHT_PX: f32 = 14.0;

/// One packed glyph's region in the atlas, in both pixel and normalized UV
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub struct GlyphRegion {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// A packed ASCII atlas: one grayscale-alpha bitmap plus a lookup from
/// character to its region.
pub struct GlyphAtlas {
    pub width: u32,
    pub height: u32,
    /// Single-channel (alpha) bitmap, row-major, `width * height` bytes.
    pub bitmap: Vec<u8>,
    regions: HashMap<char, GlyphRegion>,
}

impl GlyphAtlas {
    /// Rasterizes the printable-ASCII range of `font_bytes` at `px` size and
    /// packs the glyphs shelf-style into a square-ish atlas.
    pub fn build(font_bytes: &[u8], px: f32) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|e| TessError::InvalidConfig(format!("font load failed: {e}")))?;

        let mut rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = Vec::new();
        for code in FIRST_CHAR..=LAST_CHAR {
            let ch = code as char;
            let (metrics, bitmap) = font.rasterize(ch, px);
            rasterized.push((ch, metrics, bitmap));
        }

        // Shelf-pack into a fixed-width atlas, growing height as rows fill.
        let atlas_width: u32 = 512;
        let mut next_x = 0u32;
        let mut next_y = 0u32;
        let mut row_height = 0u32;
        let mut placements: Vec<(char, u32, u32, u32, u32)> = Vec::new();

        for (ch, metrics, _) in &rasterized {
            let w = metrics.width.max(1) as u32;
            let h = metrics.height.max(1) as u32;
            if next_x + w > atlas_width {
                next_x = 0;
                next_y += row_height;
                row_height = 0;
            }
            placements.push((*ch, next_x, next_y, w, h));
            next_x += w;
            row_height = row_height.max(h);
        }
        let atlas_height = (next_y + row_height).max(1);

        let mut bitmap = vec![0u8; (atlas_width * atlas_height) as usize];
        let mut regions = HashMap::new();

        for ((ch, metrics, glyph_bitmap), (_, x, y, w, h)) in rasterized.iter().zip(&placements) {
            for row in 0..metrics.height {
                let src_start = row * metrics.width;
                let dst_row = y + row as u32;
                let dst_start = (dst_row * atlas_width + x) as usize;
                let src_end = (src_start + metrics.width).min(glyph_bitmap.len());
                if src_start >= src_end {
                    continue;
                }
                let copy_len = (src_end - src_start).min(atlas_width as usize - *x as usize);
                bitmap[dst_start..dst_start + copy_len]
                    .copy_from_slice(&glyph_bitmap[src_start..src_start + copy_len]);
            }

            regions.insert(
                *ch,
                GlyphRegion {
                    uv_min: [*x as f32 / atlas_width as f32, *y as f32 / atlas_height as f32],
                    uv_max: [
                        (*x + *w) as f32 / atlas_width as f32,
                        (*y + *h) as f32 / atlas_height as f32,
                    ],
                },
            );
        }

        Ok(Self {
            width: atlas_width,
            height: atlas_height,
            bitmap,
            regions,
        })
    }

    /// Looks up a glyph's UV region, normalizing via NFC and falling back to
    /// `'?'` for any character outside the packed ASCII range.
    pub fn region_for(&self, ch: char) -> GlyphRegion {
        let normalized = ch.nfc().next().unwrap_or(ch);
        self.regions
            .get(&normalized)
            .copied()
            .unwrap_or_else(|| self.regions[&'?'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_malformed_font_bytes() {
        // No TTF is bundled in this crate (hosts supply their own via
        // `MapOptions` or a similar asset pipeline); exercise the error path
        // instead of the happy path, which needs a real font file.
        let err = GlyphAtlas::build(&[0u8; 16], 24.0).unwrap_err();
        assert!(matches!(err, TessError::InvalidConfig(_)));
    }

    #[test]
    fn test_glyph_metrics_are_fixed() {
        assert_eq!(GLYPH_WIDTH_PX, 7.5);
        assert_eq!(GLYPH_HEIGHT_PX, 14.0);
    }
}
