//! Mask normalization and the layers cut out of the base image.
//!
//! Every buffer here is an `RgbaImage`. A normalized mask is binary: object
//! pixels are opaque white, background pixels are fully transparent.

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::map::map_colors;
use rand::Rng;
use rayon::prelude::*;

use crate::interaction::{Offset, Point};

/// Channel value a source pixel must exceed to count as bright.
pub const BRIGHT_THRESHOLD: u8 = 128;

/// Normalized alpha a pixel must exceed to be hit by a click.
pub const HIT_ALPHA_THRESHOLD: u8 = 10;

/// Alpha of the overlay tint (35% opacity).
pub const TINT_ALPHA: u8 = 89;

const OBJECT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Fraction of pixels whose first channel is bright. Empty images have none.
pub fn bright_fraction(mask: &RgbaImage) -> f64 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let bright = mask
        .as_raw()
        .par_chunks_exact(4)
        .filter(|px| px[0] > BRIGHT_THRESHOLD)
        .count();
    bright as f64 / total as f64
}

/// Majority heuristic: a mask that is mostly white draws its object in black.
///
/// Ambiguous masks are not classified any further.
pub fn is_inverted(mask: &RgbaImage) -> bool {
    bright_fraction(mask) > 0.5
}

/// Binary alpha buffer where white/opaque marks object pixels, whatever the
/// source convention. Pixels exactly at the threshold are background either way.
pub fn normalize(mask: &RgbaImage) -> RgbaImage {
    let inverted = is_inverted(mask);
    map_colors(mask, |Rgba([value, ..])| {
        let object = if inverted {
            value < BRIGHT_THRESHOLD
        } else {
            value > BRIGHT_THRESHOLD
        };
        if object {
            OBJECT
        } else {
            BACKGROUND
        }
    })
}

/// Flat translucent color used to highlight a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tint(pub Rgba<u8>);

impl Tint {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(Rgba([r, g, b, TINT_ALPHA]))
    }

    /// Mid-range channels so the tint is never near black or white.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::new(
            rng.random_range(30..230),
            rng.random_range(30..230),
            rng.random_range(30..230),
        )
    }
}

/// The tint restricted to the mask footprint.
pub fn tint_overlay(normalized: &RgbaImage, tint: Tint) -> RgbaImage {
    let Rgba([r, g, b, a]) = tint.0;
    map_colors(normalized, |Rgba([.., mask_alpha])| {
        let alpha = scale_alpha(a, mask_alpha);
        if alpha == 0 {
            BACKGROUND
        } else {
            Rgba([r, g, b, alpha])
        }
    })
}

/// Base-image pixels under the footprint, alpha taken from the mask.
///
/// The piece has the mask's dimensions; where the mask extends past the
/// source image the piece stays transparent.
pub fn cut_piece(source: &RgbaImage, normalized: &RgbaImage) -> RgbaImage {
    ImageBuffer::from_fn(normalized.width(), normalized.height(), |x, y| {
        match source.get_pixel_checked(x, y) {
            Some(&Rgba([r, g, b, _])) => Rgba([r, g, b, normalized.get_pixel(x, y)[3]]),
            None => BACKGROUND,
        }
    })
}

/// Subtract the footprint from `base` so the object leaves the background layer.
pub fn erase_footprint(base: &mut RgbaImage, normalized: &RgbaImage) {
    let width = base.width().min(normalized.width());
    let height = base.height().min(normalized.height());
    for y in 0..height {
        for x in 0..width {
            let mask_alpha = normalized.get_pixel(x, y)[3];
            if mask_alpha == 0 {
                continue;
            }
            let pixel = base.get_pixel_mut(x, y);
            pixel[3] = scale_alpha(pixel[3], 255 - mask_alpha);
        }
    }
}

fn scale_alpha(alpha: u8, by: u8) -> u8 {
    ((alpha as u16 * by as u16 + 127) / 255) as u8
}

/// One segmented object: its normalized mask and the layers derived from it.
#[derive(Debug, Clone)]
pub struct Mask {
    pub name: String,
    pub url: String,
    /// Decoded mask as delivered by the endpoint.
    pub source: RgbaImage,
    pub inverted: bool,
    pub normalized: RgbaImage,
    pub tint: Tint,
    pub overlay: RgbaImage,
    pub piece: RgbaImage,
    pub offset: Offset,
}

impl Mask {
    /// Derive every layer of a mask and erase its footprint from `base`.
    ///
    /// The piece is cut from `original`, never from `base`, so masks that
    /// overlap still get complete pieces.
    pub fn process(
        name: impl Into<String>,
        url: impl Into<String>,
        source: RgbaImage,
        original: &RgbaImage,
        base: &mut RgbaImage,
        tint: Tint,
    ) -> Self {
        let inverted = is_inverted(&source);
        let normalized = normalize(&source);
        let overlay = tint_overlay(&normalized, tint);
        let piece = cut_piece(original, &normalized);
        erase_footprint(base, &normalized);

        Self {
            name: name.into(),
            url: url.into(),
            source,
            inverted,
            normalized,
            tint,
            overlay,
            piece,
            offset: Offset::ZERO,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.normalized.dimensions()
    }

    /// Whether the image pixel `at` lies on this mask at its current offset.
    pub fn hit(&self, at: Point) -> bool {
        let local = at - self.offset;
        if local.x < 0 || local.y < 0 {
            return false;
        }
        self.normalized
            .get_pixel_checked(local.x as u32, local.y as u32)
            .is_some_and(|px| px[3] > HIT_ALPHA_THRESHOLD)
    }

    pub fn footprint_len(&self) -> usize {
        self.normalized
            .as_raw()
            .chunks_exact(4)
            .filter(|px| px[3] != 0)
            .count()
    }
}
