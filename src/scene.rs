//! Layer stacking and rendering of the viewer scene.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, ImageFormat, RgbaImage};

use crate::errors::{Result, ViewerError};
use crate::mask::Mask;

/// One drawable layer above the base buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Piece(usize),
    Overlay(usize),
}

/// Bottom-to-top stacking of every mask layer.
///
/// Each mask contributes its piece then its overlay, in load order. Raised
/// masks go above everything else, with all raised pieces below all raised
/// overlays.
pub fn draw_order(mask_count: usize, raised: &[usize]) -> Vec<Layer> {
    let is_raised = |i: &usize| raised.contains(i);
    let mut order = Vec::with_capacity(mask_count * 2);
    for i in (0..mask_count).filter(|i| !is_raised(i)) {
        order.push(Layer::Piece(i));
        order.push(Layer::Overlay(i));
    }
    order.extend((0..mask_count).filter(is_raised).map(Layer::Piece));
    order.extend((0..mask_count).filter(is_raised).map(Layer::Overlay));
    order
}

/// Render the base buffer with every layer translated by its mask offset.
pub fn compose(base: &RgbaImage, masks: &[Mask], order: &[Layer]) -> RgbaImage {
    let mut canvas = base.clone();
    for layer in order {
        let (image, mask) = match *layer {
            Layer::Piece(i) => (&masks[i].piece, &masks[i]),
            Layer::Overlay(i) => (&masks[i].overlay, &masks[i]),
        };
        imageops::overlay(
            &mut canvas,
            image,
            mask.offset.x as i64,
            mask.offset.y as i64,
        );
    }
    canvas
}

fn save(image: &RgbaImage, path: &Path, format: ImageFormat) -> Result<()> {
    let result = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .save_with_format(path, format)
    } else {
        image.save_with_format(path, format)
    };
    result.map_err(|e| ViewerError::Encode {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Files written by [`export`], in the order they were saved.
#[derive(Debug, Default)]
pub struct ExportedFiles {
    pub paths: Vec<PathBuf>,
}

/// Write the base buffer and the composited scene, plus each mask's layers
/// when `layers` is set.
pub fn export(
    output_dir: &Path,
    extension: &str,
    base: &RgbaImage,
    composite: &RgbaImage,
    masks: &[Mask],
    layers: bool,
) -> Result<ExportedFiles> {
    let format =
        ImageFormat::from_extension(extension).ok_or_else(|| ViewerError::Configuration {
            message: format!("{} is not a supported image format", extension),
        })?;
    fs::create_dir_all(output_dir).map_err(|e| ViewerError::FileSystem {
        path: output_dir.to_path_buf(),
        operation: "create output directory".to_string(),
        source: e,
    })?;

    let mut exported = ExportedFiles::default();
    let mut write = |name: String, image: &RgbaImage| -> Result<()> {
        let path = output_dir.join(format!("{}.{}", name, extension));
        save(image, &path, format)?;
        exported.paths.push(path);
        Ok(())
    };

    write("base".to_string(), base)?;
    write("composite".to_string(), composite)?;
    if layers {
        for (i, mask) in masks.iter().enumerate() {
            write(format!("mask_{}", i), &mask.normalized)?;
            write(format!("piece_{}", i), &mask.piece)?;
            write(format!("overlay_{}", i), &mask.overlay)?;
        }
    }
    Ok(exported)
}
