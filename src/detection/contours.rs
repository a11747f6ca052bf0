use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use crate::models::Rect;

/// Bounding boxes of the outermost contours of the non-zero pixels in `mask`.
///
/// Contours nested inside another shape's hole are skipped, so a framed box yields one
/// rect rather than one per inner stroke. Boxes come out in raster order of their first
/// border pixel.
pub fn external_boxes(mask: &GrayImage) -> Vec<Rect> {
    let contours = find_contours::<i32>(mask);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let min_x = c.points.iter().map(|p| p.x).min()?;
            let max_x = c.points.iter().map(|p| p.x).max()?;
            let min_y = c.points.iter().map(|p| p.y).min()?;
            let max_y = c.points.iter().map(|p| p.y).max()?;
            Some(Rect::from_extent(
                min_x.max(0) as u32,
                min_y.max(0) as u32,
                max_x.max(0) as u32,
                max_y.max(0) as u32,
            ))
        })
        .collect()
}

/// Swap foreground and background of a binary mask.
pub fn invert(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    image::imageops::invert(&mut out);
    out
}
