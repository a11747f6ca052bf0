//! Region proposal: candidate bounding boxes from three independent methods.

use anyhow::{bail, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;

use crate::config::{FallbackConfig, HueBand, ProposalConfig};
use crate::detection::contours::{external_boxes, invert};
use crate::detection::preprocessing::to_grayscale;
use crate::models::{BoxGeometry, Rect};

/// Candidates from each method, kept apart for logging.
#[derive(Debug, Default, Clone)]
pub struct Proposals {
    pub contour: Vec<Rect>,
    pub edge: Vec<Rect>,
    pub color: Vec<Rect>,
}

impl Proposals {
    /// All candidates in method order, malformed boxes removed.
    pub fn union(self) -> Vec<Rect> {
        self.contour
            .into_iter()
            .chain(self.edge)
            .chain(self.color)
            .filter(Rect::is_valid)
            .collect()
    }
}

/// Run all three methods. Color segmentation failures are logged and yield no boxes.
pub fn propose(image: &RgbImage, mask: &GrayImage, config: &ProposalConfig) -> Proposals {
    let contour = contour_proposals(mask, config);
    let edge = edge_proposals(&to_grayscale(image), config);
    let color = if config.color_segmentation {
        color_proposals(image, config).unwrap_or_else(|err| {
            tracing::warn!("Color segmentation skipped: {}", err);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    Proposals { contour, edge, color }
}

/// Outer contours of the dark (foreground) parts of the binary mask
pub fn contour_proposals(mask: &GrayImage, config: &ProposalConfig) -> Vec<Rect> {
    external_boxes(&invert(mask))
        .into_iter()
        .filter(|r| r.area() >= config.contour_min_area as f32)
        .collect()
}

/// Outer contours of the dilated Canny edge map
pub fn edge_proposals(gray: &GrayImage, config: &ProposalConfig) -> Vec<Rect> {
    let mut edges = canny(gray, config.canny_low, config.canny_high);
    if config.edge_dilation > 0 {
        edges = dilate(&edges, Norm::LInf, config.edge_dilation);
    }

    external_boxes(&edges)
        .into_iter()
        .filter(|r| {
            r.area() >= config.edge_min_area as f32
                && r.width() >= config.edge_min_width as f32
                && r.height() >= config.edge_min_height as f32
        })
        .collect()
}

/// Outer contours of pixels falling in any configured accent hue band
pub fn color_proposals(image: &RgbImage, config: &ProposalConfig) -> Result<Vec<Rect>> {
    if config.color_bands.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(band) = config
        .color_bands
        .iter()
        .find(|b| b.hue_min > b.hue_max || b.hue_max >= 180)
    {
        bail!(
            "Invalid hue band '{}': {}..={} (expected ascending values below 180)",
            band.name,
            band.hue_min,
            band.hue_max
        );
    }

    let mask = hue_mask(image, &config.color_bands, config.color_min_saturation, config.color_min_value);

    Ok(external_boxes(&mask)
        .into_iter()
        .filter(|r| r.area() >= config.color_min_area as f32)
        .collect())
}

fn hue_mask(image: &RgbImage, bands: &[HueBand], min_s: u8, min_v: u8) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, px) in image.enumerate_pixels() {
        let (h, s, v) = rgb_to_hsv(px.0);
        let hit = s >= min_s && v >= min_v && bands.iter().any(|b| b.hue_min <= h && h <= b.hue_max);
        if hit {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// 8-bit HSV with hue halved into 0..180
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let v = max;
    let s = if max == 0 { 0.0 } else { 255.0 * delta / max as f32 };

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g as f32 - b as f32) / delta
    } else if max == g {
        120.0 + 60.0 * (b as f32 - r as f32) / delta
    } else {
        240.0 + 60.0 * (r as f32 - g as f32) / delta
    };
    let hue_deg = if hue_deg < 0.0 { hue_deg + 360.0 } else { hue_deg };

    let h = ((hue_deg / 2.0).round() as u32 % 180) as u8;
    (h, s.round() as u8, v)
}

/// Coarse pass used when no method produced anything: the outer outline of every patch
/// that is not near-white becomes a region. Content nested inside a patch is skipped.
pub fn coarse_proposals(image: &RgbImage, config: &FallbackConfig) -> Vec<Rect> {
    let gray = to_grayscale(image);
    let mut content = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        if p[0] <= config.coarse_threshold {
            content.put_pixel(x, y, Luma([255]));
        }
    }

    external_boxes(&content)
        .into_iter()
        .filter(|r| r.area() > config.coarse_min_area as f32)
        .collect()
}

/// Generic stand-in regions for a screen where nothing was found: a header, a centred
/// logo, then alternating text rows and inputs, and a button. Coordinates scale with
/// the image.
pub fn placeholder_proposals(width: u32, height: u32) -> Vec<Rect> {
    const ROWS: [(f32, f32, f32, f32); 7] = [
        (0.05, 0.04, 0.95, 0.12),
        (0.40, 0.16, 0.60, 0.30),
        (0.05, 0.34, 0.95, 0.40),
        (0.05, 0.43, 0.95, 0.50),
        (0.05, 0.53, 0.95, 0.59),
        (0.05, 0.62, 0.95, 0.69),
        (0.05, 0.73, 0.95, 0.80),
    ];
    let (w, h) = (width as f32, height as f32);

    ROWS.iter()
        .map(|&(x1, y1, x2, y2)| {
            Rect::new(
                (x1 * w).floor() as u32,
                (y1 * h).floor() as u32,
                ((x2 * w).ceil() as u32).min(width),
                ((y2 * h).ceil() as u32).min(height),
            )
        })
        .filter(Rect::is_valid)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn accent_blue_lands_in_blue_band() {
        let (h, s, v) = rgb_to_hsv([37, 99, 235]);
        assert!((100..=130).contains(&h), "hue {}", h);
        assert!(s > 200);
        assert_eq!(v, 235);
    }

    #[test]
    fn gray_has_no_saturation() {
        assert_eq!(rgb_to_hsv([128, 128, 128]), (0, 0, 128));
    }

    #[test]
    fn coarse_pass_skips_content_inside_a_frame() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let gray = Rgb([180, 180, 180]);
        for i in 50..150 {
            for t in 0..4 {
                img.put_pixel(i, 50 + t, gray);
                img.put_pixel(i, 149 - t, gray);
                img.put_pixel(50 + t, i, gray);
                img.put_pixel(149 - t, i, gray);
            }
        }
        for y in 90..110 {
            for x in 90..110 {
                img.put_pixel(x, y, gray);
            }
        }

        let rects = coarse_proposals(&img, &FallbackConfig::default());
        assert_eq!(rects, vec![Rect::new(50, 50, 150, 150)]);
    }

    #[test]
    fn placeholders_fit_small_images() {
        let rects = placeholder_proposals(120, 90);
        assert_eq!(rects.len(), 7);
        assert!(rects.iter().all(|r| r.x2 <= 120 && r.y2 <= 90 && r.is_valid()));
    }
}
