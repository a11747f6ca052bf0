use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;

use crate::config::PreprocessConfig;

/// Output of preprocessing: the working color image plus its grayscale and binary mask.
pub struct Preprocessed {
    pub image: RgbImage,
    pub gray: GrayImage,
    pub mask: GrayImage,
    /// Factor applied to the input dimensions (1.0 when not resized)
    pub scale: f32,
    /// Rotation applied by deskew, in degrees
    pub skew_degrees: f32,
}

pub fn preprocess(img: &RgbImage, config: &PreprocessConfig) -> Preprocessed {
    let (mut image, scale) = limit_size(img, config.resize_max_side_px);
    let mut gray = to_grayscale(&image);
    gray = bilateral_filter(
        &gray,
        config.bilateral_diameter,
        config.bilateral_sigma_color,
        config.bilateral_sigma_space,
    );

    let mut skew_degrees = 0.0;
    if config.deskew {
        if let Some(angle) = estimate_skew(&gray, config.deskew_ink_threshold) {
            if angle.abs() > 0.1 {
                let theta = -angle.to_radians();
                gray = rotate_about_center(&gray, theta, Interpolation::Bicubic, Luma([255u8]));
                image = rotate_about_center(&image, theta, Interpolation::Bicubic, Rgb([255u8, 255, 255]));
                skew_degrees = angle;
            }
        }
    }

    let mask = adaptive_threshold(&gray, config.threshold_block_size, config.threshold_offset);

    Preprocessed {
        image,
        gray,
        mask,
        scale,
        skew_degrees,
    }
}

/// Downscale so the longest side is at most `max_side`, preserving aspect ratio
pub fn limit_size(img: &RgbImage, max_side: u32) -> (RgbImage, f32) {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return (img.clone(), 1.0);
    }

    let scale = max_side as f32 / longest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    (image::imageops::resize(img, new_w, new_h, FilterType::Triangle), scale)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(img.clone()).to_luma8()
}

/// Edge-preserving smoothing: each pixel becomes a weighted mean of its circular
/// neighbourhood, weighted by both distance and intensity difference.
pub fn bilateral_filter(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let radius = (diameter / 2) as i64;
    if radius == 0 || sigma_color <= 0.0 || sigma_space <= 0.0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 > (radius * radius) as f32 {
                continue;
            }
            offsets.push((dx, dy, (-r2 / (2.0 * sigma_space * sigma_space)).exp()));
        }
    }

    let color_weights: Vec<f32> = (0..256)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / (2.0 * sigma_color * sigma_color)).exp()
        })
        .collect();

    let mut out = GrayImage::new(w, h);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let center = img.get_pixel(x as u32, y as u32)[0];
            let mut sum = 0.0f32;
            let mut norm = 0.0f32;
            for &(dx, dy, spatial) in &offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let value = img.get_pixel(nx as u32, ny as u32)[0];
                let weight = spatial * color_weights[center.abs_diff(value) as usize];
                sum += weight * value as f32;
                norm += weight;
            }
            let smoothed = if norm > 0.0 { sum / norm } else { center as f32 };
            out.put_pixel(x as u32, y as u32, Luma([smoothed.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Estimate the dominant ink orientation in degrees, in (-45, 45].
///
/// Returns `None` when there are too few dark pixels to fit a rectangle.
pub fn estimate_skew(gray: &GrayImage, ink_threshold: u8) -> Option<f32> {
    let points: Vec<Point<i32>> = gray
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < ink_threshold)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();
    if points.len() < 3 {
        return None;
    }

    let corners = min_area_rect(&points);
    let edge = |a: Point<i32>, b: Point<i32>| ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let e1 = edge(corners[0], corners[1]);
    let e2 = edge(corners[1], corners[2]);
    let len = |e: (f32, f32)| e.0.hypot(e.1);
    let (dx, dy) = if len(e1) >= len(e2) { e1 } else { e2 };
    if dx == 0.0 && dy == 0.0 {
        return None;
    }

    let mut angle = dy.atan2(dx).to_degrees();
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    Some(angle)
}

/// Binarize against the mean of a square neighbourhood: a pixel becomes white (255) when
/// it is brighter than `local_mean - offset`, black otherwise.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let radius = block_size.max(1) / 2;
    let stride = w as usize + 1;

    // Summed-area table with a zero first row/column
    let mut integral = vec![0u64; stride * (h as usize + 1)];
    for y in 0..h as usize {
        let mut row_sum = 0u64;
        for x in 0..w as usize {
            row_sum += gray.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let top = y.saturating_sub(radius) as usize;
        let bottom = (y + radius + 1).min(h) as usize;
        for x in 0..w {
            let left = x.saturating_sub(radius) as usize;
            let right = (x + radius + 1).min(w) as usize;
            let sum = integral[bottom * stride + right] + integral[top * stride + left]
                - integral[top * stride + right]
                - integral[bottom * stride + left];
            let count = ((bottom - top) * (right - left)) as f32;
            let mean = sum as f32 / count;
            let value = gray.get_pixel(x, y)[0] as f32;
            let bin = if value > mean - offset { 255u8 } else { 0u8 };
            out.put_pixel(x, y, Luma([bin]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_thresholds_to_background() {
        let gray = GrayImage::from_pixel(64, 48, Luma([255u8]));
        let mask = adaptive_threshold(&gray, 31, 2.0);
        assert!(mask.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn dark_line_survives_smoothing_and_threshold() {
        let mut gray = GrayImage::from_pixel(80, 80, Luma([255u8]));
        for x in 10..70 {
            gray.put_pixel(x, 40, Luma([200u8]));
        }
        let smoothed = bilateral_filter(&gray, 9, 75.0, 75.0);
        let mask = adaptive_threshold(&smoothed, 31, 2.0);
        assert_eq!(mask.get_pixel(40, 40)[0], 0);
        assert_eq!(mask.get_pixel(40, 10)[0], 255);
    }

    /// White canvas with a dark 120x6 bar through the centre, tilted `degrees` clockwise
    /// on screen (y grows downward).
    fn tilted_bar(degrees: f32) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let (sin, cos) = degrees.to_radians().sin_cos();
        for t in -60..60 {
            for n in -3..3 {
                let x = 100.0 + t as f32 * cos - n as f32 * sin;
                let y = 100.0 + t as f32 * sin + n as f32 * cos;
                img.put_pixel(x.round() as u32, y.round() as u32, Rgb([0, 0, 0]));
            }
        }
        img
    }

    #[test]
    fn skew_follows_the_bar_direction() {
        let gray = to_grayscale(&tilted_bar(10.0));
        let angle = estimate_skew(&gray, 250).expect("bar has ink");
        assert!((angle - 10.0).abs() < 1.0, "skew {}", angle);

        let gray = to_grayscale(&tilted_bar(-10.0));
        let angle = estimate_skew(&gray, 250).expect("bar has ink");
        assert!((angle + 10.0).abs() < 1.0, "skew {}", angle);
    }

    #[test]
    fn deskew_straightens_the_working_images() {
        let config = PreprocessConfig {
            deskew: true,
            ..PreprocessConfig::default()
        };
        let pre = preprocess(&tilted_bar(10.0), &config);

        assert!((pre.skew_degrees - 10.0).abs() < 1.0, "applied {}", pre.skew_degrees);
        assert_eq!(pre.image.dimensions(), pre.gray.dimensions());
        let residual = estimate_skew(&pre.gray, config.deskew_ink_threshold).expect("bar has ink");
        assert!(residual.abs() < 1.0, "residual skew {}", residual);
    }

    #[test]
    fn deskew_is_off_by_default() {
        let pre = preprocess(&tilted_bar(10.0), &PreprocessConfig::default());
        assert_eq!(pre.skew_degrees, 0.0);
    }

    #[test]
    fn collinear_or_sparse_ink_does_not_panic() {
        let mut gray = GrayImage::from_pixel(50, 50, Luma([255u8]));
        for x in 10..40 {
            gray.put_pixel(x, 25, Luma([0u8]));
        }
        let angle = estimate_skew(&gray, 250);
        assert!(angle.is_none_or(|a| a.abs() < 1e-3), "skew {:?}", angle);

        let mut sparse = GrayImage::from_pixel(50, 50, Luma([255u8]));
        sparse.put_pixel(5, 5, Luma([0u8]));
        assert_eq!(estimate_skew(&sparse, 250), None);
    }

    #[test]
    fn oversized_image_is_scaled_down() {
        let img = RgbImage::new(4000, 1000);
        let (resized, scale) = limit_size(&img, 2048);
        assert_eq!(resized.dimensions(), (2048, 512));
        assert!((scale - 0.512).abs() < 1e-6);
    }
}
