//! Visual region analysis: page palette, per-region color/texture features and the
//! reclassification pass that can override the geometric type.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{VisualConfig, VisualShape};
use crate::detection::preprocessing::to_grayscale;
use crate::ir::{Element, ElementType, Theme, VisualFeatures};
use crate::models::{BoxGeometry, Rect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub rgb: [u8; 3],
    pub hex: String,
    pub count: u32,
}

impl PaletteColor {
    fn new(rgb: [u8; 3], count: u32) -> Self {
        Self {
            rgb,
            hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
            count,
        }
    }

    /// Perceived brightness in [0, 1]
    pub fn luminance(&self) -> f32 {
        let [r, g, b] = self.rgb.map(|c| c as f32 / 255.0);
        0.299 * r + 0.587 * g + 0.114 * b
    }
}

/// Most frequent colors of the page, most frequent first.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub colors: Vec<PaletteColor>,
    pub background: PaletteColor,
    pub theme: Theme,
}

impl Palette {
    /// Hex strings of the first `n` colors
    pub fn hex_colors(&self, n: usize) -> Vec<String> {
        self.colors.iter().take(n).map(|c| c.hex.clone()).collect()
    }
}

/// Count exact colors over a deterministic stride sample of at most `sample_limit` pixels.
pub fn analyze_palette(img: &RgbImage, config: &VisualConfig) -> Palette {
    let total = img.pixels().len();
    let limit = config.palette_sample_limit.max(1);
    let stride = total.div_ceil(limit).max(1);

    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for px in img.pixels().step_by(stride) {
        *counts.entry(px.0).or_insert(0) += 1;
    }

    let mut ranked: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let colors: Vec<PaletteColor> = ranked
        .into_iter()
        .take(config.palette_size)
        .map(|(rgb, count)| PaletteColor::new(rgb, count))
        .collect();

    let background = colors
        .first()
        .cloned()
        .unwrap_or_else(|| PaletteColor::new([255, 255, 255], 0));
    let theme = if background.luminance() > 0.5 {
        Theme::Light
    } else {
        Theme::Dark
    };

    Palette {
        colors,
        background,
        theme,
    }
}

/// Color and texture measurements for one region crop
pub fn region_features(region: &RgbImage, config: &VisualConfig) -> VisualFeatures {
    VisualFeatures {
        avg_color: mean_color(region),
        dominant_color: median_color(region),
        has_border: has_border(region, config.border_max_variance),
        fill_ratio: fill_ratio(region, config.fill_luma_threshold),
        is_uniform: mean_variance(region.pixels()) < config.uniform_max_variance,
    }
}

pub fn mean_color(region: &RgbImage) -> [f32; 3] {
    let n = region.pixels().len();
    if n == 0 {
        return [255.0; 3];
    }
    let mut sum = [0u64; 3];
    for px in region.pixels() {
        for c in 0..3 {
            sum[c] += px.0[c] as u64;
        }
    }
    sum.map(|s| s as f32 / n as f32)
}

/// Per-channel median, truncated to an integer (the mean of the two middle values when
/// the pixel count is even).
pub fn median_color(region: &RgbImage) -> [u8; 3] {
    let n = region.pixels().len();
    if n == 0 {
        return [255; 3];
    }

    let mut hist = [[0u32; 256]; 3];
    for px in region.pixels() {
        for c in 0..3 {
            hist[c][px.0[c] as usize] += 1;
        }
    }

    let kth = |h: &[u32; 256], k: usize| -> u32 {
        let mut seen = 0usize;
        for (value, &count) in h.iter().enumerate() {
            seen += count as usize;
            if seen > k {
                return value as u32;
            }
        }
        255
    };

    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = if n % 2 == 1 {
            kth(&hist[c], n / 2) as u8
        } else {
            ((kth(&hist[c], n / 2 - 1) + kth(&hist[c], n / 2)) / 2) as u8
        };
    }
    out
}

/// Mean over the three channels of each channel's variance
fn mean_variance<'a>(pixels: impl Iterator<Item = &'a Rgb<u8>>) -> f32 {
    let mut n = 0u64;
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for px in pixels {
        n += 1;
        for c in 0..3 {
            let v = px.0[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let var: f64 = (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            (sum_sq[c] / n - mean * mean).max(0.0)
        })
        .sum();
    (var / 3.0) as f32
}

/// True when all four one-pixel edge strips are individually near-uniform.
pub fn has_border(region: &RgbImage, max_variance: f32) -> bool {
    let (w, h) = region.dimensions();
    if w < 4 || h < 4 {
        return false;
    }

    let top = (0..w).map(|x| region.get_pixel(x, 0));
    let bottom = (0..w).map(|x| region.get_pixel(x, h - 1));
    let left = (0..h).map(|y| region.get_pixel(0, y));
    let right = (0..h).map(|y| region.get_pixel(w - 1, y));

    mean_variance(top) < max_variance
        && mean_variance(bottom) < max_variance
        && mean_variance(left) < max_variance
        && mean_variance(right) < max_variance
}

/// Fraction of pixels whose luma is at or below `threshold` (i.e. not near-white)
pub fn fill_ratio(region: &RgbImage, threshold: u8) -> f32 {
    let gray = to_grayscale(region);
    let total = gray.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let filled = gray.pixels().filter(|p| p[0] <= threshold).count();
    filled as f32 / total as f32
}

fn shape_matches(b: &impl BoxGeometry, shape: &VisualShape) -> bool {
    shape.aspect.contains(b.aspect_ratio())
        && shape.height.contains(b.height())
        && b.area() >= shape.min_area
}

/// Reclassify an element from its geometry, features and the page background.
pub fn refine_type(
    element: &Element,
    features: &VisualFeatures,
    background: [u8; 3],
    config: &VisualConfig,
) -> ElementType {
    let b = &element.bbox;
    let area = b.area();
    let aspect = b.aspect_ratio();

    let color_diff: u32 = features
        .dominant_color
        .iter()
        .zip(background.iter())
        .map(|(a, c)| a.abs_diff(*c) as u32)
        .sum();
    let distinct = color_diff > config.distinct_color_delta;

    if shape_matches(b, &config.button)
        && (features.has_border || distinct)
        && features.fill_ratio >= config.button_min_fill
    {
        return ElementType::Button;
    }

    if shape_matches(b, &config.input) && features.has_border && features.is_uniform {
        return ElementType::Input;
    }

    if element.has_text() || element.kind == ElementType::Text {
        return ElementType::Text;
    }

    if config.image_aspect.contains(aspect)
        && config.image_min_side.contains(b.min_side())
        && config.image_area.contains(area)
    {
        return ElementType::Image;
    }

    if area > config.container_min_area && (features.is_uniform || distinct) {
        return ElementType::Container;
    }

    if area < config.text_max_area || aspect > config.text_min_aspect {
        ElementType::Text
    } else {
        ElementType::Container
    }
}

/// Attach visual features to every element whose box lies inside the image and apply
/// the reclassification. Returns how many elements changed type.
pub fn enhance_elements(
    elements: &mut [Element],
    img: &RgbImage,
    palette: &Palette,
    config: &VisualConfig,
) -> usize {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let mut changed = 0;

    for el in elements.iter_mut() {
        let [x1, y1, x2, y2] = el.bbox;
        if !(x1 >= 0.0 && y1 >= 0.0 && x1 < x2 && y1 < y2 && x2 <= w && y2 <= h) {
            continue;
        }
        let rect = Rect::new(x1 as u32, y1 as u32, x2.ceil() as u32, y2.ceil() as u32);
        let Some(region) = rect.crop(img) else {
            continue;
        };

        let features = region_features(&region, config);
        let refined = refine_type(el, &features, palette.background.rgb, config);
        if refined != el.kind {
            el.kind = refined;
            el.confidence = Some(config.classification_confidence);
            changed += 1;
        }
        el.visual = Some(features);
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_even_count_averages_middle_values() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 0, 255]));
        img.put_pixel(1, 0, Rgb([21, 0, 255]));
        assert_eq!(median_color(&img), [15, 0, 255]);
    }

    #[test]
    fn outlined_box_has_border_and_low_fill() {
        let mut img = RgbImage::from_pixel(200, 40, Rgb([255, 255, 255]));
        for x in 0..200 {
            img.put_pixel(x, 0, Rgb([200, 200, 200]));
            img.put_pixel(x, 39, Rgb([200, 200, 200]));
        }
        for y in 0..40 {
            img.put_pixel(0, y, Rgb([200, 200, 200]));
            img.put_pixel(199, y, Rgb([200, 200, 200]));
        }
        let f = region_features(&img, &VisualConfig::default());
        assert!(f.has_border);
        assert!(f.is_uniform);
        assert!(f.fill_ratio < 0.1);
        assert_eq!(f.dominant_color, [255, 255, 255]);
    }

    #[test]
    fn palette_background_is_most_frequent_color() {
        let mut img = RgbImage::from_pixel(50, 50, Rgb([20, 20, 30]));
        for x in 0..10 {
            img.put_pixel(x, 0, Rgb([250, 250, 250]));
        }
        let palette = analyze_palette(&img, &VisualConfig::default());
        assert_eq!(palette.background.rgb, [20, 20, 30]);
        assert_eq!(palette.theme, Theme::Dark);
        assert_eq!(palette.hex_colors(3), vec!["#14141e".to_string(), "#fafafa".to_string()]);
    }
}
