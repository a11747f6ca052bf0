use image::RgbImage;

/// Axis-aligned pixel box produced by region proposal.
///
/// `x2`/`y2` are exclusive, so `x2 - x1` is the width in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from inclusive min/max pixel coordinates, as found while scanning a region.
    pub fn from_extent(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self::new(min_x, min_y, max_x + 1, max_y + 1)
    }

    /// True when the box encloses at least one pixel.
    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }

    /// Clip the box to an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        }
    }

    /// Extract the region as a sub-image. Returns `None` when the clipped box is empty.
    pub fn crop(&self, img: &RgbImage) -> Option<RgbImage> {
        let clipped = self.clamp_to(img.width(), img.height());
        if !clipped.is_valid() {
            return None;
        }
        Some(
            image::imageops::crop_imm(
                img,
                clipped.x1,
                clipped.y1,
                clipped.x2 - clipped.x1,
                clipped.y2 - clipped.y1,
            )
            .to_image(),
        )
    }

    pub fn to_bbox(&self) -> BBox {
        [self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32]
    }
}

/// IR bounding box `[x1, y1, x2, y2]` in working-image pixels.
pub type BBox = [f32; 4];

/// Shape measurements shared by proposal rects and IR bounding boxes.
pub trait BoxGeometry {
    fn corners(&self) -> (f32, f32, f32, f32);

    fn width(&self) -> f32 {
        let (x1, _, x2, _) = self.corners();
        (x2 - x1).max(0.0)
    }

    fn height(&self) -> f32 {
        let (_, y1, _, y2) = self.corners();
        (y2 - y1).max(0.0)
    }

    fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Width over height; degenerate heights are treated as a tiny positive value.
    fn aspect_ratio(&self) -> f32 {
        self.width().max(1e-6) / self.height().max(1e-6)
    }

    fn min_side(&self) -> f32 {
        self.width().min(self.height())
    }

    fn center(&self) -> (f32, f32) {
        let (x1, y1, x2, y2) = self.corners();
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }

    fn intersection_area(&self, other: &impl BoxGeometry) -> f32 {
        let (ax1, ay1, ax2, ay2) = self.corners();
        let (bx1, by1, bx2, by2) = other.corners();
        let iw = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let ih = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        iw * ih
    }

    /// Fraction of this box's own area covered by `other`.
    fn overlap_ratio(&self, other: &impl BoxGeometry) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / area
    }

    /// Horizontal overlap relative to the narrower of the two boxes.
    fn horizontal_overlap_ratio(&self, other: &impl BoxGeometry) -> f32 {
        let (ax1, _, ax2, _) = self.corners();
        let (bx1, _, bx2, _) = other.corners();
        let inter = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        inter / self.width().max(1e-6).min(other.width().max(1e-6))
    }
}

impl BoxGeometry for Rect {
    fn corners(&self) -> (f32, f32, f32, f32) {
        (self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32)
    }
}

impl BoxGeometry for BBox {
    fn corners(&self) -> (f32, f32, f32, f32) {
        (self[0], self[1], self[2], self[3])
    }
}

/// Clip a bounding box into `[0, w] x [0, h]`, swapping inverted edges.
pub fn clamp_bbox(bbox: BBox, w: f32, h: f32) -> BBox {
    let [mut x1, mut y1, mut x2, mut y2] = bbox.map(|v| if v.is_finite() { v } else { 0.0 });
    x1 = x1.clamp(0.0, w);
    x2 = x2.clamp(0.0, w);
    y1 = y1.clamp(0.0, h);
    y2 = y2.clamp(0.0, h);
    if x2 < x1 {
        std::mem::swap(&mut x1, &mut x2);
    }
    if y2 < y1 {
        std::mem::swap(&mut y1, &mut y2);
    }
    [x1, y1, x2, y2]
}
