use image::{DynamicImage, Rgb, RgbImage};
use shot2ir::{OcrLine, ScanMode, StageRecord, TextRecognizer};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const INPUT_BORDER: Rgb<u8> = Rgb([200, 200, 200]);
pub const ACCENT_BLUE: Rgb<u8> = Rgb([37, 99, 235]);

/// Top edge of the first input in [`login_screen`].
pub const FIRST_INPUT_TOP: u32 = 100;

/// Outline `[x1, x2) x [y1, y2)` with a one-pixel stroke.
pub fn draw_outline(img: &mut RgbImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb<u8>) {
    for x in x1..x2 {
        img.put_pixel(x, y1, color);
        img.put_pixel(x, y2 - 1, color);
    }
    for y in y1..y2 {
        img.put_pixel(x1, y, color);
        img.put_pixel(x2 - 1, y, color);
    }
}

pub fn fill_rect(img: &mut RgbImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb<u8>) {
    for y in y1..y2 {
        for x in x1..x2 {
            img.put_pixel(x, y, color);
        }
    }
}

/// 480x640 white screen with two outlined inputs above one filled blue button, no text.
pub fn login_screen() -> DynamicImage {
    let mut img = RgbImage::from_pixel(480, 640, WHITE);
    draw_outline(&mut img, 40, FIRST_INPUT_TOP, 440, 148, INPUT_BORDER);
    draw_outline(&mut img, 40, 180, 440, 228, INPUT_BORDER);
    fill_rect(&mut img, 40, 280, 440, 332, ACCENT_BLUE);
    DynamicImage::ImageRgb8(img)
}

pub fn blank_screen() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(480, 640, WHITE))
}

/// Encode an image as PNG bytes.
pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

/// Recognizer returning canned lines per scan mode.
pub struct CannedRecognizer {
    pub block: Vec<OcrLine>,
    pub sparse: Vec<OcrLine>,
}

impl TextRecognizer for CannedRecognizer {
    fn name(&self) -> &str {
        "canned"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, _image: &RgbImage, mode: ScanMode) -> anyhow::Result<Vec<OcrLine>> {
        Ok(match mode {
            ScanMode::Block => self.block.clone(),
            ScanMode::Sparse => self.sparse.clone(),
        })
    }
}

/// Recognizer that claims to be available but always fails.
pub struct BrokenRecognizer;

impl TextRecognizer for BrokenRecognizer {
    fn name(&self) -> &str {
        "broken"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, _image: &RgbImage, _mode: ScanMode) -> anyhow::Result<Vec<OcrLine>> {
        anyhow::bail!("model crashed")
    }
}

/// Canned OCR for [`login_screen`]: a short label above the first input (block scan),
/// a case-only duplicate of it and a footer link (sparse scan).
pub fn login_text() -> CannedRecognizer {
    CannedRecognizer {
        block: vec![OcrLine::new("Email", 0.92, [40.0, 78.0, 200.0, 94.0])],
        sparse: vec![
            OcrLine::new("EMAIL", 0.88, [44.0, 79.0, 190.0, 94.0]),
            OcrLine::new("Forgot password?", 0.3, [40.0, 360.0, 260.0, 376.0]),
            OcrLine::new("x", 0.99, [300.0, 360.0, 310.0, 376.0]),
        ],
    }
}

/// Records a stage emitted during one run.
pub fn records_for<'a>(records: &'a [StageRecord], stage: &str) -> Vec<&'a StageRecord> {
    records.iter().filter(|r| r.stage == stage).collect()
}
