use std::path::Path;

use image::{DynamicImage, RgbImage};

use crate::{
    config::DEFAULT_THRESHOLD, PixelEvent, Result, ScanDocument, SonifyError, TimeStepColumn,
};

/// BT.601 reduction of an 8-bit RGB triple to luma, rounded to nearest.
pub fn luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((r * 299 + g * 587 + b * 114 + 500) / 1000) as u8
}

/// Decoded image as row-major RGB and luma planes of identical size.
#[derive(Debug, Clone)]
pub struct ImagePlanes {
    width: u32,
    height: u32,
    rgb: Vec<[u8; 3]>,
    luma: Vec<u8>,
}

impl ImagePlanes {
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let rgb: Vec<[u8; 3]> = image.pixels().map(|pixel| pixel.0).collect();
        let luma_plane = rgb.iter().copied().map(luma).collect();
        Self {
            width,
            height,
            rgb,
            luma: luma_plane,
        }
    }

    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from_rgb_image(&image.to_rgb8())
    }

    /// Reads and decodes an image file of any format the `image` crate knows.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|err| SonifyError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        if image.width() == 0 || image.height() == 0 {
            return Err(SonifyError::Decode {
                path: path.to_path_buf(),
                reason: "image has no pixels".to_string(),
            });
        }
        Ok(Self::from_dynamic(&image))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        self.rgb[self.offset(x, y)]
    }

    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        self.luma[self.offset(x, y)]
    }
}

/// Extracts the sparse pixel-event document from an image.
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    threshold: u8,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Scanner {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Walks columns left to right and rows top to bottom. Columns without a
    /// pixel above the threshold are omitted.
    pub fn scan(&self, planes: &ImagePlanes) -> ScanDocument {
        let mut columns = Vec::new();
        for x in 0..planes.width() {
            let events: Vec<PixelEvent> = (0..planes.height())
                .filter_map(|y| {
                    let brightness = planes.luma_at(x, y);
                    (brightness > self.threshold).then(|| PixelEvent {
                        row: y,
                        brightness,
                        color: planes.rgb_at(x, y),
                    })
                })
                .collect();

            if !events.is_empty() {
                columns.push(TimeStepColumn { index: x, events });
            }
        }

        ScanDocument {
            width: planes.width(),
            height: planes.height(),
            columns,
        }
    }

    /// Decodes and scans the image at `path`. Decoding failures carry the path.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanDocument> {
        let path = path.as_ref();
        let planes = ImagePlanes::open(path)?;
        let document = self.scan(&planes);
        tracing::debug!(
            path = %path.display(),
            columns = document.columns.len(),
            events = document.event_count(),
            "scanned image"
        );
        Ok(document)
    }
}
