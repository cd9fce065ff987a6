use super::WatermarkError;
use ab_glyph::FontVec;
use image::{ImageFormat, RgbaImage};
use img_parts::ImageEXIF;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Jpeg,
    Png,
}

impl ImageCodec {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "image/jpeg",
            ImageCodec::Png => "image/png",
        }
    }
}

/// Decoded pixels plus everything needed to re-encode faithfully.
/// Owned by a single pipeline invocation and consumed by the compositor.
pub struct SourceImage {
    pub pixels: RgbaImage,
    pub codec: ImageCodec,
    /// Raw EXIF segment of the original file, reattached verbatim on the
    /// JPEG encode path.
    pub exif: Option<Vec<u8>>,
}

impl SourceImage {
    pub fn decode(bytes: &[u8]) -> Result<SourceImage, WatermarkError> {
        let format = image::guess_format(bytes).map_err(|_| {
            WatermarkError::UnsupportedFormat("unrecognized image signature".to_string())
        })?;

        let codec = match format {
            ImageFormat::Jpeg => ImageCodec::Jpeg,
            ImageFormat::Png => ImageCodec::Png,
            other => return Err(WatermarkError::UnsupportedFormat(format!("{:?}", other))),
        };

        let pixels = image::load_from_memory_with_format(bytes, format)
            .map_err(WatermarkError::Decode)?
            .to_rgba8();

        let exif = match codec {
            ImageCodec::Jpeg => img_parts::jpeg::Jpeg::from_bytes(
                img_parts::Bytes::copy_from_slice(bytes),
            )
            .ok()
            .and_then(|jpeg| jpeg.exif())
            .map(|blob| blob.to_vec()),
            ImageCodec::Png => None,
        };

        Ok(SourceImage {
            pixels,
            codec,
            exif,
        })
    }
}

/// The lines to overlay. Either may be absent; an absent line is simply
/// not rendered and never blocks the other.
#[derive(Debug, Clone, Default)]
pub struct WatermarkText {
    pub time_text: Option<String>,
    pub location_text: Option<String>,
}

impl WatermarkText {
    pub fn is_empty(&self) -> bool {
        self.time_text.is_none() && self.location_text.is_none()
    }
}

/// Which configured font and size ratio a text line uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSlot {
    Time,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// A text line measured by the caller. Layout is pure arithmetic over these.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredLine {
    pub slot: LineSlot,
    pub text: String,
    pub font_px: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub slot: LineSlot,
    pub text: String,
    pub font_px: u32,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    /// Top-to-bottom drawing order.
    pub lines: Vec<PlannedLine>,
    pub backdrop: Rect,
}

impl LayoutPlan {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The two fonts the overlay draws with, shared across blocking tasks.
#[derive(Clone)]
pub struct FontSet {
    pub time: Arc<FontVec>,
    pub location: Arc<FontVec>,
}

/// Encoded output ready to hand back to a front end.
pub struct RenderedOutput {
    pub data: Vec<u8>,
    pub codec: ImageCodec,
}
