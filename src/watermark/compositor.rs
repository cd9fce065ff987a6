use super::layout;
use super::types::{
    FontSet, ImageCodec, LineSlot, MeasuredLine, Rect, RenderedOutput, SourceImage, WatermarkText,
};
use super::WatermarkError;
use crate::WatermarkConfig;
use ab_glyph::PxScale;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use img_parts::ImageEXIF;
use tracing::debug;

/// Mean 8-bit luminance at or below this picks white glyphs, above it black.
/// Exactly the midpoint resolves to white.
const LUMINANCE_MIDPOINT: f32 = 128.0;

/// Renders the watermark onto the source pixels and re-encodes them,
/// consuming the source.
pub(crate) fn composite(
    source: SourceImage,
    text: &WatermarkText,
    fonts: &FontSet,
    config: &WatermarkConfig,
) -> Result<RenderedOutput, WatermarkError> {
    let SourceImage {
        mut pixels,
        codec,
        exif,
    } = source;
    let (width, height) = pixels.dimensions();

    let measured = measure_lines(text, fonts, config, width, height);
    let plan = layout::compute_layout(width, height, config, &measured);

    if !plan.is_empty() {
        apply_backdrop(&mut pixels, &plan.backdrop, config.blur_radius);

        for line in &plan.lines {
            let color = glyph_color(mean_luminance(&pixels, &line.rect));
            let font = match line.slot {
                LineSlot::Time => fonts.time.as_ref(),
                LineSlot::Location => fonts.location.as_ref(),
            };
            draw_text_mut(
                &mut pixels,
                color,
                line.rect.x as i32,
                line.rect.y as i32,
                PxScale::from(line.font_px as f32),
                font,
                &line.text,
            );
        }
    } else {
        debug!("no watermark lines available; re-encoding unchanged");
    }

    encode_output(pixels, codec, exif.as_deref(), config)
}

/// Measures the text lines in top-to-bottom drawing order: location above
/// time when both are present.
fn measure_lines(
    text: &WatermarkText,
    fonts: &FontSet,
    config: &WatermarkConfig,
    width: u32,
    height: u32,
) -> Vec<MeasuredLine> {
    let mut lines = Vec::new();

    if let Some(location) = &text.location_text {
        let px = layout::font_px(config.location_font_size_ratio, width, height);
        let (w, h) = text_size(PxScale::from(px as f32), fonts.location.as_ref(), location);
        lines.push(MeasuredLine {
            slot: LineSlot::Location,
            text: location.clone(),
            font_px: px,
            width: w,
            height: h,
        });
    }

    if let Some(time) = &text.time_text {
        let px = layout::font_px(config.time_font_size_ratio, width, height);
        let (w, h) = text_size(PxScale::from(px as f32), fonts.time.as_ref(), time);
        lines.push(MeasuredLine {
            slot: LineSlot::Time,
            text: time.clone(),
            font_px: px,
            width: w,
            height: h,
        });
    }

    lines
}

/// Blurs only the backdrop rectangle, leaving every other pixel untouched.
fn apply_backdrop(pixels: &mut RgbaImage, rect: &Rect, blur_radius: f32) {
    if rect.width == 0 || rect.height == 0 || blur_radius <= 0.0 {
        return;
    }
    let region = image::imageops::crop_imm(pixels, rect.x, rect.y, rect.width, rect.height)
        .to_image();
    let blurred = imageproc::filter::gaussian_blur_f32(&region, blur_radius);
    image::imageops::replace(pixels, &blurred, rect.x as i64, rect.y as i64);
}

fn mean_luminance(pixels: &RgbaImage, rect: &Rect) -> f32 {
    let x_end = rect.right().min(pixels.width());
    let y_end = rect.bottom().min(pixels.height());
    let mut total = 0.0f64;
    let mut count = 0u64;

    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let p = pixels.get_pixel(x, y);
            total +=
                0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    (total / count as f64) as f32
}

fn glyph_color(mean_luminance: f32) -> Rgba<u8> {
    if mean_luminance > LUMINANCE_MIDPOINT {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([255, 255, 255, 255])
    }
}

fn encode_output(
    pixels: RgbaImage,
    codec: ImageCodec,
    exif: Option<&[u8]>,
    config: &WatermarkConfig,
) -> Result<RenderedOutput, WatermarkError> {
    let data = match codec {
        ImageCodec::Jpeg => {
            debug!(
                "encoding JPEG at quality {} (subsampling {} requested; the encoder owns sampling)",
                config.jpeg_quality, config.jpeg_subsampling
            );
            let rgb = DynamicImage::ImageRgba8(pixels).to_rgb8();
            let mut data = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut data, config.jpeg_quality);
            rgb.write_with_encoder(encoder)
                .map_err(WatermarkError::Encode)?;

            match exif {
                Some(blob) => {
                    let mut jpeg =
                        img_parts::jpeg::Jpeg::from_bytes(img_parts::Bytes::from(data))?;
                    jpeg.set_exif(Some(img_parts::Bytes::copy_from_slice(blob)));
                    let mut merged = Vec::new();
                    jpeg.encoder().write_to(&mut merged)?;
                    merged
                }
                None => data,
            }
        }
        ImageCodec::Png => {
            if exif.is_some() {
                debug!("PNG output cannot carry the original metadata block; skipping reattachment");
            }
            let mut data = Vec::new();
            let encoder = PngEncoder::new(&mut data);
            pixels
                .write_with_encoder(encoder)
                .map_err(WatermarkError::Encode)?;
            data
        }
    };

    Ok(RenderedOutput { data, codec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_fonts() -> Option<FontSet> {
        let font_path = std::path::Path::new("static/DejaVuSans.ttf");
        if !font_path.exists() {
            return None;
        }
        let data = std::fs::read(font_path).unwrap();
        let font = Arc::new(ab_glyph::FontVec::try_from_vec(data).unwrap());
        Some(FontSet {
            time: font.clone(),
            location: font,
        })
    }

    #[test]
    fn glyph_color_is_white_at_exact_midpoint() {
        assert_eq!(glyph_color(128.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn glyph_color_is_black_on_light_background() {
        assert_eq!(glyph_color(128.1), Rgba([0, 0, 0, 255]));
        assert_eq!(glyph_color(255.0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn glyph_color_is_white_on_dark_background() {
        assert_eq!(glyph_color(0.0), Rgba([255, 255, 255, 255]));
        assert_eq!(glyph_color(127.9), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn mean_luminance_of_uniform_gray_region() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]));
        let rect = Rect {
            x: 8,
            y: 8,
            width: 32,
            height: 32,
        };
        let mean = mean_luminance(&img, &rect);
        assert!((mean - 128.0).abs() < 0.5);
    }

    #[test]
    fn mean_luminance_of_empty_region_defaults_dark() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let rect = Rect {
            x: 4,
            y: 4,
            width: 0,
            height: 0,
        };
        assert_eq!(mean_luminance(&img, &rect), 0.0);
        assert_eq!(glyph_color(0.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn backdrop_blur_leaves_outside_pixels_untouched() {
        let mut img = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255])
        });
        let original = img.clone();
        let rect = Rect {
            x: 16,
            y: 16,
            width: 24,
            height: 24,
        };
        apply_backdrop(&mut img, &rect, 4.0);

        for (x, y, pixel) in img.enumerate_pixels() {
            let inside =
                x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            if !inside {
                assert_eq!(pixel, original.get_pixel(x, y), "pixel ({x},{y}) changed");
            }
        }
    }

    #[test]
    fn png_round_trip_preserves_dimensions() {
        let pixels = RgbaImage::from_pixel(37, 23, Rgba([10, 20, 30, 255]));
        let config = WatermarkConfig::default();
        let output = encode_output(pixels, ImageCodec::Png, None, &config).unwrap();
        let decoded = image::load_from_memory(&output.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (37, 23));
    }

    #[test]
    fn jpeg_output_carries_reattached_exif() {
        let pixels = RgbaImage::from_pixel(40, 30, Rgba([90, 90, 90, 255]));
        let config = WatermarkConfig::default();
        let blob: Vec<u8> = vec![0x49, 0x49, 0x2a, 0x00, 0x08, 0x00, 0x00, 0x00];
        let output = encode_output(pixels, ImageCodec::Jpeg, Some(&blob), &config).unwrap();

        let decoded = image::load_from_memory(&output.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));

        let jpeg = img_parts::jpeg::Jpeg::from_bytes(img_parts::Bytes::from(output.data))
            .unwrap();
        assert_eq!(jpeg.exif().unwrap().as_ref(), blob.as_slice());
    }

    #[test]
    fn composite_renders_with_time_line_only() {
        let Some(fonts) = test_fonts() else {
            return;
        };
        let pixels = RgbaImage::from_pixel(800, 600, Rgba([40, 40, 40, 255]));
        let mut png = Vec::new();
        pixels
            .write_with_encoder(PngEncoder::new(&mut png))
            .unwrap();

        let source = SourceImage::decode(&png).unwrap();
        let text = WatermarkText {
            time_text: Some("2024-05-01  10:30:00".to_string()),
            location_text: None,
        };
        let config = WatermarkConfig::default();
        let output = composite(source, &text, &fonts, &config).unwrap();

        let decoded = image::load_from_memory(&output.data).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (800, 600));
        assert!(decoded.pixels().any(|p| p[0] > 200 && p[1] > 200 && p[2] > 200));
    }

    #[test]
    fn composite_draws_both_lines() {
        let Some(fonts) = test_fonts() else {
            return;
        };
        let pixels = RgbaImage::from_pixel(800, 600, Rgba([40, 40, 40, 255]));
        let mut png = Vec::new();
        pixels
            .write_with_encoder(PngEncoder::new(&mut png))
            .unwrap();

        let source = SourceImage::decode(&png).unwrap();
        let text = WatermarkText {
            time_text: Some("2024-05-01  10:30:00".to_string()),
            location_text: Some("Hangzhou".to_string()),
        };
        let config = WatermarkConfig::default();
        let output = composite(source, &text, &fonts, &config).unwrap();

        let decoded = image::load_from_memory(&output.data).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (800, 600));
        // White glyphs must have landed somewhere on the dark background.
        assert!(decoded.pixels().any(|p| p[0] > 200 && p[1] > 200 && p[2] > 200));
    }
}
