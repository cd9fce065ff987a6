mod compositor;
mod error;
pub mod layout;
mod types;

pub use error::WatermarkError;
pub use types::*;

use crate::exif::{self, CaptureInfo};
use crate::geocode::{DynReverseGeocoder, ReverseGeocoder};
use ab_glyph::FontVec;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One pipeline serves every front end: batch, REST, and the stream handler.
/// Fonts load once at construction; compositing runs on the blocking pool.
pub struct WatermarkPipeline {
    config: crate::WatermarkConfig,
    fonts: FontSet,
    geocoder: DynReverseGeocoder,
}

impl WatermarkPipeline {
    pub fn new(
        config: crate::WatermarkConfig,
        geocoder: DynReverseGeocoder,
    ) -> Result<Self, WatermarkError> {
        let time = Arc::new(load_font(&config.time_font_path)?);
        let location = if config.location_font_path == config.time_font_path {
            time.clone()
        } else {
            Arc::new(load_font(&config.location_font_path)?)
        };

        Ok(Self {
            config,
            fonts: FontSet { time, location },
            geocoder,
        })
    }

    /// Watermarks one image. Missing metadata and failed geocoding degrade
    /// the overlay line by line; only decode/encode problems are errors.
    pub async fn process(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<RenderedOutput, WatermarkError> {
        let capture = exif::read_capture_info(&bytes);
        let text = assemble_text(self.geocoder.as_ref(), &capture, filename).await;

        let config = self.config.clone();
        let fonts = self.fonts.clone();

        tokio::task::spawn_blocking(move || {
            let source = SourceImage::decode(&bytes)?;
            compositor::composite(source, &text, &fonts, &config)
        })
        .await?
    }
}

/// Builds the overlay lines from whatever metadata is available. Each line
/// degrades independently: no timestamp drops the time line, and a geocoder
/// failure drops the location line without touching the other.
async fn assemble_text(
    geocoder: &dyn ReverseGeocoder,
    capture: &CaptureInfo,
    filename: &str,
) -> WatermarkText {
    let time_text = capture.timestamp.as_ref().map(exif::format_timestamp);
    if time_text.is_none() {
        debug!("no capture timestamp in {}", filename);
    }

    let location_text = match &capture.gps {
        Some(coords) => match geocoder.resolve(coords).await {
            Ok(place) => Some(place),
            Err(e) => {
                warn!("reverse geocoding failed for {}: {}", filename, e);
                None
            }
        },
        None => None,
    };

    WatermarkText {
        time_text,
        location_text,
    }
}

fn load_font(path: &Path) -> Result<FontVec, WatermarkError> {
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|_| WatermarkError::Font(format!("failed to parse font {}", path.display())))
}
