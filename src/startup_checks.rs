use crate::Config;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Font file missing: {0}")]
    FontMissing(String),

    #[error("Failed to create output directory: {0}")]
    OutputDirectoryCreationFailed(std::io::Error),

    #[error("Batch input directory does not exist: {0}")]
    InputDirectoryMissing(String),

    #[error("Geocoding misconfigured: {0}")]
    GeocodingMisconfigured(String),

    #[error("No API token configured - service accepts unauthenticated uploads")]
    NoApiToken,

    #[error("jpeg_subsampling = {0} is ignored; the JPEG encoder owns chroma sampling")]
    JpegSubsamplingIgnored(u8),
}

impl StartupCheckError {
    /// Critical errors abort startup; the rest log and continue.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::FontMissing(_)
                | StartupCheckError::OutputDirectoryCreationFailed(_)
                | StartupCheckError::InputDirectoryMissing(_)
        )
    }
}

pub async fn perform_startup_checks(
    config: &Config,
    batch_mode: bool,
) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Fonts are the one asset the pipeline cannot run without.
    let mut font_paths = vec![&config.watermark.time_font_path];
    if config.watermark.location_font_path != config.watermark.time_font_path {
        font_paths.push(&config.watermark.location_font_path);
    }
    for font_path in font_paths {
        if font_path.exists() {
            info!("Font file found: {:?}", font_path);
        } else {
            error!("Font file missing: {:?}", font_path);
            errors.push(StartupCheckError::FontMissing(
                font_path.display().to_string(),
            ));
        }
    }

    if batch_mode {
        let input_dir = &config.batch.input_directory;
        if input_dir.exists() {
            info!("Batch input directory exists: {:?}", input_dir);
        } else {
            error!("Batch input directory does not exist: {:?}", input_dir);
            errors.push(StartupCheckError::InputDirectoryMissing(
                input_dir.display().to_string(),
            ));
        }

        let output_dir = &config.batch.output_directory;
        if !output_dir.exists() {
            info!("Output directory does not exist, creating: {:?}", output_dir);
            if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
                error!("Failed to create output directory: {}", e);
                errors.push(StartupCheckError::OutputDirectoryCreationFailed(e));
            }
        } else {
            info!("Output directory exists: {:?}", output_dir);
        }
    }

    match config.geocoding.provider.as_str() {
        "amap" if config.geocoding.api_key.is_none() => {
            error!("Geocoding provider 'amap' selected but no api_key configured");
            errors.push(StartupCheckError::GeocodingMisconfigured(
                "provider 'amap' requires an api_key".to_string(),
            ));
        }
        "null" | "none" => {
            warn!("No geocoding provider configured - location lines will be omitted");
        }
        other => {
            info!("Geocoding provider configured: {}", other);
        }
    }

    if config.app.api_token.is_none() && !batch_mode {
        warn!("No API token configured - uploads are unauthenticated");
        errors.push(StartupCheckError::NoApiToken);
    }

    if config.watermark.jpeg_subsampling != 0 {
        warn!(
            "jpeg_subsampling = {} has no effect; the JPEG encoder owns chroma sampling",
            config.watermark.jpeg_subsampling
        );
        errors.push(StartupCheckError::JpegSubsamplingIgnored(
            config.watermark.jpeg_subsampling,
        ));
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
