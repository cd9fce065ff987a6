use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("failed to carry image metadata: {0}")]
    Metadata(#[from] img_parts::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
