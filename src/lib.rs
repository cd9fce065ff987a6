use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod api;
pub mod batch;
pub mod exif;
pub mod geocode;
pub mod startup_checks;
pub mod stream;
pub mod watermark;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub watermark: WatermarkConfig,
    pub geocoding: GeocodingConfig,
    pub batch: BatchConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    /// Shared secret for the REST `x-api-token` header and the stream
    /// header's `token` field. Absent means the service is open.
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub time_font_path: PathBuf,
    pub location_font_path: PathBuf,
    /// Font sizes and spacing scale with min(width, height) so the overlay
    /// reads the same on a thumbnail and a full-resolution frame.
    pub time_font_size_ratio: f32,
    pub location_font_size_ratio: f32,
    pub margin_ratio: f32,
    pub padding_ratio: f32,
    pub line_spacing: f32,
    pub blur_radius: f32,
    pub jpeg_quality: u8,
    /// Accepted for config compatibility only. The JPEG encoder owns chroma
    /// sampling, so this value has no effect on output; a non-default value
    /// is flagged at startup.
    pub jpeg_subsampling: u8,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_upload_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            app: AppConfig::default(),
            watermark: WatermarkConfig::default(),
            geocoding: GeocodingConfig::default(),
            batch: BatchConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Sukashi".to_string(),
            log_level: "info".to_string(),
            api_token: None,
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            time_font_path: PathBuf::from("static/DejaVuSans.ttf"),
            location_font_path: PathBuf::from("static/DejaVuSans.ttf"),
            time_font_size_ratio: 0.04,
            location_font_size_ratio: 0.03,
            margin_ratio: 0.02,
            padding_ratio: 0.01,
            line_spacing: 1.5,
            blur_radius: 10.0,
            jpeg_quality: 95,
            jpeg_subsampling: 0,
            extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
            ],
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            provider: "null".to_string(),
            api_key: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from("photos"),
            output_directory: PathBuf::from("watermarked"),
            max_concurrent: 4,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<watermark::WatermarkPipeline>,
    pub config: Config,
}

pub async fn create_app(config: Config) -> Result<Router, Box<dyn std::error::Error>> {
    let geocoder = geocode::create_provider(&config.geocoding)?;
    tracing::info!("Using geocoding provider: {}", geocoder.name());

    let pipeline = Arc::new(watermark::WatermarkPipeline::new(
        config.watermark.clone(),
        geocoder,
    )?);

    let app_state = AppState {
        pipeline,
        config: config.clone(),
    };

    let router = Router::new()
        .route("/", axum::routing::get(api::status_handler))
        .route(
            "/watermark/file",
            axum::routing::post(api::watermark_file_handler),
        )
        .route(
            "/watermark/stream",
            axum::routing::get(stream::handler::stream_handler),
        )
        .layer(DefaultBodyLimit::max(config.stream.max_upload_size as usize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let method = request.method();
                    let uri = request.uri();
                    let headers = request.headers();
                    let user_agent = headers
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %method,
                        path = %uri.path(),
                        query = ?uri.query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = response.status();
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %status,
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state);

    Ok(router)
}
