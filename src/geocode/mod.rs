pub mod error;
pub mod providers;

pub use error::GeocodeError;

use crate::exif::GpsCoordinates;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Turns coordinates into a human-readable place name. Failure here is
    /// always recoverable: the pipeline drops the location line and moves on.
    async fn resolve(&self, coords: &GpsCoordinates) -> Result<String, GeocodeError>;
    fn name(&self) -> &str;
}

pub type DynReverseGeocoder = Arc<dyn ReverseGeocoder>;

pub fn create_provider(
    config: &crate::GeocodingConfig,
) -> Result<DynReverseGeocoder, GeocodeError> {
    match config.provider.as_str() {
        "amap" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                GeocodeError::Config("provider \"amap\" requires an api_key".to_string())
            })?;
            Ok(Arc::new(providers::amap::AmapProvider::new(
                api_key,
                config.timeout_seconds,
            )?))
        }
        "null" | "none" => Ok(Arc::new(providers::null::NullProvider::new())),
        other => Err(GeocodeError::Config(format!(
            "unknown geocoding provider: {}",
            other
        ))),
    }
}
