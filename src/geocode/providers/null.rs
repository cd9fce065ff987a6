use crate::exif::GpsCoordinates;
use crate::geocode::{GeocodeError, ReverseGeocoder};
use async_trait::async_trait;
use tracing::info;

/// Stand-in provider for deployments without a geocoding credential.
/// Every lookup fails softly, so images keep their time line.
pub struct NullProvider;

impl NullProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReverseGeocoder for NullProvider {
    async fn resolve(&self, coords: &GpsCoordinates) -> Result<String, GeocodeError> {
        info!(
            "NULL GEOCODER - would resolve ({:.6}, {:.6})",
            coords.latitude, coords.longitude
        );
        Err(GeocodeError::NotConfigured)
    }

    fn name(&self) -> &str {
        "Null Geocoder (Logging Only)"
    }
}
