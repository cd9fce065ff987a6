use crate::exif::GpsCoordinates;
use crate::geocode::{GeocodeError, ReverseGeocoder};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

const REGEO_URL: &str = "https://restapi.amap.com/v3/geocode/regeo";

/// Reverse geocoding via the Amap regeo REST API. The HTTP client carries a
/// hard timeout so a slow upstream can only ever cost one bounded wait.
pub struct AmapProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AmapProvider {
    pub fn new(api_key: String, timeout_seconds: u64) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl ReverseGeocoder for AmapProvider {
    async fn resolve(&self, coords: &GpsCoordinates) -> Result<String, GeocodeError> {
        // Amap expects "longitude,latitude".
        let location = format!("{:.6},{:.6}", coords.longitude, coords.latitude);
        debug!("amap regeo lookup for {}", location);

        let response: RegeoResponse = self
            .client
            .get(REGEO_URL)
            .query(&[("key", self.api_key.as_str()), ("location", &location)])
            .send()
            .await?
            .json()
            .await?;

        Ok(place_name(&response, coords))
    }

    fn name(&self) -> &str {
        "Amap Reverse Geocoder"
    }
}

/// Joins province/city/district when the lookup succeeded; any degraded
/// response falls back to fixed-point coordinates so the caller still gets a
/// usable location line.
fn place_name(response: &RegeoResponse, coords: &GpsCoordinates) -> String {
    if response.status == "1" {
        if let Some(address) = response
            .regeocode
            .as_ref()
            .and_then(|r| r.address_component.as_ref())
        {
            let joined: String = [&address.province, &address.city, &address.district]
                .iter()
                .filter(|part| !part.is_empty())
                .map(|part| part.as_str())
                .collect();
            if !joined.is_empty() {
                return joined;
            }
        }
    }
    coords.format_fixed()
}

#[derive(Debug, Deserialize)]
struct RegeoResponse {
    #[serde(default)]
    status: String,
    regeocode: Option<Regeocode>,
}

#[derive(Debug, Deserialize)]
struct Regeocode {
    #[serde(rename = "addressComponent")]
    address_component: Option<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    #[serde(default, deserialize_with = "string_or_empty")]
    province: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    city: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    district: String,
}

/// Amap encodes "no value" as an empty JSON array instead of a string.
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}
