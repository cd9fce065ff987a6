use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding configuration error: {0}")]
    Config(String),

    #[error("no geocoding provider configured")]
    NotConfigured,

    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding lookup failed: {0}")]
    Lookup(String),
}
