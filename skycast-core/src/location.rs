//! Single-shot device location lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{config::GeolocationConfig, error::GeolocationError, model::Coordinates};

#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Whether this device can produce a position at all.
    fn is_available(&self) -> bool;

    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Geolocator for devices without any location capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeolocation;

#[async_trait]
impl Geolocator for NoGeolocation {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Always reports the same coordinates, e.g. ones given on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Geolocator for FixedLocation {
    fn is_available(&self) -> bool {
        true
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        validate(self.0)
    }
}

/// Approximates the device position from its public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    lookup_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpGeolocator {
    pub fn new(lookup_url: impl Into<String>, timeout: Duration) -> Result<Self, GeolocationError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;
        Ok(Self { lookup_url: lookup_url.into(), http })
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip(self))]
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        let res = self.http.get(&self.lookup_url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeolocationError::Timeout
            } else {
                GeolocationError::PositionUnavailable(e.to_string())
            }
        })?;

        let status = res.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GeolocationError::PermissionDenied);
        }
        if !status.is_success() {
            return Err(GeolocationError::PositionUnavailable(format!(
                "lookup failed with status {status}"
            )));
        }

        let parsed: IpLookupResponse = res
            .json()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;

        if parsed.status != "success" {
            return Err(GeolocationError::PositionUnavailable(
                parsed.message.unwrap_or_else(|| "lookup unsuccessful".to_string()),
            ));
        }

        match (parsed.lat, parsed.lon) {
            (Some(latitude), Some(longitude)) => {
                debug!(latitude, longitude, url = %self.lookup_url, "resolved position");
                validate(Coordinates { latitude, longitude })
            }
            _ => Err(GeolocationError::PositionUnavailable("lookup returned no position".into())),
        }
    }
}

/// Build the geolocator described by the config.
pub fn geolocator_from_config(
    config: &GeolocationConfig,
    timeout: Duration,
) -> Box<dyn Geolocator> {
    if !config.enabled {
        return Box::new(NoGeolocation);
    }
    match IpGeolocator::new(config.lookup_url.clone(), timeout) {
        Ok(geo) => Box::new(geo),
        Err(e) => {
            tracing::warn!(error = %e, "geolocation disabled");
            Box::new(NoGeolocation)
        }
    }
}

fn validate(coords: Coordinates) -> Result<Coordinates, GeolocationError> {
    if !(-90.0..=90.0).contains(&coords.latitude) || !(-180.0..=180.0).contains(&coords.longitude) {
        return Err(GeolocationError::PositionUnavailable(format!(
            "invalid coordinates ({}, {})",
            coords.latitude, coords.longitude
        )));
    }
    Ok(coords)
}
