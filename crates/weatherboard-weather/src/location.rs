//! Sources of the device position used for the current-location card.

use crate::types::{Coordinates, LocationError};
use std::future::Future;

pub trait LocationSource {
    fn current_position(&self) -> impl Future<Output = Result<Coordinates, LocationError>> + Send;
}

/// Position taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl LocationSource for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// No geolocation available on this system
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationSource for NoLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let coords = Coordinates {
            latitude: 59.91,
            longitude: 10.75,
        };
        assert_eq!(FixedLocation(coords).current_position().await.unwrap(), coords);
    }

    #[tokio::test]
    async fn test_no_location_is_unsupported() {
        let err = NoLocation.current_position().await.unwrap_err();
        assert!(matches!(err, LocationError::Unsupported));
    }
}
