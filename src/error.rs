//! Unified error handling for the runaroute library.
//!
//! Every fallible operation in the crate returns [`RunaRouteError`]. None of
//! the variants trigger an automatic retry; retries are always initiated by
//! the caller (re-invoking a fetch or `start`).

use thiserror::Error;

use crate::session::SessionState;

/// Unified error type for runaroute operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum RunaRouteError {
    /// Location access was refused by the user or the platform.
    #[error("Location permission denied")]
    PermissionDenied,

    /// At least one candidate request in a batch failed; the batch is discarded.
    #[error("{}", fmt_with_status("Route fetch failed", message, *status_code))]
    RouteFetchFailed {
        message: String,
        status_code: Option<u16>,
    },

    /// Address suggestion lookup failed.
    #[error("Geocode fetch failed: {message}")]
    GeocodeFetchFailed { message: String },

    /// Forecast lookup failed.
    #[error("{}", fmt_with_status("Weather fetch failed", message, *status_code))]
    WeatherFetchFailed {
        message: String,
        status_code: Option<u16>,
    },

    /// A tracker operation was invoked from a state that does not allow it.
    #[error("Cannot {operation} a session that is {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn fmt_with_status(prefix: &str, message: &str, status_code: Option<u16>) -> String {
    match status_code {
        Some(code) => format!("{} (HTTP {}): {}", prefix, code, message),
        None => format!("{}: {}", prefix, message),
    }
}

impl RunaRouteError {
    pub(crate) fn route_fetch(message: impl Into<String>, status_code: Option<u16>) -> Self {
        RunaRouteError::RouteFetchFailed {
            message: message.into(),
            status_code,
        }
    }

    pub(crate) fn geocode_fetch(message: impl Into<String>) -> Self {
        RunaRouteError::GeocodeFetchFailed {
            message: message.into(),
        }
    }

    pub(crate) fn weather_fetch(message: impl Into<String>, status_code: Option<u16>) -> Self {
        RunaRouteError::WeatherFetchFailed {
            message: message.into(),
            status_code,
        }
    }
}

/// Result type alias for runaroute operations.
pub type Result<T> = std::result::Result<T, RunaRouteError>;

/// Extension trait for converting Option to RunaRouteError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a route fetch error.
    fn ok_or_route_fetch(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_route_fetch(self, message: &str) -> Result<T> {
        self.ok_or_else(|| RunaRouteError::route_fetch(message, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RunaRouteError::route_fetch("HTTP 403 Forbidden", Some(403));
        assert_eq!(
            err.to_string(),
            "Route fetch failed (HTTP 403): HTTP 403 Forbidden"
        );

        let err = RunaRouteError::InvalidTransition {
            from: SessionState::Paused,
            operation: "pause",
        };
        assert_eq!(err.to_string(), "Cannot pause a session that is paused");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_route_fetch("no features in response");
        assert!(matches!(
            result,
            Err(RunaRouteError::RouteFetchFailed {
                status_code: None,
                ..
            })
        ));

        assert_eq!(Some(3).ok_or_route_fetch("unused"), Ok(3));
    }
}
