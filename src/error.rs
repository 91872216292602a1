//! Error taxonomy and HTTP response mapping
//!
//! Registration-time failures (unknown type names, duplicate routes) surface
//! as `Err` from `App::finish` so startup aborts before traffic is accepted.
//! Dispatch-time failures surface as server error responses rather than being
//! silently swallowed, since masking them would hand the client a stale or
//! broken fragment.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors produced by registration, path compilation, and dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// No convertor is registered under the declared type name.
    #[error("no convertor registered for type `{0}`")]
    UnknownType(String),

    /// The registration is inconsistent, or a request body arrived for a
    /// target that declares no payload.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request body could not populate the declared payload type, or a
    /// required parameter is missing.
    #[error("validation error: {0}")]
    Validation(String),

    /// A wire string could not be parsed, or a value did not match the
    /// registered concrete type.
    #[error("conversion failed for type `{type_name}`: {detail}")]
    Conversion { type_name: String, detail: String },

    /// A component failed while producing its element tree.
    #[error("render error: {0}")]
    Render(String),

    /// Socket-level failure from the serve helpers.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;

        tracing::error!("dispatch error: {} - {}", status, self);

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = Error::UnknownType("duration".to_string());
        assert_eq!(err.to_string(), "no convertor registered for type `duration`");

        let err = Error::Conversion {
            type_name: "int".to_string(),
            detail: "invalid digit found in string".to_string(),
        };
        assert!(err.to_string().contains("int"));
    }

    #[test]
    fn test_errors_map_to_server_error_responses() {
        let response = Error::Configuration("bad target".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::Validation("missing field".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
