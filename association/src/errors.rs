// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failures surfaced by the association workflow.
///
/// Every variant carries a stable code (see [`AssociationError::code`]) that
/// prefixes the `Reason` reported to the deployment engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AssociationError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("unable to assume hub role ({code}): {message}")]
    AuthError { code: String, message: String },
    #[error("{0}")]
    AuthorizationFailed(String),
    #[error("{0}")]
    AssociationFailed(String),
    #[error("{0}")]
    Throttled(String),
    #[error("{0}")]
    Timeout(String),
    #[error(
        "{physical_resource_id} is associated but the previous association \
         assoc::{leaked_hosted_zone_id}::{leaked_vpc_id} was not removed: {source}"
    )]
    PartialSuccess {
        physical_resource_id: String,
        leaked_hosted_zone_id: String,
        leaked_vpc_id: String,
        source: Box<AssociationError>,
    },
}

impl AssociationError {
    /// Returns the stable error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::AuthError { .. } => "AuthError",
            Self::AuthorizationFailed(_) => "AuthorizationFailed",
            Self::AssociationFailed(_) => "AssociationFailed",
            Self::Throttled(_) => "Throttled",
            Self::Timeout(_) => "Timeout",
            Self::PartialSuccess { .. } => "PartialSuccess",
        }
    }

    /// Renders `"<Code>: <message>"` for the engine response.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.code(), self)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<validator::ValidationErrors> for AssociationError {
    fn from(source: validator::ValidationErrors) -> Self {
        AssociationError::InvalidInput(source.to_string())
    }
}

/// Errors of the HTTP surface.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("unable to deliver response: {0}")]
    DeliveryError(String),
    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::DeliveryError(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(source: reqwest::Error) -> Self {
        tracing::error!("[phz] {:?}", source);
        AppError::DeliveryError(source.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(source: serde_json::Error) -> Self {
        tracing::error!("[phz] {:?}", source);
        AppError::InternalServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_starts_with_code() {
        let err = AssociationError::AuthError {
            code: "AccessDenied".to_string(),
            message: "not authorized to perform sts:AssumeRole".to_string(),
        };
        assert!(err.reason().starts_with("AuthError: "));
        assert!(err.reason().contains("AccessDenied"));
    }

    #[test]
    fn test_partial_success_names_both_ids() {
        let err = AssociationError::PartialSuccess {
            physical_resource_id: "assoc::Z123::vpc-bbbb".to_string(),
            leaked_hosted_zone_id: "Z123".to_string(),
            leaked_vpc_id: "vpc-aaaa".to_string(),
            source: Box::new(AssociationError::AssociationFailed("boom".to_string())),
        };
        let reason = err.reason();
        assert!(reason.starts_with("PartialSuccess: "));
        assert!(reason.contains("assoc::Z123::vpc-bbbb"));
        assert!(reason.contains("assoc::Z123::vpc-aaaa"));
        assert!(reason.contains("boom"));
    }

    #[test]
    fn test_codes_are_stable() {
        let codes = [
            AssociationError::invalid("x").code(),
            AssociationError::AuthorizationFailed("x".into()).code(),
            AssociationError::AssociationFailed("x".into()).code(),
            AssociationError::Throttled("x".into()).code(),
            AssociationError::Timeout("x".into()).code(),
        ];
        assert_eq!(
            codes,
            [
                "InvalidInput",
                "AuthorizationFailed",
                "AssociationFailed",
                "Throttled",
                "Timeout"
            ]
        );
    }
}
