// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the association endpoint.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | POST | `/events` | [`events`] | Process a custom resource lifecycle event |

use std::sync::Arc;

use crate::application::AppState;
use crate::errors::AppError;
use crate::models::{ProvisioningEvent, ProvisioningResponse};

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

/// Health check endpoint.
///
/// # Response
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Processes a lifecycle event and returns the engine response.
///
/// Failed associations are reported in the body with `Status: FAILED`; the
/// HTTP status is only non-2xx when the response could not be delivered to
/// the event's `ResponseURL`.
#[tracing::instrument(skip_all)]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ProvisioningEvent>,
) -> Result<Json<ProvisioningResponse>, AppError> {
    let response = state.adapter.handle_event(event).await?;

    Ok(Json(response))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::to_bytes;
    use axum::http::StatusCode;

    use crate::adapter::ProvisioningAdapter;
    use crate::configuration::Config;
    use crate::handler::AssociationHandler;
    use crate::memory::InMemoryCloud;
    use crate::models::ResponseStatus;
    use crate::retry::RetryPolicy;

    // Integration tests using TestServer are in tests/http_integration.rs

    fn state(cloud: &InMemoryCloud) -> Arc<AppState> {
        let config = Config {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let handler =
            AssociationHandler::new(config, Arc::new(cloud.clone()), Arc::new(cloud.clone()))
                .with_retry_policy(RetryPolicy {
                    base_delay: Duration::ZERO,
                    ..Default::default()
                });
        Arc::new(AppState {
            adapter: Arc::new(ProvisioningAdapter::new(handler)),
        })
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_events_reports_failure_in_body() {
        let cloud = InMemoryCloud::new();
        let event: ProvisioningEvent = serde_json::from_value(json!({
            "RequestType": "Create",
            "StackId": "stack",
            "RequestId": "req-1",
            "LogicalResourceId": "Assoc",
            "ResourceProperties": {"VpcId": "vpc-aaaa"}
        }))
        .unwrap();

        let Json(response) = events(State(state(&cloud)), Json(event)).await.unwrap();

        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.physical_resource_id, "failed::Assoc");
        assert!(cloud.calls().is_empty());
    }
}
