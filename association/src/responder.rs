// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Delivery of custom resource responses to the engine's pre-signed URL.
//!
//! The URL is an S3 pre-signed PUT; the signature covers an empty
//! content type, so the header is sent explicitly empty.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::errors::AppError;
use crate::models::ProvisioningResponse;

pub struct Responder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Responder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// PUTs `response` to `url`.
    ///
    /// # Errors
    ///
    /// - [`AppError::DeliveryError`] - the request failed or returned a non-2xx status
    #[tracing::instrument(skip_all, fields(physical_resource_id = %response.physical_resource_id))]
    pub async fn send(&self, url: &str, response: &ProvisioningResponse) -> Result<(), AppError> {
        let body = serde_json::to_vec(response)?;

        let reply = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = reply.status();
        if !status.is_success() {
            return Err(AppError::DeliveryError(format!(
                "response URL returned {status}"
            )));
        }

        tracing::debug!("[phz] delivered response ({})", status);

        Ok(())
    }
}
