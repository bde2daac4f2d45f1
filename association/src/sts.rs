// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Cross-account credentials through the AWS Security Token Service (STS).
//!
//! The broker exchanges the handler's own identity for short-lived
//! [`HubCredentials`] in the hub account. Credentials are never cached: each
//! invocation assumes the role again and drops the result when it returns.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_sts::Client as StsClient;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata};

use crate::constants::{MAX_SESSION_NAME_LENGTH, MIN_SESSION_NAME_LENGTH, SESSION_NAME_PREFIX};
use crate::errors::AssociationError;
use crate::models::HubCredentials;

#[async_trait]
pub trait StsBroker: Send + Sync {
    /// Assumes `role_arn`. Failures are not retried.
    async fn assume(
        &self,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<HubCredentials, AssociationError>;
}

/// Derives an STS session name from a logical resource id.
///
/// The result is deterministic, at most 64 characters, and only contains
/// `[A-Za-z0-9+=,.@-]`; any other character becomes `-`.
pub fn session_name(logical_resource_id: &str) -> String {
    let sanitized: String = logical_resource_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut name = if sanitized.is_empty() {
        SESSION_NAME_PREFIX.to_string()
    } else {
        format!("{SESSION_NAME_PREFIX}-{sanitized}")
    };
    // all characters are ASCII, so byte truncation is safe
    name.truncate(MAX_SESSION_NAME_LENGTH);
    debug_assert!(name.len() >= MIN_SESSION_NAME_LENGTH);
    name
}

pub struct AwsStsBroker {
    client: StsClient,
}

impl AwsStsBroker {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StsBroker for AwsStsBroker {
    #[tracing::instrument(skip(self))]
    async fn assume(
        &self,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<HubCredentials, AssociationError> {
        let duration_seconds = i32::try_from(duration.as_secs())
            .map_err(|_| AssociationError::invalid("session duration out of range"))?;

        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| AssociationError::AuthError {
                code: e.code().unwrap_or("Unknown").to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let credentials = output
            .credentials()
            .ok_or_else(|| AssociationError::AuthError {
                code: "MissingCredentials".to_string(),
                message: "STS AssumeRole returned no credentials".to_string(),
            })?;

        let expiry = SystemTime::try_from(*credentials.expiration()).map_err(|e| {
            AssociationError::AuthError {
                code: "InvalidExpiration".to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!("[phz] assumed {}, expires_at: {:?}", role_arn, expiry);

        Ok(HubCredentials {
            access_key: credentials.access_key_id().to_string(),
            secret_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiry,
        })
    }
}

/// Return the current caller account ID using STS GetCallerIdentity.
///
/// Used at startup to detect when the hub and the spoke are the same account.
pub async fn caller_account_id(client: &StsClient) -> Result<String, AssociationError> {
    let out = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| AssociationError::AuthError {
            code: e.code().unwrap_or("Unknown").to_string(),
            message: DisplayErrorContext(&e).to_string(),
        })?;
    out.account()
        .map(str::to_string)
        .ok_or_else(|| AssociationError::AuthError {
            code: "MissingAccount".to_string(),
            message: "STS GetCallerIdentity returned no account".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_allowed(c: char) -> bool {
        c.is_ascii_alphanumeric() || "+=,.@-".contains(c)
    }

    #[test]
    fn test_session_name_is_deterministic() {
        assert_eq!(session_name("SsmAssociation"), session_name("SsmAssociation"));
        assert_eq!(session_name("SsmAssociation"), "phz-assoc-SsmAssociation");
    }

    #[test]
    fn test_session_name_replaces_invalid_characters() {
        let name = session_name("Endpoint/Assoc_1 (ssm)");
        assert_eq!(name, "phz-assoc-Endpoint-Assoc-1--ssm-");
        assert!(name.chars().all(is_allowed));
    }

    #[test]
    fn test_session_name_is_bounded() {
        let name = session_name(&"x".repeat(200));
        assert_eq!(name.len(), MAX_SESSION_NAME_LENGTH);
        assert!(name.chars().all(is_allowed));

        let name = session_name(&"é".repeat(100));
        assert_eq!(name.len(), MAX_SESSION_NAME_LENGTH);
        assert!(name.chars().all(is_allowed));
    }

    #[test]
    fn test_session_name_for_empty_id() {
        assert_eq!(session_name(""), SESSION_NAME_PREFIX);
    }
}
