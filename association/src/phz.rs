// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Outbound Private Hosted Zone calls and their outcome translation.
//!
//! Every call made against a hosted zone goes through [`execute`], which
//! applies the per-call deadline, retries [`FailureKind::Throttled`] with
//! [`RetryPolicy`] backoff, and consults [`BENIGN_OUTCOMES`] to turn
//! "already in the desired state" failures into success.
//!
//! | Call | Benign failure |
//! |------|----------------|
//! | `CreateVPCAssociationAuthorization` | `AlreadyAuthorized` |
//! | `DeleteVPCAssociationAuthorization` | `NotFound` |
//! | `AssociateVPCWithHostedZone` | `AlreadyAssociated` |
//! | `DisassociateVPCFromHostedZone` | `NotFound`, `InvalidVpc` |

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AssociationError;
use crate::models::{HubCredentials, ZonePair};
use crate::retry::RetryPolicy;

/// Raw hosted zone operations. One implementation per set of credentials.
#[async_trait]
pub trait HostedZoneApi: Send + Sync {
    async fn create_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure>;

    async fn delete_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure>;

    async fn associate_vpc_with_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiFailure>;

    async fn disassociate_vpc_from_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure>;
}

/// Builds hosted zone clients for the two principals of the workflow.
pub trait ZoneClients: Send + Sync {
    /// Client acting with the handler's own (spoke) credentials.
    fn spoke(&self) -> Arc<dyn HostedZoneApi>;

    /// Client acting with hub credentials minted for a single invocation.
    fn hub(&self, credentials: &HubCredentials) -> Arc<dyn HostedZoneApi>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneCall {
    Authorize,
    Deauthorize,
    Associate,
    Disassociate,
}

impl ZoneCall {
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Authorize => "CreateVPCAssociationAuthorization",
            Self::Deauthorize => "DeleteVPCAssociationAuthorization",
            Self::Associate => "AssociateVPCWithHostedZone",
            Self::Disassociate => "DisassociateVPCFromHostedZone",
        }
    }

    fn failure(&self, message: String) -> AssociationError {
        match self {
            Self::Authorize | Self::Deauthorize => AssociationError::AuthorizationFailed(message),
            Self::Associate | Self::Disassociate => AssociationError::AssociationFailed(message),
        }
    }
}

impl fmt::Display for ZoneCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AlreadyAuthorized,
    AlreadyAssociated,
    NotFound,
    /// The VPC no longer exists.
    InvalidVpc,
    NotAuthorized,
    Forbidden,
    LastAssociationForbidden,
    Throttled,
    Other,
}

/// A failed hosted zone call as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub kind: FailureKind,
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn new(kind: FailureKind, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Classifies a provider error code.
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match code {
            Some(
                "Throttling"
                | "ThrottlingException"
                | "PriorRequestNotComplete"
                | "TooManyRequestsException"
                | "RequestLimitExceeded"
                // overlapping changes to the same hosted zone
                | "ConcurrentModification",
            ) => FailureKind::Throttled,
            Some("VPCAssociationAuthorizationAlreadyExists" | "AlreadyAuthorized") => {
                FailureKind::AlreadyAuthorized
            }
            Some("HostedZoneAlreadyAssociated") => FailureKind::AlreadyAssociated,
            // Route 53 reports re-associating the same pair as a domain conflict
            Some("ConflictingDomainExists") if message.contains("already been associated") => {
                FailureKind::AlreadyAssociated
            }
            Some(
                "NoSuchHostedZone"
                | "VPCAssociationNotFound"
                | "VPCAssociationAuthorizationNotFound"
                | "NotFound",
            ) => FailureKind::NotFound,
            Some("InvalidVPCId") => FailureKind::InvalidVpc,
            Some("NotAuthorizedException") => FailureKind::NotAuthorized,
            Some("AccessDenied" | "AccessDeniedException" | "Forbidden") => FailureKind::Forbidden,
            Some("LastVPCAssociation") => FailureKind::LastAssociationForbidden,
            _ => FailureKind::Other,
        };
        Self::new(kind, code, message)
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Failures that mean the zone is already in the state the call asked for.
pub const BENIGN_OUTCOMES: &[(ZoneCall, FailureKind)] = &[
    (ZoneCall::Authorize, FailureKind::AlreadyAuthorized),
    (ZoneCall::Deauthorize, FailureKind::NotFound),
    (ZoneCall::Associate, FailureKind::AlreadyAssociated),
    (ZoneCall::Disassociate, FailureKind::NotFound),
    // a deleted VPC has no associations left
    (ZoneCall::Disassociate, FailureKind::InvalidVpc),
];

pub fn is_benign(call: ZoneCall, kind: FailureKind) -> bool {
    BENIGN_OUTCOMES.contains(&(call, kind))
}

/// Runs `operation` until it succeeds, fails with a non-throttling error,
/// or exhausts the retry budget.
#[tracing::instrument(skip(policy, operation))]
pub async fn execute<F, Fut>(
    call: ZoneCall,
    pair: &ZonePair,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<(), AssociationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ApiFailure>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = tokio::time::timeout(policy.per_call_deadline, operation())
            .await
            .map_err(|_| {
                AssociationError::Timeout(format!(
                    "{call} for {pair} exceeded {:?}",
                    policy.per_call_deadline
                ))
            })?;

        let failure = match result {
            Ok(()) => {
                tracing::debug!("[phz] {} succeeded for {}", call, pair);
                return Ok(());
            }
            Err(failure) => failure,
        };

        if is_benign(call, failure.kind) {
            tracing::debug!(
                "[phz] {} for {} already in desired state: {}",
                call,
                pair,
                failure
            );
            return Ok(());
        }

        if failure.kind != FailureKind::Throttled {
            return Err(call.failure(format!("{call} for {pair} failed: {failure}")));
        }

        if attempt >= policy.max_attempts {
            return Err(AssociationError::Throttled(format!(
                "{call} for {pair} throttled after {attempt} attempts: {failure}"
            )));
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            "[phz] {} throttled (attempt {}/{}), retrying in {:?}",
            call,
            attempt,
            policy.max_attempts,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
