// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Cross-account Private Hosted Zone association workflow.
//!
//! # Lifecycle
//!
//! | Request | Steps |
//! |---------|-------|
//! | Create | AssumeRole (hub) -> Authorize -> Associate -> Deauthorize (optional) |
//! | Update, pair unchanged | nothing, the physical id is returned as is |
//! | Update, no association yet (`failed::` id) | Create branch for the new pair |
//! | Update, pair changed | Create branch for the new pair, then Delete branch for the old one |
//! | Delete | Disassociate |
//!
//! Authorization always happens before association. Deleting never needs
//! hub credentials, since disassociation is done by the spoke.
//!
//! Hub credentials live only for the duration of the Create branch. They
//! are never cached between invocations.

use std::sync::Arc;
use std::time::SystemTime;

use crate::associator::Associator;
use crate::authorizer::Authorizer;
use crate::configuration::Config;
use crate::constants::MAX_COMMENT_LENGTH;
use crate::errors::AssociationError;
use crate::models::{
    AssociationRequest, HandlerOutcome, LifecycleEvent, PreviousAssociation, RequestType,
    ZonePair,
};
use crate::phz::{HostedZoneApi, ZoneClients};
use crate::retry::RetryPolicy;
use crate::sts::{self, StsBroker};

/// Hosted zone client acting for the hub during one Create branch.
struct HubSession {
    api: Arc<dyn HostedZoneApi>,
    expiry: Option<SystemTime>,
}

impl HubSession {
    fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| SystemTime::now() >= expiry)
    }
}

pub struct AssociationHandler {
    config: Config,
    policy: RetryPolicy,
    sts: Arc<dyn StsBroker>,
    zones: Arc<dyn ZoneClients>,
}

impl AssociationHandler {
    pub fn new(config: Config, sts: Arc<dyn StsBroker>, zones: Arc<dyn ZoneClients>) -> Self {
        let policy = RetryPolicy::from(&config);
        Self {
            config,
            policy,
            sts,
            zones,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one lifecycle event to completion.
    ///
    /// # Errors
    ///
    /// - [`AssociationError::InvalidInput`] - `assume_role_arn` missing on Create/Update, or
    ///   an Update whose previous pair cannot be determined
    /// - [`AssociationError::AuthError`] - the hub role could not be assumed
    /// - [`AssociationError::AuthorizationFailed`] / [`AssociationError::AssociationFailed`] -
    ///   a hosted zone call failed for a reason other than being already in the desired state
    /// - [`AssociationError::Throttled`] / [`AssociationError::Timeout`]
    /// - [`AssociationError::PartialSuccess`] - an Update associated the new pair but could
    ///   not remove the old one
    #[tracing::instrument(skip(self, event), fields(request_type = %event.request_type, logical_id = %event.logical_id))]
    pub async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerOutcome, AssociationError> {
        match event.request_type {
            RequestType::Create => {
                let request = AssociationRequest::try_from(&event.properties)?;
                self.create_branch(&request, event).await
            }
            RequestType::Update => self.update(event).await,
            RequestType::Delete => {
                let pair = event.properties.pair();
                self.delete_branch(&pair, &event.properties.region).await?;
                let mut outcome = HandlerOutcome::new(&pair);
                if let Some(id) = &event.physical_resource_id {
                    outcome.physical_resource_id = id.clone();
                }
                Ok(outcome)
            }
        }
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<HandlerOutcome, AssociationError> {
        let request = AssociationRequest::try_from(&event.properties)?;
        let pair = request.pair();

        // A non-`assoc::` id means the Create never associated anything.
        if let Some(id) = event
            .physical_resource_id
            .as_deref()
            .filter(|id| ZonePair::from_physical_resource_id(id).is_none())
        {
            tracing::debug!("[phz] {} has no association yet, creating {}", id, pair);
            return self.create_branch(&request, event).await;
        }

        let previous = event
            .previous
            .clone()
            .or_else(|| {
                event
                    .physical_resource_id
                    .as_deref()
                    .and_then(ZonePair::from_physical_resource_id)
                    .map(|pair| PreviousAssociation { pair, region: None })
            })
            .ok_or_else(|| {
                AssociationError::invalid(
                    "Update carries neither previous properties nor a known physical resource id",
                )
            })?;

        if previous.pair == pair {
            tracing::debug!("[phz] {} unchanged, nothing to update", pair);
            return Ok(HandlerOutcome::new(&pair));
        }

        tracing::debug!("[phz] replacing {} with {}", previous.pair, pair);
        let outcome = self.create_branch(&request, event).await?;

        let old_region = previous.region.as_deref().unwrap_or(&request.region);
        if let Err(source) = self.delete_branch(&previous.pair, old_region).await {
            return Err(AssociationError::PartialSuccess {
                physical_resource_id: outcome.physical_resource_id,
                leaked_hosted_zone_id: previous.pair.hosted_zone_id,
                leaked_vpc_id: previous.pair.vpc_id,
                source: Box::new(source),
            });
        }

        Ok(outcome)
    }

    async fn create_branch(
        &self,
        request: &AssociationRequest,
        event: &LifecycleEvent,
    ) -> Result<HandlerOutcome, AssociationError> {
        let pair = request.pair();
        let region = request.region.as_str();

        let hub = self.hub_session(request, &event.logical_id).await?;
        let authorizer = Authorizer::new(hub.api.as_ref(), &self.policy);
        authorizer.authorize(&pair, region).await?;

        let spoke = self.zones.spoke();
        let comment = association_comment(&event.logical_id, event.properties.account_id.as_deref());
        Associator::new(spoke.as_ref(), &self.policy)
            .associate(&pair, region, Some(&comment))
            .await?;

        let revoked = if !self.config.deauthorize_after_associate {
            false
        } else if hub.is_expired() {
            tracing::warn!(
                "[phz] hub session expired before the authorization for {} could be revoked",
                pair
            );
            false
        } else {
            match authorizer.deauthorize(&pair, region).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        "[phz] unable to revoke the authorization for {}: {}",
                        pair,
                        e.reason()
                    );
                    false
                }
            }
        };

        Ok(HandlerOutcome::new(&pair).with_authorization_revoked(revoked))
    }

    async fn delete_branch(&self, pair: &ZonePair, region: &str) -> Result<(), AssociationError> {
        let spoke = self.zones.spoke();
        Associator::new(spoke.as_ref(), &self.policy)
            .disassociate(pair, region)
            .await
    }

    /// Assumes the hub role, unless the hub is the account the handler runs in.
    async fn hub_session(
        &self,
        request: &AssociationRequest,
        logical_id: &str,
    ) -> Result<HubSession, AssociationError> {
        if self.config.spoke_account_id.as_deref() == Some(request.hub_account_id.as_str()) {
            tracing::debug!(
                "[phz] hub account {} is the local account, skipping AssumeRole",
                request.hub_account_id
            );
            return Ok(HubSession {
                api: self.zones.spoke(),
                expiry: None,
            });
        }

        let session_name = sts::session_name(logical_id);
        let credentials = tokio::time::timeout(
            self.policy.per_call_deadline,
            self.sts.assume(
                &request.assume_role_arn,
                &session_name,
                self.config.session_duration,
            ),
        )
        .await
        .map_err(|_| {
            AssociationError::Timeout(format!(
                "AssumeRole for {} exceeded {:?}",
                request.assume_role_arn, self.policy.per_call_deadline
            ))
        })??;

        Ok(HubSession {
            api: self.zones.hub(&credentials),
            expiry: Some(credentials.expiry),
        })
    }
}

fn association_comment(logical_id: &str, account_id: Option<&str>) -> String {
    let mut comment = format!("phz-association {logical_id}");
    if let Some(account_id) = account_id {
        comment.push_str(" for account ");
        comment.push_str(account_id);
    }
    if comment.len() > MAX_COMMENT_LENGTH {
        let mut end = MAX_COMMENT_LENGTH;
        while !comment.is_char_boundary(end) {
            end -= 1;
        }
        comment.truncate(end);
    }
    comment
}
