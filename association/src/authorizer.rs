// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Hub-side VPC association authorizations.
//!
//! The [`Authorizer`] wraps a [`HostedZoneApi`] built from hub credentials.
//! An existing authorization counts as a successful `authorize`, and a
//! missing one as a successful `deauthorize`.

use crate::errors::AssociationError;
use crate::models::ZonePair;
use crate::phz::{HostedZoneApi, ZoneCall, execute};
use crate::retry::RetryPolicy;

pub struct Authorizer<'a> {
    api: &'a dyn HostedZoneApi,
    policy: &'a RetryPolicy,
}

impl<'a> Authorizer<'a> {
    pub fn new(api: &'a dyn HostedZoneApi, policy: &'a RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Permits `pair.vpc_id` in `region` to associate with `pair.hosted_zone_id`.
    ///
    /// # Errors
    ///
    /// - [`AssociationError::AuthorizationFailed`] - zone missing, access denied or any other hard failure
    /// - [`AssociationError::Throttled`] - throttled on every attempt
    /// - [`AssociationError::Timeout`] - the call exceeded its deadline
    pub async fn authorize(&self, pair: &ZonePair, region: &str) -> Result<(), AssociationError> {
        execute(ZoneCall::Authorize, pair, self.policy, || {
            self.api.create_vpc_association_authorization(pair, region)
        })
        .await
    }

    /// Revokes the authorization created by [`Authorizer::authorize`].
    pub async fn deauthorize(&self, pair: &ZonePair, region: &str) -> Result<(), AssociationError> {
        execute(ZoneCall::Deauthorize, pair, self.policy, || {
            self.api.delete_vpc_association_authorization(pair, region)
        })
        .await
    }
}
