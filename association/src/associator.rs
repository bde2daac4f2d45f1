// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Spoke-side VPC associations, made with the handler's own credentials.

use crate::errors::AssociationError;
use crate::models::ZonePair;
use crate::phz::{HostedZoneApi, ZoneCall, execute};
use crate::retry::RetryPolicy;

pub struct Associator<'a> {
    api: &'a dyn HostedZoneApi,
    policy: &'a RetryPolicy,
}

impl<'a> Associator<'a> {
    pub fn new(api: &'a dyn HostedZoneApi, policy: &'a RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Associates the VPC with the hosted zone. An existing association is success.
    ///
    /// A missing or expired authorization fails with
    /// [`AssociationError::AssociationFailed`].
    pub async fn associate(
        &self,
        pair: &ZonePair,
        region: &str,
        comment: Option<&str>,
    ) -> Result<(), AssociationError> {
        execute(ZoneCall::Associate, pair, self.policy, || {
            self.api.associate_vpc_with_hosted_zone(pair, region, comment)
        })
        .await
    }

    /// Disassociates the VPC. A missing association is success; removing
    /// the last VPC of a private zone is not.
    pub async fn disassociate(&self, pair: &ZonePair, region: &str) -> Result<(), AssociationError> {
        execute(ZoneCall::Disassociate, pair, self.policy, || {
            self.api.disassociate_vpc_from_hosted_zone(pair, region)
        })
        .await
    }
}
