// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Route 53 implementation of [`HostedZoneApi`].

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_route53::types::{Vpc, VpcRegion};

use crate::models::{HubCredentials, ZonePair};
use crate::phz::{ApiFailure, HostedZoneApi, ZoneClients};

pub struct Route53Zones {
    client: Client,
}

impl Route53Zones {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn vpc(pair: &ZonePair, region: &str) -> Vpc {
    Vpc::builder()
        .vpc_id(&pair.vpc_id)
        .vpc_region(VpcRegion::from(region))
        .build()
}

fn classify<E, R>(err: SdkError<E, R>) -> ApiFailure
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ApiFailure::from_code(err.code(), message)
}

#[async_trait]
impl HostedZoneApi for Route53Zones {
    async fn create_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.client
            .create_vpc_association_authorization()
            .hosted_zone_id(&pair.hosted_zone_id)
            .vpc(vpc(pair, region))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn delete_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.client
            .delete_vpc_association_authorization()
            .hosted_zone_id(&pair.hosted_zone_id)
            .vpc(vpc(pair, region))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn associate_vpc_with_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiFailure> {
        self.client
            .associate_vpc_with_hosted_zone()
            .hosted_zone_id(&pair.hosted_zone_id)
            .vpc(vpc(pair, region))
            .set_comment(comment.map(str::to_string))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn disassociate_vpc_from_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.client
            .disassociate_vpc_from_hosted_zone()
            .hosted_zone_id(&pair.hosted_zone_id)
            .vpc(vpc(pair, region))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Route 53 clients for the spoke (ambient credentials) and the hub.
pub struct AwsZoneClients {
    sdk_config: SdkConfig,
    spoke: Arc<dyn HostedZoneApi>,
}

impl AwsZoneClients {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            spoke: Arc::new(Route53Zones::new(Client::new(sdk_config))),
        }
    }
}

impl ZoneClients for AwsZoneClients {
    fn spoke(&self) -> Arc<dyn HostedZoneApi> {
        self.spoke.clone()
    }

    fn hub(&self, credentials: &HubCredentials) -> Arc<dyn HostedZoneApi> {
        let config = aws_sdk_route53::config::Builder::from(&self.sdk_config)
            .credentials_provider(Credentials::from(credentials))
            .build();
        Arc::new(Route53Zones::new(Client::from_conf(config)))
    }
}
