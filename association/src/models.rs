// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;
use zeroize::ZeroizeOnDrop;

use crate::constants::{
    ACCOUNT_ID_LENGTH, FAILED_ID_PREFIX, MAX_HOSTED_ZONE_ID_LENGTH, MAX_REGION_LENGTH,
    MAX_ROLE_ARN_LENGTH, MAX_VPC_ID_LENGTH, PHYSICAL_ID_PREFIX, PHYSICAL_ID_SEPARATOR,
};

/// Lifecycle operation requested by the deployment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        };
        f.write_str(name)
    }
}

/// A hosted zone and the VPC bound (or to be bound) to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZonePair {
    pub hosted_zone_id: String,
    pub vpc_id: String,
}

impl ZonePair {
    pub fn new(hosted_zone_id: impl Into<String>, vpc_id: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
            vpc_id: vpc_id.into(),
        }
    }

    /// Stable id for the pair: `assoc::<hosted_zone_id>::<vpc_id>`.
    pub fn physical_resource_id(&self) -> String {
        [PHYSICAL_ID_PREFIX, &self.hosted_zone_id, &self.vpc_id].join(PHYSICAL_ID_SEPARATOR)
    }

    /// Parses an id produced by [`ZonePair::physical_resource_id`].
    pub fn from_physical_resource_id(id: &str) -> Option<Self> {
        let mut parts = id.split(PHYSICAL_ID_SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(PHYSICAL_ID_PREFIX), Some(zone), Some(vpc), None)
                if !zone.is_empty() && !vpc.is_empty() =>
            {
                Some(Self::new(zone, vpc))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ZonePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hosted_zone_id, self.vpc_id)
    }
}

/// Physical id reported when a Create fails before anything was associated.
pub fn failed_physical_resource_id(logical_resource_id: &str) -> String {
    [FAILED_ID_PREFIX, logical_resource_id].join(PHYSICAL_ID_SEPARATOR)
}

/// Validated resource properties of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct AssociationProperties {
    #[validate(length(min = 1, max = MAX_VPC_ID_LENGTH))]
    #[validate(custom(function = "validate_vpc_id"))]
    pub vpc_id: String,

    #[validate(length(min = 1, max = MAX_HOSTED_ZONE_ID_LENGTH))]
    #[validate(custom(function = "validate_hosted_zone_id"))]
    pub hosted_zone_id: String,

    #[validate(custom(function = "validate_account_id"))]
    pub account_id: Option<String>,

    #[validate(length(min = 1, max = MAX_ROLE_ARN_LENGTH))]
    #[validate(custom(function = "validate_role_arn"))]
    pub assume_role_arn: Option<String>,

    #[validate(length(min = 1, max = MAX_REGION_LENGTH))]
    #[validate(custom(function = "validate_aws_region"))]
    pub region: String,
}

impl AssociationProperties {
    pub fn pair(&self) -> ZonePair {
        ZonePair::new(&self.hosted_zone_id, &self.vpc_id)
    }
}

/// Validates AWS region format (e.g., "us-east-1", "eu-west-2")
/// Pattern: two lowercase letters, hyphen, lowercase letters, hyphen, digits
pub fn validate_aws_region(region: &str) -> Result<(), validator::ValidationError> {
    let parts: Vec<&str> = region.split('-').collect();
    if parts.len() < 3 {
        return Err(validator::ValidationError::new("invalid_aws_region"));
    }

    let first = parts[0];
    if first.len() != 2 || !first.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(validator::ValidationError::new("invalid_aws_region"));
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(validator::ValidationError::new("invalid_aws_region"));
        }
    }

    let last = parts[parts.len() - 1];
    if last.is_empty() || !last.chars().all(|c| c.is_ascii_digit()) {
        return Err(validator::ValidationError::new("invalid_aws_region"));
    }

    Ok(())
}

/// `vpc-` followed by a lowercase alphanumeric suffix
fn validate_vpc_id(vpc_id: &str) -> Result<(), validator::ValidationError> {
    match vpc_id.strip_prefix("vpc-") {
        Some(suffix)
            if !suffix.is_empty()
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()) =>
        {
            Ok(())
        }
        _ => Err(validator::ValidationError::new("invalid_vpc_id")),
    }
}

fn validate_hosted_zone_id(hosted_zone_id: &str) -> Result<(), validator::ValidationError> {
    if hosted_zone_id
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_hosted_zone_id"))
    }
}

fn validate_account_id(account_id: &str) -> Result<(), validator::ValidationError> {
    if account_id.len() == ACCOUNT_ID_LENGTH && account_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_account_id"))
    }
}

fn validate_role_arn(role_arn: &str) -> Result<(), validator::ValidationError> {
    match account_id_from_role_arn(role_arn) {
        Some(_) => Ok(()),
        None => Err(validator::ValidationError::new("invalid_role_arn")),
    }
}

/// Extracts the account id from `arn:<partition>:iam::<account>:role/<name>`.
pub fn account_id_from_role_arn(role_arn: &str) -> Option<&str> {
    let mut parts = role_arn.splitn(6, ':');
    let (arn, _partition, service, region, account, resource) = (
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
    );
    let valid = arn == "arn"
        && service == "iam"
        && region.is_empty()
        && validate_account_id(account).is_ok()
        && resource.strip_prefix("role/").is_some_and(|name| !name.is_empty());
    valid.then_some(account)
}

/// Everything the Create branch needs for one (hosted zone, VPC) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRequest {
    pub vpc_id: String,
    pub hosted_zone_id: String,
    pub hub_account_id: String,
    pub assume_role_arn: String,
    pub region: String,
}

impl AssociationRequest {
    pub fn pair(&self) -> ZonePair {
        ZonePair::new(&self.hosted_zone_id, &self.vpc_id)
    }
}

impl TryFrom<&AssociationProperties> for AssociationRequest {
    type Error = crate::errors::AssociationError;

    fn try_from(properties: &AssociationProperties) -> Result<Self, Self::Error> {
        let assume_role_arn = properties.assume_role_arn.clone().ok_or_else(|| {
            crate::errors::AssociationError::invalid("assume_role_arn is required")
        })?;
        let hub_account_id = account_id_from_role_arn(&assume_role_arn)
            .ok_or_else(|| crate::errors::AssociationError::invalid("assume_role_arn is malformed"))?
            .to_string();

        Ok(Self {
            vpc_id: properties.vpc_id.clone(),
            hosted_zone_id: properties.hosted_zone_id.clone(),
            hub_account_id,
            assume_role_arn,
            region: properties.region.clone(),
        })
    }
}

/// Short-lived credentials for the hub account.
#[derive(Clone, ZeroizeOnDrop)]
pub struct HubCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    #[zeroize(skip)]
    pub expiry: SystemTime,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for HubCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCredentials")
            .field("access_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl From<&HubCredentials> for Credentials {
    fn from(credential: &HubCredentials) -> Self {
        Credentials::new(
            credential.access_key.clone(),
            credential.secret_key.clone(),
            Some(credential.session_token.clone()),
            Some(credential.expiry),
            "HubAssumeRole",
        )
    }
}

/// Typed lifecycle event handed to the workflow handler.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    pub stack_id: String,
    pub logical_id: String,
    pub physical_resource_id: Option<String>,
    pub properties: AssociationProperties,
    /// Association named by the previous properties, only meaningful on Update.
    pub previous: Option<PreviousAssociation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviousAssociation {
    pub pair: ZonePair,
    pub region: Option<String>,
}

/// Successful result of a workflow invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub physical_resource_id: String,
    pub data: BTreeMap<String, String>,
}

impl HandlerOutcome {
    pub fn new(pair: &ZonePair) -> Self {
        let data = BTreeMap::from([
            ("HostedZoneId".to_string(), pair.hosted_zone_id.clone()),
            ("VpcId".to_string(), pair.vpc_id.clone()),
        ]);
        Self {
            physical_resource_id: pair.physical_resource_id(),
            data,
        }
    }

    pub fn with_authorization_revoked(mut self, revoked: bool) -> Self {
        self.data
            .insert("AuthorizationRevoked".to_string(), revoked.to_string());
        self
    }
}

/// Lifecycle event as delivered by the deployment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningEvent {
    #[serde(rename = "RequestType", alias = "request_type")]
    pub request_type: RequestType,

    #[serde(rename = "StackId", alias = "stack_id", default)]
    pub stack_id: String,

    #[serde(rename = "RequestId", alias = "request_id", default)]
    pub request_id: String,

    #[serde(rename = "LogicalResourceId", alias = "logical_resource_id", default)]
    pub logical_resource_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "PhysicalResourceId", alias = "physical_resource_id", default)]
    pub physical_resource_id: Option<String>,

    #[serde(rename = "ResourceProperties", alias = "resource_properties", default)]
    pub resource_properties: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "OldResourceProperties", alias = "old_resource_properties", default)]
    pub old_resource_properties: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "ResponseURL", alias = "response_url", default)]
    pub response_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response in the shape the deployment engine expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningResponse {
    #[serde(rename = "Status")]
    pub status: ResponseStatus,

    #[serde(rename = "PhysicalResourceId")]
    pub physical_resource_id: String,

    #[serde(rename = "StackId")]
    pub stack_id: String,

    #[serde(rename = "RequestId")]
    pub request_id: String,

    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "Reason", default)]
    pub reason: Option<String>,

    #[serde(rename = "NoEcho")]
    pub no_echo: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(rename = "Data", default)]
    pub data: BTreeMap<String, String>,
}
