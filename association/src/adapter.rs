// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Bridge between the deployment engine and the association workflow.
//!
//! The adapter turns the engine's untyped property bag into a validated
//! [`LifecycleEvent`], runs the [`AssociationHandler`] under the overall
//! invocation deadline and shapes the result as a [`ProvisioningResponse`].
//! When the event carries a `ResponseURL`, the response is also delivered
//! there with the [`Responder`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use validator::Validate;

use crate::configuration::Config;
use crate::errors::{AppError, AssociationError};
use crate::handler::AssociationHandler;
use crate::models::{
    AssociationProperties, HandlerOutcome, LifecycleEvent, PreviousAssociation,
    ProvisioningEvent, ProvisioningResponse, RequestType, ResponseStatus, ZonePair,
    failed_physical_resource_id,
};
use crate::responder::Responder;

const HOSTED_ZONE_PATH_PREFIX: &str = "/hostedzone/";

pub struct ProvisioningAdapter {
    handler: AssociationHandler,
    responder: Responder,
}

impl ProvisioningAdapter {
    pub fn new(handler: AssociationHandler) -> Self {
        let responder = Responder::new(handler.config().per_call_deadline);
        Self { handler, responder }
    }

    pub fn config(&self) -> &Config {
        self.handler.config()
    }

    /// Processes an event and delivers the response to its `ResponseURL`, if any.
    ///
    /// # Errors
    ///
    /// - [`AppError::DeliveryError`] - the response could not be delivered
    pub async fn handle_event(
        &self,
        event: ProvisioningEvent,
    ) -> Result<ProvisioningResponse, AppError> {
        let response_url = event.response_url.clone();
        let response = self.process(event).await;
        if let Some(url) = response_url {
            self.responder.send(&url, &response).await?;
        }
        Ok(response)
    }

    /// Processes an event. Failures are reported in the response, never returned.
    pub async fn process(&self, event: ProvisioningEvent) -> ProvisioningResponse {
        tracing::info!(
            "[phz] received {} for {} in {}",
            event.request_type,
            event.logical_resource_id,
            event.stack_id
        );

        match self.run(&event).await {
            Ok(outcome) => {
                tracing::info!(
                    "[phz] {} for {} succeeded: {}",
                    event.request_type,
                    event.logical_resource_id,
                    outcome.physical_resource_id
                );
                response(
                    &event,
                    ResponseStatus::Success,
                    outcome.physical_resource_id,
                    None,
                    outcome.data,
                )
            }
            Err(err) => {
                let reason = err.reason();
                tracing::error!(
                    "[phz] {} for {} failed: {}",
                    event.request_type,
                    event.logical_resource_id,
                    reason
                );
                let physical_resource_id = failure_physical_id(&event, &err);
                response(
                    &event,
                    ResponseStatus::Failed,
                    physical_resource_id,
                    Some(reason),
                    BTreeMap::new(),
                )
            }
        }
    }

    async fn run(&self, event: &ProvisioningEvent) -> Result<HandlerOutcome, AssociationError> {
        if let Some(id) = skipped_delete(event) {
            tracing::info!("[phz] {} was never associated, nothing to delete", id);
            return Ok(HandlerOutcome {
                physical_resource_id: id.to_string(),
                data: BTreeMap::new(),
            });
        }

        let lifecycle = self.lifecycle_event(event)?;
        let deadline = self.config().overall_deadline;
        tokio::time::timeout(deadline, self.handler.handle(&lifecycle))
            .await
            .map_err(|_| {
                AssociationError::Timeout(format!("invocation exceeded {deadline:?}"))
            })?
    }

    /// Validates and canonicalizes an engine event.
    pub fn lifecycle_event(
        &self,
        event: &ProvisioningEvent,
    ) -> Result<LifecycleEvent, AssociationError> {
        if event.stack_id.trim().is_empty() {
            return Err(AssociationError::invalid("stack_id is required"));
        }
        if event.logical_resource_id.trim().is_empty() {
            return Err(AssociationError::invalid("logical_resource_id is required"));
        }
        let properties = self.properties(&event.resource_properties)?;

        let previous = match (event.request_type, &event.old_resource_properties) {
            (RequestType::Update, Some(old)) => previous_association(old),
            _ => None,
        };

        Ok(LifecycleEvent {
            request_type: event.request_type,
            stack_id: event.stack_id.clone(),
            logical_id: event.logical_resource_id.clone(),
            physical_resource_id: event.physical_resource_id.clone(),
            properties,
            previous,
        })
    }

    fn properties(&self, bag: &Map<String, Value>) -> Result<AssociationProperties, AssociationError> {
        let vpc_id = property(bag, "vpc_id")
            .ok_or_else(|| AssociationError::invalid("vpc_id is required"))?;
        let hosted_zone_id = property(bag, "hosted_zone_id")
            .map(|id| canonical_hosted_zone_id(&id))
            .ok_or_else(|| AssociationError::invalid("hosted_zone_id is required"))?;

        let region = match (property(bag, "region"), &self.config().region) {
            (Some(event_region), Some(configured)) if &event_region != configured => {
                return Err(AssociationError::invalid(format!(
                    "region {event_region} does not match the configured region {configured}"
                )));
            }
            (Some(event_region), _) => event_region,
            (None, Some(configured)) => configured.clone(),
            (None, None) => {
                return Err(AssociationError::invalid(
                    "region is required when no ambient region is configured",
                ));
            }
        };

        let properties = AssociationProperties {
            vpc_id,
            hosted_zone_id,
            account_id: property(bag, "account_id"),
            assume_role_arn: property(bag, "assume_role_arn"),
            region,
        };
        properties.validate()?;
        Ok(properties)
    }
}

fn response(
    event: &ProvisioningEvent,
    status: ResponseStatus,
    physical_resource_id: String,
    reason: Option<String>,
    data: BTreeMap<String, String>,
) -> ProvisioningResponse {
    ProvisioningResponse {
        status,
        physical_resource_id,
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        reason,
        no_echo: true,
        data,
    }
}

/// Physical id reported with a failure.
///
/// Update and Delete keep the id the engine already knows, so its rollback
/// targets the previous association. A failed Create reports an id that
/// a later Delete recognizes as never associated.
fn failure_physical_id(event: &ProvisioningEvent, err: &AssociationError) -> String {
    if let AssociationError::PartialSuccess {
        physical_resource_id,
        ..
    } = err
    {
        return physical_resource_id.clone();
    }
    match (&event.physical_resource_id, event.request_type) {
        (Some(id), RequestType::Update | RequestType::Delete) => id.clone(),
        _ => failed_physical_resource_id(&event.logical_resource_id),
    }
}

/// A Delete for a resource whose Create never produced an association.
fn skipped_delete(event: &ProvisioningEvent) -> Option<&str> {
    match (event.request_type, event.physical_resource_id.as_deref()) {
        (RequestType::Delete, Some(id)) if ZonePair::from_physical_resource_id(id).is_none() => {
            Some(id)
        }
        _ => None,
    }
}

fn previous_association(bag: &Map<String, Value>) -> Option<PreviousAssociation> {
    let vpc_id = property(bag, "vpc_id")?;
    let hosted_zone_id = canonical_hosted_zone_id(&property(bag, "hosted_zone_id")?);
    Some(PreviousAssociation {
        pair: ZonePair::new(hosted_zone_id, vpc_id),
        region: property(bag, "region"),
    })
}

/// Looks up a string property, accepting `vpc_id`, `VpcId`, `vpcId` and `VPCId` forms.
/// Empty strings count as absent.
fn property(bag: &Map<String, Value>, name: &str) -> Option<String> {
    let wanted = normalize_key(name);
    bag.iter()
        .find(|(key, _)| normalize_key(key) == wanted)
        .and_then(|(_, value)| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn canonical_hosted_zone_id(id: &str) -> String {
    id.strip_prefix(HOSTED_ZONE_PATH_PREFIX).unwrap_or(id).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::memory::{
        IN_MEMORY_ACCESS_KEY, IN_MEMORY_SECRET_KEY, IN_MEMORY_SESSION_TOKEN, InMemoryCloud,
        RecordedCall,
    };
    use crate::phz::{ApiFailure, ZoneCall};
    use crate::retry::RetryPolicy;
    use serde_json::json;

    fn adapter(cloud: &InMemoryCloud, config: Config) -> ProvisioningAdapter {
        let handler =
            AssociationHandler::new(config, Arc::new(cloud.clone()), Arc::new(cloud.clone()))
                .with_retry_policy(RetryPolicy {
                    base_delay: Duration::ZERO,
                    ..Default::default()
                });
        ProvisioningAdapter::new(handler)
    }

    fn eu_west_1() -> Config {
        Config {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        }
    }

    fn event(value: Value) -> ProvisioningEvent {
        serde_json::from_value(value).unwrap()
    }

    fn create_event() -> ProvisioningEvent {
        event(json!({
            "RequestType": "Create",
            "StackId": "arn:aws:cloudformation:eu-west-1:222222222222:stack/spoke/1",
            "RequestId": "req-1",
            "LogicalResourceId": "SsmAssociation",
            "ResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub",
                "Region": "eu-west-1"
            }
        }))
    }

    fn delete_event(physical_resource_id: Option<&str>) -> ProvisioningEvent {
        let mut event = event(json!({
            "request_type": "Delete",
            "stack_id": "stack",
            "request_id": "req-2",
            "logical_resource_id": "SsmAssociation",
            "resource_properties": {
                "vpc_id": "vpc-aaaa",
                "hosted_zone_id": "Z123",
                "region": "eu-west-1"
            }
        }));
        event.physical_resource_id = physical_resource_id.map(str::to_string);
        event
    }

    #[tokio::test]
    async fn test_happy_path_create() {
        let cloud = InMemoryCloud::new();
        let response = adapter(&cloud, eu_west_1()).process(create_event()).await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-aaaa");
        assert!(response.no_echo);
        assert_eq!(response.request_id, "req-1");
        assert!(response.reason.is_none());

        let zone_calls: Vec<ZoneCall> = cloud.zone_calls().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            zone_calls,
            vec![ZoneCall::Authorize, ZoneCall::Associate, ZoneCall::Deauthorize]
        );
    }

    #[tokio::test]
    async fn test_response_never_contains_credentials() {
        let cloud = InMemoryCloud::new();
        let response = adapter(&cloud, eu_west_1()).process(create_event()).await;
        let body = serde_json::to_string(&response).unwrap();
        assert!(!body.contains(IN_MEMORY_ACCESS_KEY));
        assert!(!body.contains(IN_MEMORY_SECRET_KEY));
        assert!(!body.contains(IN_MEMORY_SESSION_TOKEN));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logs_never_contain_credentials() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let cloud = InMemoryCloud::new();
        let adapter = adapter(&cloud, eu_west_1());
        let created = adapter.process(create_event()).await;
        assert_eq!(created.status, ResponseStatus::Success);

        cloud.fail_next(
            ZoneCall::Associate,
            ApiFailure::from_code(Some("AccessDenied"), "denied"),
        );
        let mut replaced = create_event();
        replaced.resource_properties["VpcId"] = json!("vpc-bbbb");
        let failed = adapter.process(replaced).await;
        assert_eq!(failed.status, ResponseStatus::Failed);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("[phz]"));
        assert!(!output.contains(IN_MEMORY_ACCESS_KEY));
        assert!(!output.contains(IN_MEMORY_SECRET_KEY));
        assert!(!output.contains(IN_MEMORY_SESSION_TOKEN));
    }

    #[tokio::test]
    async fn test_idempotent_recreate() {
        let cloud = InMemoryCloud::new();
        let adapter = adapter(&cloud, eu_west_1());
        adapter.process(create_event()).await;

        cloud.fail_next(
            ZoneCall::Associate,
            ApiFailure::from_code(Some("HostedZoneAlreadyAssociated"), "already associated"),
        );
        let response = adapter.process(create_event()).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-aaaa");
    }

    #[tokio::test]
    async fn test_happy_path_delete() {
        let cloud = InMemoryCloud::new();
        cloud.associate(&ZonePair::new("Z123", "vpc-aaaa"));
        let response = adapter(&cloud, eu_west_1())
            .process(delete_event(None))
            .await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(
            cloud.zone_calls(),
            vec![(ZoneCall::Disassociate, ZonePair::new("Z123", "vpc-aaaa"))]
        );
        assert!(!cloud.is_associated(&ZonePair::new("Z123", "vpc-aaaa")));
    }

    #[tokio::test]
    async fn test_delete_of_missing_association() {
        let cloud = InMemoryCloud::new();
        let response = adapter(&cloud, eu_west_1())
            .process(delete_event(Some("assoc::Z123::vpc-aaaa")))
            .await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-aaaa");
    }

    #[tokio::test]
    async fn test_delete_after_failed_create_makes_no_calls() {
        let cloud = InMemoryCloud::new();
        let mut event = delete_event(Some("failed::SsmAssociation"));
        event.resource_properties = Map::new();
        let response = adapter(&cloud, eu_west_1()).process(event).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "failed::SsmAssociation");
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_replace() {
        let cloud = InMemoryCloud::new();
        cloud.associate(&ZonePair::new("Z123", "vpc-aaaa"));
        let event = event(json!({
            "RequestType": "Update",
            "StackId": "stack",
            "RequestId": "req-3",
            "LogicalResourceId": "SsmAssociation",
            "PhysicalResourceId": "assoc::Z123::vpc-aaaa",
            "ResourceProperties": {
                "VpcId": "vpc-bbbb",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            },
            "OldResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            }
        }));
        let response = adapter(&cloud, eu_west_1()).process(event).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-bbbb");

        let calls = cloud.zone_calls();
        let associate = calls
            .iter()
            .position(|(c, p)| *c == ZoneCall::Associate && p.vpc_id == "vpc-bbbb")
            .unwrap();
        let disassociate = calls
            .iter()
            .position(|(c, p)| *c == ZoneCall::Disassociate && p.vpc_id == "vpc-aaaa")
            .unwrap();
        assert!(associate < disassociate);
    }

    #[tokio::test]
    async fn test_update_after_failed_create_associates() {
        let cloud = InMemoryCloud::new();
        let event = event(json!({
            "RequestType": "Update",
            "StackId": "stack",
            "RequestId": "req-4",
            "LogicalResourceId": "SsmAssociation",
            "PhysicalResourceId": "failed::SsmAssociation",
            "ResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            },
            "OldResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Typo"
            }
        }));
        let response = adapter(&cloud, eu_west_1()).process(event).await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-aaaa");
        assert!(cloud.is_associated(&ZonePair::new("Z123", "vpc-aaaa")));
        assert!(
            cloud
                .zone_calls()
                .iter()
                .any(|(c, _)| *c == ZoneCall::Associate)
        );
    }

    #[tokio::test]
    async fn test_update_in_place_makes_no_calls() {
        let cloud = InMemoryCloud::new();
        let event = event(json!({
            "RequestType": "Update",
            "StackId": "stack",
            "LogicalResourceId": "SsmAssociation",
            "PhysicalResourceId": "assoc::Z123::vpc-aaaa",
            "ResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "Z123",
                "AccountId": "222222222222",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            },
            "OldResourceProperties": {
                "VpcId": "vpc-aaaa",
                "HostedZoneId": "/hostedzone/Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            }
        }));
        let response = adapter(&cloud, eu_west_1()).process(event).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-aaaa");
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_success_is_reported_as_failure() {
        let cloud = InMemoryCloud::new();
        cloud.associate(&ZonePair::new("Z123", "vpc-aaaa"));
        cloud.fail_next(
            ZoneCall::Disassociate,
            ApiFailure::from_code(Some("LastVPCAssociation"), "last VPC"),
        );
        let event = event(json!({
            "RequestType": "Update",
            "StackId": "stack",
            "LogicalResourceId": "SsmAssociation",
            "PhysicalResourceId": "assoc::Z123::vpc-aaaa",
            "ResourceProperties": {
                "VpcId": "vpc-bbbb",
                "HostedZoneId": "Z123",
                "AssumeRoleArn": "arn:aws:iam::111111111111:role/Hub"
            },
            "OldResourceProperties": {"VpcId": "vpc-aaaa", "HostedZoneId": "Z123"}
        }));
        let response = adapter(&cloud, eu_west_1()).process(event).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.physical_resource_id, "assoc::Z123::vpc-bbbb");
        let reason = response.reason.unwrap();
        assert!(reason.starts_with("PartialSuccess"));
        assert!(reason.contains("assoc::Z123::vpc-aaaa"));
    }

    #[tokio::test]
    async fn test_assume_role_failure() {
        let cloud = InMemoryCloud::new();
        cloud.fail_assume_role("AccessDenied", "not authorized to perform sts:AssumeRole");
        let response = adapter(&cloud, eu_west_1()).process(create_event()).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.unwrap().starts_with("AuthError"));
        assert_eq!(response.physical_resource_id, "failed::SsmAssociation");
        assert_eq!(cloud.calls().len(), 1);
        assert!(matches!(cloud.calls()[0], RecordedCall::AssumeRole { .. }));
    }

    #[tokio::test]
    async fn test_missing_fields_fail_fast() {
        let cloud = InMemoryCloud::new();
        let adapter = adapter(&cloud, eu_west_1());

        let mut event = create_event();
        event.resource_properties.insert("VpcId".to_string(), json!(""));
        let response = adapter.process(event).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.unwrap().starts_with("InvalidInput"));

        let mut event = create_event();
        event.resource_properties.remove("HostedZoneId");
        let response = adapter.process(event).await;
        assert!(response.reason.unwrap().starts_with("InvalidInput"));

        let mut event = create_event();
        event.resource_properties.remove("AssumeRoleArn");
        let response = adapter.process(event).await;
        assert!(response.reason.unwrap().starts_with("InvalidInput"));

        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_region_mismatch_fails_fast() {
        let cloud = InMemoryCloud::new();
        let config = Config {
            region: Some("us-east-1".to_string()),
            ..Default::default()
        };
        let response = adapter(&cloud, config).process(create_event()).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.unwrap().starts_with("InvalidInput"));
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_region_defaults_to_ambient() {
        let cloud = InMemoryCloud::new();
        let mut event = create_event();
        event.resource_properties.remove("Region");
        let lifecycle = adapter(&cloud, eu_west_1()).lifecycle_event(&event).unwrap();
        assert_eq!(lifecycle.properties.region, "eu-west-1");

        let err = adapter(&cloud, Config::default())
            .lifecycle_event(&event)
            .unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }

    #[tokio::test]
    async fn test_overall_deadline() {
        let cloud = InMemoryCloud::new();
        cloud.delay_calls(Duration::from_millis(200));
        let config = Config {
            overall_deadline: Duration::from_millis(50),
            ..eu_west_1()
        };
        let response = adapter(&cloud, config).process(create_event()).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.unwrap().starts_with("Timeout"));
    }

    #[test]
    fn test_property_lookup() {
        let bag = json!({"VPCId": " vpc-aaaa ", "hosted-zone-id": "Z1", "AccountId": ""});
        let bag = bag.as_object().unwrap();
        assert_eq!(property(bag, "vpc_id").as_deref(), Some("vpc-aaaa"));
        assert_eq!(property(bag, "hosted_zone_id").as_deref(), Some("Z1"));
        assert_eq!(property(bag, "account_id"), None);
        assert_eq!(property(bag, "region"), None);
    }

    #[test]
    fn test_canonical_hosted_zone_id() {
        assert_eq!(canonical_hosted_zone_id("/hostedzone/Z123"), "Z123");
        assert_eq!(canonical_hosted_zone_id("Z123"), "Z123");
    }
}
