// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! In-memory stand-in for STS and Route 53.
//!
//! [`InMemoryCloud`] keeps the authorization and association sets of every
//! hosted zone it has seen, records each outbound call in order, and can be
//! scripted to fail specific calls. It behaves like the provider for the
//! cases the workflow cares about: associating without an authorization is
//! rejected with `NotAuthorizedException`, re-associating reports
//! `ConflictingDomainExists`, and removing something absent reports a
//! not-found code.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::errors::AssociationError;
use crate::models::{HubCredentials, ZonePair};
use crate::phz::{ApiFailure, HostedZoneApi, ZoneCall, ZoneClients};
use crate::sts::StsBroker;

pub const IN_MEMORY_ACCESS_KEY: &str = "ASIAINMEMORYEXAMPLE";
pub const IN_MEMORY_SECRET_KEY: &str = "in-memory-secret-access-key";
pub const IN_MEMORY_SESSION_TOKEN: &str = "in-memory-session-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Hub,
    Spoke,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    AssumeRole {
        role_arn: String,
        session_name: String,
    },
    Zone {
        call: ZoneCall,
        principal: Principal,
        pair: ZonePair,
        region: String,
    },
}

impl RecordedCall {
    pub fn zone(call: ZoneCall, principal: Principal, pair: &ZonePair, region: &str) -> Self {
        Self::Zone {
            call,
            principal,
            pair: pair.clone(),
            region: region.to_string(),
        }
    }
}

#[derive(Default)]
struct CloudState {
    calls: Vec<RecordedCall>,
    authorizations: BTreeSet<ZonePair>,
    associations: BTreeSet<ZonePair>,
    zone_failures: HashMap<ZoneCall, VecDeque<ApiFailure>>,
    assume_role_failure: Option<AssociationError>,
    issue_expired_credentials: bool,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct InMemoryCloud {
    state: Arc<Mutex<CloudState>>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a failure returned by the next `call`, ahead of the simulation.
    pub fn fail_next(&self, call: ZoneCall, failure: ApiFailure) {
        self.state()
            .zone_failures
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    /// Makes every subsequent AssumeRole fail with `code`.
    pub fn fail_assume_role(&self, code: &str, message: &str) {
        self.state().assume_role_failure = Some(AssociationError::AuthError {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Makes every subsequent AssumeRole return credentials that have already expired.
    pub fn issue_expired_credentials(&self) {
        self.state().issue_expired_credentials = true;
    }

    /// Delays every subsequent hosted zone call.
    pub fn delay_calls(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    pub fn associate(&self, pair: &ZonePair) {
        self.state().associations.insert(pair.clone());
    }

    pub fn is_associated(&self, pair: &ZonePair) -> bool {
        self.state().associations.contains(pair)
    }

    pub fn is_authorized(&self, pair: &ZonePair) -> bool {
        self.state().authorizations.contains(pair)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn zone_calls(&self) -> Vec<(ZoneCall, ZonePair)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Zone { call, pair, .. } => Some((call, pair)),
                RecordedCall::AssumeRole { .. } => None,
            })
            .collect()
    }

    /// Hosted zone calls with the region each one was sent to.
    pub fn zone_calls_with_region(&self) -> Vec<(ZoneCall, ZonePair, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Zone {
                    call, pair, region, ..
                } => Some((call, pair, region)),
                RecordedCall::AssumeRole { .. } => None,
            })
            .collect()
    }

    fn zones(&self, principal: Principal) -> Arc<dyn HostedZoneApi> {
        Arc::new(InMemoryZones {
            cloud: self.clone(),
            principal,
        })
    }

    async fn apply(
        &self,
        call: ZoneCall,
        principal: Principal,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        let delay = {
            let mut state = self.state();
            state
                .calls
                .push(RecordedCall::zone(call, principal, pair, region));
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(failure) = state
            .zone_failures
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
        {
            return Err(failure);
        }

        match call {
            ZoneCall::Authorize => {
                state.authorizations.insert(pair.clone());
                Ok(())
            }
            ZoneCall::Deauthorize => {
                if state.authorizations.remove(pair) {
                    Ok(())
                } else {
                    Err(ApiFailure::from_code(
                        Some("VPCAssociationAuthorizationNotFound"),
                        format!("no authorization for {pair}"),
                    ))
                }
            }
            ZoneCall::Associate => {
                if state.associations.contains(pair) {
                    return Err(ApiFailure::from_code(
                        Some("ConflictingDomainExists"),
                        format!(
                            "The VPC {} has already been associated with the hosted zone {}",
                            pair.vpc_id, pair.hosted_zone_id
                        ),
                    ));
                }
                if principal == Principal::Spoke && !state.authorizations.contains(pair) {
                    return Err(ApiFailure::from_code(
                        Some("NotAuthorizedException"),
                        format!("{} is not authorized to associate", pair.vpc_id),
                    ));
                }
                state.associations.insert(pair.clone());
                Ok(())
            }
            ZoneCall::Disassociate => {
                if state.associations.remove(pair) {
                    Ok(())
                } else {
                    Err(ApiFailure::from_code(
                        Some("VPCAssociationNotFound"),
                        format!("{pair} is not associated"),
                    ))
                }
            }
        }
    }
}

impl ZoneClients for InMemoryCloud {
    fn spoke(&self) -> Arc<dyn HostedZoneApi> {
        self.zones(Principal::Spoke)
    }

    fn hub(&self, _credentials: &HubCredentials) -> Arc<dyn HostedZoneApi> {
        self.zones(Principal::Hub)
    }
}

#[async_trait]
impl StsBroker for InMemoryCloud {
    async fn assume(
        &self,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<HubCredentials, AssociationError> {
        let mut state = self.state();
        state.calls.push(RecordedCall::AssumeRole {
            role_arn: role_arn.to_string(),
            session_name: session_name.to_string(),
        });
        if let Some(err) = state.assume_role_failure.clone() {
            return Err(err);
        }
        let expiry = if state.issue_expired_credentials {
            SystemTime::UNIX_EPOCH
        } else {
            SystemTime::now() + duration
        };
        Ok(HubCredentials {
            access_key: IN_MEMORY_ACCESS_KEY.to_string(),
            secret_key: IN_MEMORY_SECRET_KEY.to_string(),
            session_token: IN_MEMORY_SESSION_TOKEN.to_string(),
            expiry,
        })
    }
}

struct InMemoryZones {
    cloud: InMemoryCloud,
    principal: Principal,
}

#[async_trait]
impl HostedZoneApi for InMemoryZones {
    async fn create_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.cloud
            .apply(ZoneCall::Authorize, self.principal, pair, region)
            .await
    }

    async fn delete_vpc_association_authorization(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.cloud
            .apply(ZoneCall::Deauthorize, self.principal, pair, region)
            .await
    }

    async fn associate_vpc_with_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
        _comment: Option<&str>,
    ) -> Result<(), ApiFailure> {
        self.cloud
            .apply(ZoneCall::Associate, self.principal, pair, region)
            .await
    }

    async fn disassociate_vpc_from_hosted_zone(
        &self,
        pair: &ZonePair,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.cloud
            .apply(ZoneCall::Disassociate, self.principal, pair, region)
            .await
    }
}
