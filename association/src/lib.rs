// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # PHZ Association
//!
//! Custom resource handler that associates a spoke VPC with a Route 53
//! private hosted zone owned by a hub account.
//!
//! ## Architecture
//!
//! ```text
//! Engine -> HTTP API / --event -> Adapter -> Handler -> STS (hub role)
//!                                    |            |
//!                                    |            +-> Route 53 (hub: authorize)
//!                                    |            +-> Route 53 (spoke: associate)
//!                                    +-> ResponseURL (PUT)
//! ```
//!
//! On Create the handler assumes a role in the hub account, authorizes the
//! spoke VPC against the hosted zone, associates the VPC with spoke
//! credentials and revokes the authorization again. Delete disassociates
//! with spoke credentials only.
//!
//! ## Modules
//!
//! - [`adapter`]: translates engine events into lifecycle events and back
//! - [`application`]: HTTP server setup with Axum
//! - [`associator`]: spoke-side associate/disassociate calls
//! - [`authorizer`]: hub-side authorization calls
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: deadlines, retry limits and validation bounds
//! - [`errors`]: error taxonomy and HTTP response mapping
//! - [`handler`]: Create/Update/Delete workflows
//! - `memory`: in-memory Route 53 and STS used by tests (feature `test-util`)
//! - [`models`]: request, credential and wire types with validation
//! - [`phz`]: hosted zone API seam, outcome classification and retries
//! - [`responder`]: delivery of responses to the engine
//! - [`retry`]: backoff policy
//! - [`route53`]: AWS SDK implementation of the hosted zone API
//! - [`routes`]: HTTP route handlers (health, events)
//! - [`sts`]: role assumption and session naming
//!
//! ## Usage
//!
//! ```bash
//! phz-association --host 127.0.0.1 --port 8080 --region eu-west-1
//! phz-association --event create.json
//! ```
//!
//! ## Security Considerations
//!
//! - Hub credentials are zeroized on drop and never logged or returned
//! - Hub credentials live only for the duration of one Create
//! - Request bodies are limited to 1 MiB

pub mod adapter;
pub mod application;
pub mod associator;
pub mod authorizer;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod handler;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod phz;
pub mod responder;
pub mod retry;
pub mod route53;
pub mod routes;
pub mod sts;
