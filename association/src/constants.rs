// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// Prefix of every physical resource id this handler returns.
pub const PHYSICAL_ID_PREFIX: &str = "assoc";
pub const PHYSICAL_ID_SEPARATOR: &str = "::";
/// Prefix reported for a Create that never reached the provider.
pub const FAILED_ID_PREFIX: &str = "failed";

pub const DEFAULT_OVERALL_DEADLINE: Duration = Duration::from_secs(9 * 60); // below the 1 hour provisioning timeout
pub const DEFAULT_PER_CALL_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(15 * 60);
/// STS rejects sessions shorter than 15 minutes or longer than 12 hours
pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(15 * 60);
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

pub const MAX_ATTEMPTS: u32 = 5;
pub const BACKOFF_BASE: Duration = Duration::from_millis(200);
pub const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// https://docs.aws.amazon.com/STS/latest/APIReference/API_AssumeRole.html
pub const MAX_SESSION_NAME_LENGTH: usize = 64;
pub const MIN_SESSION_NAME_LENGTH: usize = 2;
pub const SESSION_NAME_PREFIX: &str = "phz-assoc";

pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024; // 1 MB

// Validation constants for AssociationProperties
pub const MAX_VPC_ID_LENGTH: u64 = 32;
pub const MAX_HOSTED_ZONE_ID_LENGTH: u64 = 32;
pub const MAX_REGION_LENGTH: u64 = 64;
pub const MAX_ROLE_ARN_LENGTH: u64 = 2048;
pub const ACCOUNT_ID_LENGTH: usize = 12;
/// Route 53 limits the association comment to 256 characters
pub const MAX_COMMENT_LENGTH: usize = 256;
