// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct HandlerOptions {
    #[arg(long, default_value = "127.0.0.1", env("PHZ_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value = "8080", env("PHZ_HTTP_PORT"))]
    pub port: u16,
    #[arg(long, env("AWS_REGION"))]
    pub region: Option<String>,
    #[arg(long, value_enum, ignore_case = true, default_value = "INFO", env("LOG_LEVEL"))]
    pub log_level: LogLevel,
    #[arg(long, default_value = "540", env("PHZ_OVERALL_DEADLINE_SECS"))]
    pub overall_deadline_secs: u64,
    #[arg(long, default_value = "30", env("PHZ_PER_CALL_DEADLINE_SECS"))]
    pub per_call_deadline_secs: u64,
    #[arg(long, default_value = "900", env("PHZ_SESSION_DURATION_SECS"))]
    pub session_duration_secs: u64,
    #[arg(long, default_value = "false", env("PHZ_SKIP_DEAUTHORIZE"), action = ArgAction::SetTrue)]
    pub skip_deauthorize: bool,
    #[arg(long, env("PHZ_SPOKE_ACCOUNT_ID"))]
    pub spoke_account_id: Option<String>,
    /// Process a single lifecycle event from this file and exit
    #[arg(long)]
    pub event: Option<PathBuf>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        HandlerOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            region: None,
            log_level: LogLevel::Info,
            overall_deadline_secs: constants::DEFAULT_OVERALL_DEADLINE.as_secs(),
            per_call_deadline_secs: constants::DEFAULT_PER_CALL_DEADLINE.as_secs(),
            session_duration_secs: constants::DEFAULT_SESSION_DURATION.as_secs(),
            skip_deauthorize: false,
            spoke_account_id: None,
            event: None,
        }
    }
}

impl HandlerOptions {
    pub fn config(&self) -> Config {
        Config {
            region: self.region.clone().filter(|region| !region.is_empty()),
            log_level: self.log_level,
            overall_deadline: Duration::from_secs(self.overall_deadline_secs),
            per_call_deadline: Duration::from_secs(self.per_call_deadline_secs),
            session_duration: Duration::from_secs(self.session_duration_secs)
                .clamp(constants::MIN_SESSION_DURATION, constants::MAX_SESSION_DURATION),
            deauthorize_after_associate: !self.skip_deauthorize,
            spoke_account_id: self.spoke_account_id.clone(),
        }
    }
}

/// Settings shared by the adapter and the workflow handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Ambient region, used when an event does not name one.
    pub region: Option<String>,
    pub log_level: LogLevel,
    pub overall_deadline: Duration,
    pub per_call_deadline: Duration,
    pub session_duration: Duration,
    pub deauthorize_after_associate: bool,
    /// Account the handler runs in. Enables the same-account short-circuit.
    pub spoke_account_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        HandlerOptions::default().config()
    }
}
