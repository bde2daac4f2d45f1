// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use phz_association::adapter::ProvisioningAdapter;
use phz_association::application::Application;
use phz_association::configuration::HandlerOptions;
use phz_association::handler::AssociationHandler;
use phz_association::models::ProvisioningEvent;
use phz_association::route53::AwsZoneClients;
use phz_association::sts::{AwsStsBroker, caller_account_id};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // get configuration options from arguments and environment variables
    let options = HandlerOptions::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| options.log_level.as_directive().into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in CloudWatch logs.
        .with_ansi(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    tracing::info!("[phz] {:?}", &options);

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = options.region.clone().filter(|region| !region.is_empty()) {
        loader = loader.region(Region::new(region));
    }
    let sdk_config = loader.load().await;

    let sts_client = aws_sdk_sts::Client::new(&sdk_config);
    let mut config = options.config();
    if config.spoke_account_id.is_none() {
        match caller_account_id(&sts_client).await {
            Ok(account_id) => {
                tracing::info!("[phz] running in account {}", account_id);
                config.spoke_account_id = Some(account_id);
            }
            Err(err) => {
                tracing::warn!("[phz] unable to resolve caller account: {}", err);
            }
        }
    }

    let handler = AssociationHandler::new(
        config,
        Arc::new(AwsStsBroker::new(sts_client)),
        Arc::new(AwsZoneClients::new(&sdk_config)),
    );
    let adapter = Arc::new(ProvisioningAdapter::new(handler));

    if let Some(path) = options.event.as_ref() {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading event from {}", path.display()))?;
        let event: ProvisioningEvent =
            serde_json::from_slice(&raw).context("parsing lifecycle event")?;
        let response = adapter.handle_event(event).await?;
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    let application = Application::build(&options, adapter).await?;

    application.run_until_stopped().await?;

    Ok(())
}
