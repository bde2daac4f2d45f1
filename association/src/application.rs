// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use crate::adapter::ProvisioningAdapter;
use crate::configuration::HandlerOptions;
use crate::constants::MAX_REQUEST_BODY_SIZE;
use crate::routes;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::serve::Serve;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<ProvisioningAdapter>,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(
        options: &HandlerOptions,
        adapter: Arc<ProvisioningAdapter>,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let server = run(listener, adapter);
        let port = server.local_addr()?.port();

        tracing::info!("[phz] listening at http://{}:{}", options.host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Builds the router with the same body limit used in production.
pub fn create_router(adapter: Arc<ProvisioningAdapter>) -> Router {
    let state = Arc::new(AppState { adapter });

    Router::new()
        .route("/health", get(routes::health))
        .route("/events", post(routes::events))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .with_state(state)
}

#[tracing::instrument(skip_all)]
pub fn run(listener: TcpListener, adapter: Arc<ProvisioningAdapter>) -> Serve<TcpListener, Router, Router> {
    axum::serve(listener, create_router(adapter))
}
