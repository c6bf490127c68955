//! Gateway assembly: router, middleware stack, and server lifecycle.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use audit_ledger::AuditLog;
use config_registry::ConfigRegistry;
use event_replay::ReplayEngine;
use intent_service::IntentService;
use state_projection::StateProjection;

use crate::config::GatewayConfig;
use crate::routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub intents: Arc<IntentService>,
    pub projection: Arc<StateProjection>,
    pub config: Arc<ConfigRegistry>,
    pub replay: Arc<ReplayEngine>,
    pub audit: Arc<AuditLog>,
}

/// Build the operator router with its middleware stack.
#[must_use]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(TimeoutLayer::new(config.request_timeout));

    let mut router = Router::new()
        .route(
            "/operator/intents",
            post(routes::intents::submit_intent).get(routes::intents::list_intents),
        )
        .route("/operator/intents/stream", get(routes::stream::intent_stream))
        .route("/operator/state", get(routes::state::operator_state))
        .route("/operator/history/state", get(routes::state::historical_state))
        .route("/operator/config/override", post(routes::config::create_override))
        .route("/operator/config/rollback", post(routes::config::rollback))
        .route("/operator/config/preset", post(routes::config::apply_preset))
        .route("/health", get(health_check))
        .layer(middleware)
        .with_state(state);

    if config.permissive_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "operator-gateway",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// The gateway server.
pub struct OperatorGateway {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl OperatorGateway {
    /// Validate configuration and construct the server.
    ///
    /// # Errors
    ///
    /// A description of the invalid configuration field.
    pub fn new(config: GatewayConfig, state: AppState) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            state,
            shutdown_tx: None,
        })
    }

    /// Bind and serve until shutdown.
    ///
    /// # Errors
    ///
    /// I/O errors from bind or serve.
    pub async fn serve(&mut self) -> std::io::Result<()> {
        let router = build_router(&self.config, self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "Operator gateway listening");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!("Operator gateway shutting down");
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "Operator gateway server error");
        }
        result
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
