//! HTTP status server.
//!
//! # Responsibilities
//! - Serve the latest published report (never probes on request)
//! - Liveness/readiness for the host's orchestration
//! - Authenticated breaker resets, forwarded to the loop as commands
//!
//! Admin routes exist only when `status.admin_token` is configured.

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::StatusConfig;
use crate::status::auth::admin_auth_middleware;
use crate::status::handlers;
use crate::status::report::StatusReport;
use crate::supervisor::SupervisorCommand;

/// State injected into handlers.
#[derive(Clone)]
pub struct StatusState {
    pub report: Arc<ArcSwap<StatusReport>>,
    pub commands: mpsc::Sender<SupervisorCommand>,
    pub admin_token: Option<Arc<str>>,
}

pub struct StatusServer {
    router: Router,
}

impl StatusServer {
    pub fn new(
        config: &StatusConfig,
        report: Arc<ArcSwap<StatusReport>>,
        commands: mpsc::Sender<SupervisorCommand>,
    ) -> Self {
        let state = StatusState {
            report,
            commands,
            admin_token: config.admin_token.as_deref().map(Arc::from),
        };
        Self {
            router: build_router(state, Duration::from_secs(config.request_timeout_secs)),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Status server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: StatusState, request_timeout: Duration) -> Router {
    let mut router = Router::new()
        .route("/live", get(handlers::live))
        .route("/ready", get(handlers::ready))
        .route("/health", get(handlers::health))
        .route("/health/detailed", get(handlers::health_detailed))
        .route("/status", get(handlers::status));

    if state.admin_token.is_some() {
        let admin = Router::new()
            .route("/admin/reset", post(handlers::reset_all))
            .route("/admin/reset/{service}", post(handlers::reset_service))
            .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));
        router = router.merge(admin);
    }

    router
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}
