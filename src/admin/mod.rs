//! Administrative HTTP API.
//!
//! # Data Flow
//! ```text
//! sipctl / deployment tooling
//!     → SetRequestId → Trace → bearer auth
//!     → handlers.rs → ApplicationContainer / ApplicationDescriptor
//!     → JSON response
//! ```
//!
//! # Design Decisions
//! - Every route requires the bearer key; an empty key rejects everything
//! - Unknown application is 404; a selected but unregistered handler is 409

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::container::ApplicationContainer;
use crate::lifecycle::Shutdown;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub container: Arc<ApplicationContainer>,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(container: Arc<ApplicationContainer>, api_key: impl Into<Arc<str>>) -> Self {
        Self { container, api_key: api_key.into(), started: Instant::now() }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/applications", get(list_applications))
        .route(
            "/admin/applications/{name}",
            get(get_application).delete(undeploy_application),
        )
        .route("/admin/applications/{name}/resolve", post(resolve))
        .route("/admin/applications/{name}/listeners", post(add_listener))
        .route(
            "/admin/applications/{name}/listeners/{listener}",
            delete(remove_listener),
        )
        .route(
            "/admin/applications/{name}/mappings",
            post(add_mapping).delete(remove_mapping),
        )
        .route("/admin/applications/{name}/concurrency", put(set_concurrency))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    let mut stop = shutdown.subscribe();
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = stop.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
