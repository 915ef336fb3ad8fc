//! HTTP surface of the portfolio: public catalog reads, the contact form, and
//! the guarded admin inbox.

pub mod admin;
pub mod public;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::content::Catalog;
use crate::guard::{GuardConfig, HostedIdentity, IdentityProvider, SessionStore};
use crate::messages::MessageStore;

pub type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Where admin requests get their identity from.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// Bearer tokens checked against the hosted auth service.
    Hosted(HostedIdentity),
    /// In-process session, shared by every request.
    Session(SessionStore),
}

impl IdentitySource {
    pub fn provider_for(&self, access_token: Option<&str>) -> Arc<dyn IdentityProvider> {
        match self {
            Self::Hosted(hosted) => Arc::new(hosted.provider(access_token)),
            Self::Session(session) => Arc::new(session.clone()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub messages: Arc<dyn MessageStore>,
    pub identity: IdentitySource,
    pub guard: GuardConfig,
}

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/messages", get(admin::list_messages))
        .route(
            "/messages/:id",
            get(admin::get_message).delete(admin::delete_message),
        )
        .route("/messages/:id/status", put(admin::update_message_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/projects", get(public::list_projects))
        .route("/api/projects/featured", get(public::featured_projects))
        .route("/api/projects/:slug", get(public::get_project))
        .route("/api/projects/:slug/media", get(public::project_media))
        .route("/api/projects/:slug/case-study", get(public::case_study))
        .route("/api/experiences", get(public::experiences))
        .route("/api/certifications", get(public::certifications))
        .route("/api/skills", get(public::skills))
        .route("/api/messages", post(public::send_message))
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("request failed: {err:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
}

pub(crate) fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}
