use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;

use crate::app::{ApiResult, AppState, internal_error, not_found};
use crate::formats::{Message, MessageStatus};
use crate::guard::{GuardView, RouteGuard};

/// Mounts a [`RouteGuard`] for the request's identity and lets the request
/// through only once the guard settles on `Authorized`. Anyone else is sent
/// to the sign-in page; a guard that cannot settle in time answers 503.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers());
    let provider = state.identity.provider_for(token.as_deref());

    let mut guard = RouteGuard::mount(provider, state.guard.clone());
    // A silent identity service leaves the guard in `Loading`; that answers 503.
    let settled = guard.settled_in_time().await;
    let view = guard.view(|| ());
    guard.unmount().await;

    match view {
        GuardView::Render(()) => next.run(request).await,
        GuardView::Redirect(redirect) => {
            tracing::info!(
                path = %request.uri().path(),
                ?settled,
                "admin request redirected to sign-in"
            );
            Redirect::to(&redirect.location).into_response()
        }
        GuardView::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            "identity service did not answer in time",
        )
            .into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

pub async fn list_messages(State(state): State<AppState>) -> ApiResult<Json<Vec<Message>>> {
    let messages = state.messages.list().await.map_err(internal_error)?;
    Ok(Json(messages))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Message>> {
    let message = state
        .messages
        .get(&id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("message"))?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    status: String,
}

pub async fn update_message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<Message>> {
    let status = MessageStatus::parse(&update.status)
        .map_err(|err| (StatusCode::BAD_REQUEST, format!("{err:#}")))?;
    let message = state
        .messages
        .update_status(&id, status)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("message"))?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.messages.delete(&id).await.map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("message"))
    }
}
