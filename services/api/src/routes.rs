use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json};
use leave_desk::leave::router::actor_from;
use leave_desk::leave::{
    leave_router, InMemoryNotifier, LeaveRequestService, LeaveStore, NotificationKind, Notifier,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_leave_routes<S, N>(
    service: Arc<LeaveRequestService<S, N>>,
    notifier: Arc<InMemoryNotifier>,
) -> axum::Router
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    leave_router(service)
        .route("/api/v1/notifications", get(notifications_endpoint))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(notifier))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InboxParams {
    #[serde(default)]
    pub(crate) kind: Option<NotificationKind>,
}

/// Inbox of the acting employee, newest first.
pub(crate) async fn notifications_endpoint(
    Extension(notifier): Extension<Arc<InMemoryNotifier>>,
    Query(params): Query<InboxParams>,
    headers: HeaderMap,
) -> Response {
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match notifier.inbox(&actor) {
        Ok(mut inbox) => {
            if let Some(kind) = params.kind {
                inbox.retain(|notification| notification.kind == kind);
            }
            (StatusCode::OK, Json(inbox)).into_response()
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}
