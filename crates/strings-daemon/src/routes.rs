//! Axum router and all HTTP handlers for strings-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: each one runs exactly one
//! `StringsService` operation (one transaction) and maps the outcome.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use strings_engine::{EngineError, Repository};
use strings_reconcile::ErrorKind;
use strings_schemas::ClientThread;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    api_types::{ErrorResponse, HealthResponse, ListThreadsQuery, ThreadIdsResponse},
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router<R: Repository>(state: Arc<AppState<R>>) -> Router {
    Router::new()
        .route("/v1/health", get(health::<R>))
        .route("/v1/stream", get(stream::<R>))
        .route("/v1/threads", post(post_thread::<R>).get(list_threads::<R>))
        .route("/v1/threads/:id", get(get_thread::<R>))
        .route("/v1/threads/:id/archive", post(archive_thread::<R>))
        .route("/v1/threads/:id/restore", post(restore_thread::<R>))
        .route("/v1/threads/:id/delete", post(delete_thread::<R>))
        .route("/v1/strings/:id/archive", post(archive_string::<R>))
        .route("/v1/strings/:id/restore", post(restore_string::<R>))
        .route("/v1/strings/:id/delete", post(delete_string::<R>))
        .route("/v1/strings/:id/activate", post(activate_string::<R>))
        .route("/v1/strings/:id/deactivate", post(deactivate_string::<R>))
        .route("/v1/strings/:id/private", post(make_private::<R>))
        .route("/v1/strings/:id/public", post(make_public::<R>))
        .with_state(state)
}

/// 200 with the JSON body, or the mapped engine error.
fn respond<T: Serialize>(result: Result<T, EngineError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Validation 400, conflict 409, not found 404, persistence 500.
pub(crate) fn error_response(err: EngineError) -> Response {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.code().to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health<R: Repository>(State(st): State<Arc<AppState<R>>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/threads
// ---------------------------------------------------------------------------

pub(crate) async fn post_thread<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Json(body): Json<ClientThread>,
) -> Response {
    let result = st.service.post_thread(body).await;
    if let Ok(t) = &result {
        info!(thread_id = %t.thread_id, version = t.version, "threads/post");
    }
    respond(result)
}

pub(crate) async fn list_threads<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Query(q): Query<ListThreadsQuery>,
) -> Response {
    if q.only_ids {
        let result = st
            .service
            .get_thread_ids()
            .await
            .map(|thread_ids| ThreadIdsResponse { thread_ids });
        return respond(result);
    }
    respond(st.service.get_threads().await)
}

pub(crate) async fn get_thread<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.get_thread_by_id(id).await)
}

pub(crate) async fn archive_thread<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.archive_thread(id).await)
}

pub(crate) async fn restore_thread<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.restore_thread(id).await)
}

pub(crate) async fn delete_thread<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.delete_thread(id).await)
}

// ---------------------------------------------------------------------------
// /v1/strings/:id/*
// ---------------------------------------------------------------------------

pub(crate) async fn archive_string<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.archive_string(id).await)
}

pub(crate) async fn restore_string<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.restore_string(id).await)
}

pub(crate) async fn delete_string<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.delete_string(id).await)
}

pub(crate) async fn activate_string<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.activate_string(id).await)
}

pub(crate) async fn deactivate_string<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.deactivate_string(id).await)
}

pub(crate) async fn make_private<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.make_private(id).await)
}

pub(crate) async fn make_public<R: Repository>(
    State(st): State<Arc<AppState<R>>>,
    Path(id): Path<Uuid>,
) -> Response {
    respond(st.service.make_public(id).await)
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream<R: Repository>(State(st): State<Arc<AppState<R>>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
