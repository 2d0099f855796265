use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::Stream;
use promdash_core::filter::NameFilter;
use promdash_ingest::poller::Snapshot;
use promdash_render::{MetricsView, build_view};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

#[derive(Clone)]
pub struct ViewState {
    snapshots: watch::Receiver<Snapshot>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    only: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub sequence: u64,
    pub polled_at: Option<DateTime<Utc>>,
    pub view: Option<MetricsView>,
    pub error: Option<String>,
}

impl ViewResponse {
    fn from_snapshot(snapshot: &Snapshot, filter: &NameFilter) -> Self {
        let view = snapshot.payload.as_ref().map(|payload| {
            let mut payload = payload.clone();
            payload.metrics = filter.apply(payload.metrics);
            build_view(&payload)
        });
        Self {
            sequence: snapshot.sequence,
            polled_at: snapshot.polled_at,
            view,
            error: snapshot.error.clone(),
        }
    }
}

pub fn router(snapshots: watch::Receiver<Snapshot>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/health", get(health))
        .route("/api/prometheus-metrics", get(canonical_payload))
        .route("/api/metrics/view", get(metrics_view))
        .route("/api/metrics/stream", get(metrics_stream))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(ViewState { snapshots })
}

pub async fn run_view_server(
    snapshots: watch::Receiver<Snapshot>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind view listener {addr}"))?;
    tracing::info!(%addr, "view server listening");
    axum::serve(listener, router(snapshots))
        .await
        .context("view server")
}

async fn health(State(state): State<ViewState>) -> Json<serde_json::Value> {
    let snapshot = state.snapshots.borrow();
    Json(serde_json::json!({
        "status": "ok",
        "sequence": snapshot.sequence,
        "has_payload": snapshot.payload.is_some(),
    }))
}

async fn canonical_payload(State(state): State<ViewState>) -> Response {
    let snapshot = state.snapshots.borrow().clone();
    match snapshot.payload {
        Some(payload) => Json(payload).into_response(),
        None => {
            let error = snapshot
                .error
                .unwrap_or_else(|| "no successful poll yet".to_string());
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": error })),
            )
                .into_response()
        }
    }
}

async fn metrics_view(State(state): State<ViewState>, Query(query): Query<ViewQuery>) -> Response {
    let filter = match NameFilter::from_option(query.only.as_deref()) {
        Ok(filter) => filter,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };
    let snapshot = state.snapshots.borrow().clone();
    Json(ViewResponse::from_snapshot(&snapshot, &filter)).into_response()
}

async fn metrics_stream(
    State(state): State<ViewState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.snapshots.clone();
    let filter = NameFilter::all();
    let stream = async_stream::stream! {
        // current state first, then one event per completed poll
        let current = rx.borrow_and_update().clone();
        if current.sequence > 0 {
            yield Ok(snapshot_event(&current, &filter));
        }
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            yield Ok(snapshot_event(&snapshot, &filter));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn snapshot_event(snapshot: &Snapshot, filter: &NameFilter) -> Event {
    let response = ViewResponse::from_snapshot(snapshot, filter);
    Event::default()
        .event("snapshot")
        .id(snapshot.sequence.to_string())
        .json_data(&response)
        .unwrap_or_else(|err| Event::default().event("error").data(err.to_string()))
}
