use crate::engine::gate::DeliverOutcome;
use crate::engine::turn::Turn;
use crate::engine::{EngineError, Runtime};
use crate::shared::now_iso;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;

static PANEL_HTML: &str = include_str!("../../assets/panel.html");

const KEEP_ALIVE_SECS: u64 = 15;
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"ok": false, "error": self.message})),
        )
            .into_response()
    }
}

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .route("/", get(panel))
        .route("/events", get(events))
        .route("/health", get(health))
        .route("/render_job", get(render_job))
        .route("/annotated", post(annotated))
        .route("/pause", post(pause))
        .route("/unpause", post(unpause))
        .route(
            "/allowed_tools",
            get(allowed_tools_get).post(allowed_tools_set),
        )
        .route("/debug/execute", post(debug_execute))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(runtime)
}

pub async fn serve(
    runtime: Arc<Runtime>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    let app = router(Arc::clone(&runtime));
    runtime.log("info", "http.started", "serving panel endpoints");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(runtime))
        .await
}

async fn shutdown_signal(runtime: Arc<Runtime>) {
    let _ = tokio::signal::ctrl_c().await;
    runtime.begin_shutdown();
}

async fn panel() -> Html<&'static str> {
    Html(PANEL_HTML)
}

async fn health(State(rt): State<Arc<Runtime>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "paused": rt.state.is_paused(),
        "run_dir": rt.paths.root.display().to_string(),
        "ts": now_iso(),
        "last_seq": rt.state.last_seq(),
        "last_error": rt.state.last_error(),
    }))
}

async fn render_job(State(rt): State<Arc<Runtime>>) -> Json<Value> {
    match rt.gate.peek().and_then(|job| serde_json::to_value(job).ok()) {
        Some(job) => Json(job),
        None => Json(json!({"waiting": true})),
    }
}

async fn annotated(
    State(rt): State<Arc<Runtime>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let seq = body
        .get("seq")
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::bad_request("missing or invalid `seq`"))?;
    let image = body
        .get("image_b64")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match rt.gate.deliver(seq, image) {
        DeliverOutcome::Accepted => Ok(Json(json!({"ok": true}))),
        DeliverOutcome::EmptyImage => Err(ApiError::bad_request("annotated image is empty")),
        DeliverOutcome::Stale { expected, got } => Err(ApiError::conflict(format!(
            "seq mismatch (got {got}, want {expected})"
        ))),
        DeliverOutcome::NoPending => Err(ApiError::conflict("no outstanding render job")),
    }
}

async fn pause(State(rt): State<Arc<Runtime>>) -> Json<Value> {
    rt.set_paused(true);
    Json(json!({"paused": true}))
}

async fn unpause(State(rt): State<Arc<Runtime>>) -> Json<Value> {
    rt.set_paused(false);
    Json(json!({"paused": false}))
}

async fn allowed_tools_get(State(rt): State<Arc<Runtime>>) -> Json<Vec<String>> {
    Json(rt.policy.snapshot())
}

async fn allowed_tools_set(
    State(rt): State<Arc<Runtime>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let Some(items) = body.as_array() else {
        return Err(ApiError::bad_request("expected a json array of tool names"));
    };
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(name) => names.push(name.to_string()),
            None => return Err(ApiError::bad_request("tool names must be strings")),
        }
    }
    match rt.policy.replace(names) {
        Ok(()) => Ok(Json(json!({"ok": true}))),
        Err(EngineError::UnknownTool { name }) => {
            Err(ApiError::bad_request(format!("unknown tool `{name}`")))
        }
        Err(err) => Err(ApiError::internal(err.to_string())),
    }
}

async fn debug_execute(
    State(rt): State<Arc<Runtime>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let story = body
        .get("story_text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let runtime = Arc::clone(&rt);
    let allowed = runtime.policy.snapshot();
    let result = tokio::task::spawn_blocking(move || {
        runtime.executor.invoke(&story, &allowed, true, &runtime.stop)
    })
    .await
    .map_err(|err| ApiError::internal(format!("debug execution task failed: {err}")))?;

    match result {
        Ok(response) => Ok(Json(json!({
            "executed": response.executed,
            "malformed": response.malformed,
            "raw_image_b64": response.raw_image_b64,
        }))),
        Err(err) => Err(ApiError::internal(err.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    replay: Option<usize>,
}

async fn events(
    State(rt): State<Arc<Runtime>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before snapshotting the ring so nothing published in
    // between is lost; live events that overlap the replay are dropped by
    // the seq cutoff below.
    let rx = rt.broker.subscribe();
    let replay = rt.store.recent(query.replay.unwrap_or(0));
    let max_replayed = replay.last().map(|turn| turn.seq).unwrap_or(0);

    let backlog: Vec<Result<Event, Infallible>> = replay
        .iter()
        .filter_map(|turn| turn_event(turn))
        .map(Ok)
        .collect();
    let live = BroadcastStream::new(rx).filter_map(move |item| {
        let event = match item {
            Ok(turn) if turn.seq > max_replayed => turn_event(&turn).map(Ok),
            // Lagged subscribers skip ahead; overlap with replay is dropped.
            _ => None,
        };
        futures::future::ready(event)
    });

    Sse::new(stream::iter(backlog).chain(live)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

fn turn_event(turn: &Turn) -> Option<Event> {
    serde_json::to_string(turn)
        .ok()
        .map(|data| Event::default().data(data))
}
