use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{delete, get, post, put},
    Router,
};
use overturned_core::{
    chat::{AttachError, AttachmentInfo, ChatPanel, PanelSnapshot, PanelState, SubmitError},
    evidence::{EvidenceSnapshot, EMPTY_EVIDENCE_ERROR},
    prompt::format_context,
    render::{escape_html, render_html, render_sources_html},
    types::{AttachedFile, CaseContext, CaseField, CitationSource, Role, Turn},
};
use overturned_domains::legal::{field_placeholder, APP_NAME, DISCLAIMER};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::AppState;

/// Room for multipart framing on top of the per-file upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub(crate) fn router(state: Arc<AppState>, dashboard_dir: &str) -> Router {
    let serve_dir = ServeDir::new(dashboard_dir)
        .fallback(ServeFile::new(format!("{dashboard_dir}/index.html")));
    let body_limit = state
        .config
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/app", get(get_app))
        // Tabs
        .route("/api/tabs", get(get_tabs))
        .route("/api/tabs/active", put(put_active_tab))
        // Case context
        .route("/api/case", get(get_case).put(put_case))
        // Chat panels
        .route("/api/panels/:tab", get(get_panel))
        .route("/api/panels/:tab/attachments", post(post_panel_attachments))
        .route(
            "/api/panels/:tab/attachments/:index",
            delete(delete_panel_attachment),
        )
        .route("/api/panels/:tab/messages", post(post_panel_message))
        // Evidence form
        .route("/api/evidence", get(get_evidence))
        .route("/api/evidence/attachments", post(post_evidence_attachments))
        .route(
            "/api/evidence/attachments/:index",
            delete(delete_evidence_attachment),
        )
        .route("/api/evidence/analyze", post(post_evidence_analyze))
        // SSE logs
        .route("/api/logs", get(sse_logs))
        // Static front-end
        .fallback_service(serve_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ── Error helpers ─────────────────────────────────────────────────────────

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

pub(crate) fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("internal error: {e}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn submit_error(e: SubmitError) -> ApiError {
    match e {
        SubmitError::Empty => api_error(StatusCode::BAD_REQUEST, e),
        SubmitError::Busy => api_error(StatusCode::CONFLICT, e),
    }
}

fn attach_error(e: AttachError) -> ApiError {
    match e {
        AttachError::Busy => api_error(StatusCode::CONFLICT, e),
        AttachError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e),
    }
}

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ActiveTabBody {
    pub tab: String,
}

#[derive(Deserialize)]
pub(crate) struct TextBody {
    #[serde(default)]
    pub text: String,
}

// ── Serializable wrappers ─────────────────────────────────────────────────

#[derive(Serialize)]
struct TurnJson {
    id: String,
    role: Role,
    text: String,
    sources: Option<Vec<CitationSource>>,
    html: String,
    sources_html: Option<String>,
}

impl From<Turn> for TurnJson {
    fn from(t: Turn) -> Self {
        let html = match t.role {
            Role::User => escape_html(&t.text),
            Role::Assistant => render_html(&t.text, t.sources.as_deref()),
        };
        let sources_html = t.sources.as_deref().map(render_sources_html);
        Self {
            id: t.id,
            role: t.role,
            text: t.text,
            sources: t.sources,
            html,
            sources_html,
        }
    }
}

#[derive(Serialize)]
struct PanelJson {
    name: String,
    state: PanelState,
    turns: Vec<TurnJson>,
    attachments: Vec<AttachmentInfo>,
}

impl From<PanelSnapshot> for PanelJson {
    fn from(s: PanelSnapshot) -> Self {
        Self {
            name: s.name,
            state: s.state,
            turns: s.turns.into_iter().map(TurnJson::from).collect(),
            attachments: s.attachments,
        }
    }
}

#[derive(Serialize)]
struct EvidenceJson {
    #[serde(flatten)]
    form: EvidenceSnapshot,
    result_html: Option<String>,
}

impl From<EvidenceSnapshot> for EvidenceJson {
    fn from(form: EvidenceSnapshot) -> Self {
        let result_html = form.result.as_deref().map(|r| render_html(r, None));
        Self { form, result_html }
    }
}

fn case_json(case: &CaseContext) -> Value {
    let fields: Vec<Value> = CaseField::ALL
        .iter()
        .map(|&field| {
            json!({
                "key": field.key(),
                "label": field.label(),
                "placeholder": field_placeholder(field),
                "value": case.get(field),
            })
        })
        .collect();
    json!({ "fields": fields, "context": format_context(case) })
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_app(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "name": APP_NAME,
        "disclaimer": DISCLAIMER,
        "uptime_s": state.start_time.elapsed().as_secs(),
    }))
}

// Tabs

async fn get_tabs(State(state): State<Arc<AppState>>) -> Json<Value> {
    let active = state.active_tab.read().await.clone();
    Json(json!({
        "active": active,
        "tabs": overturned_domains::all_tabs(),
    }))
}

async fn put_active_tab(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActiveTabBody>,
) -> Json<Value> {
    let tab = overturned_domains::select_tab(&body.tab);
    *state.active_tab.write().await = tab.name.clone();
    info!(tab = %tab.name, "active tab changed");
    Json(json!({ "active": tab.name, "tab": tab }))
}

// Case context

async fn get_case(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(case_json(&*state.case.read().await))
}

/// Field-wise update. Every key is validated before anything is written.
async fn put_case(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let updates = body
        .into_iter()
        .map(|(key, value)| {
            key.parse::<CaseField>()
                .map(|field| (field, value))
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut case = state.case.write().await;
    for (field, value) in &updates {
        case.set(*field, value.as_str());
    }
    info!(fields = updates.len(), filled = case.filled().count(), "case context updated");
    Ok(Json(case_json(&case)))
}

// Chat panels

fn chat_panel(
    state: &AppState,
    tab: &str,
) -> Result<Arc<ChatPanel>, ApiError> {
    state
        .panel(tab)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no chat panel for tab {tab}")))
}

async fn get_panel(
    State(state): State<Arc<AppState>>,
    Path(tab): Path<String>,
) -> Result<Json<PanelJson>, ApiError> {
    let panel = chat_panel(&state, &tab)?;
    Ok(Json(panel.snapshot().await.into()))
}

/// Collect every file field of a multipart body.
async fn read_files(mut multipart: Multipart, limit: usize) -> Result<Vec<AttachedFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| api_error(e.status(), e.body_text()))?;
        if data.len() > limit {
            return Err(api_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("{name} exceeds the upload limit of {limit} bytes"),
            ));
        }
        files.push(AttachedFile::new(name, mime_type.as_deref(), data.to_vec()));
    }
    if files.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "no files in upload"));
    }
    Ok(files)
}

async fn post_panel_attachments(
    State(state): State<Arc<AppState>>,
    Path(tab): Path<String>,
    multipart: Multipart,
) -> Result<Json<PanelJson>, ApiError> {
    let panel = chat_panel(&state, &tab)?;
    for file in read_files(multipart, state.config.max_upload_bytes()).await? {
        panel.attach(file).await.map_err(attach_error)?;
    }
    Ok(Json(panel.snapshot().await.into()))
}

async fn delete_panel_attachment(
    State(state): State<Arc<AppState>>,
    Path((tab, index)): Path<(String, usize)>,
) -> Result<Json<PanelJson>, ApiError> {
    let panel = chat_panel(&state, &tab)?;
    panel.remove_attachment(index).await.map_err(attach_error)?;
    Ok(Json(panel.snapshot().await.into()))
}

/// Runs the turn on its own task so a dropped client connection does not
/// cancel it halfway; the reply still lands in the panel history.
async fn post_panel_message(
    State(state): State<Arc<AppState>>,
    Path(tab): Path<String>,
    Json(body): Json<TextBody>,
) -> Result<Json<TurnJson>, ApiError> {
    let panel = chat_panel(&state, &tab)?;
    let case = state.case.read().await.clone();
    let dispatcher = Arc::clone(&state.dispatcher);

    let turn = tokio::spawn(async move { panel.submit(&body.text, &case, &dispatcher).await })
        .await
        .map_err(internal)?
        .map_err(submit_error)?;
    Ok(Json(turn.into()))
}

// Evidence form

async fn get_evidence(State(state): State<Arc<AppState>>) -> Json<EvidenceJson> {
    Json(state.evidence.snapshot().await.into())
}

async fn post_evidence_attachments(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<EvidenceJson>, ApiError> {
    for file in read_files(multipart, state.config.max_upload_bytes()).await? {
        state.evidence.attach(file).await.map_err(attach_error)?;
    }
    Ok(Json(state.evidence.snapshot().await.into()))
}

async fn delete_evidence_attachment(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<EvidenceJson>, ApiError> {
    state
        .evidence
        .remove_attachment(index)
        .await
        .map_err(attach_error)?;
    Ok(Json(state.evidence.snapshot().await.into()))
}

async fn post_evidence_analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TextBody>,
) -> Result<Json<EvidenceJson>, ApiError> {
    let evidence = Arc::clone(&state.evidence);
    let case = state.case.read().await.clone();
    let dispatcher = Arc::clone(&state.dispatcher);

    let form = tokio::spawn(async move { evidence.analyze(&body.text, &case, &dispatcher).await })
        .await
        .map_err(internal)?
        .map_err(|e| match e {
            SubmitError::Empty => api_error(StatusCode::BAD_REQUEST, EMPTY_EVIDENCE_ERROR),
            other => submit_error(other),
        })?;
    Ok(Json(form.into()))
}

// SSE logs: replays the ring buffer, then streams live lines

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    // Subscribe before snapshotting the ring so nothing falls in between
    let mut live_rx = state.log_tx.subscribe();
    let history: Vec<String> = state
        .log_ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio::spawn(async move {
        for line in history {
            if tx.send(line).is_err() {
                return;
            }
        }
        loop {
            match live_rx.recv().await {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
    let stream = UnboundedReceiverStream::new(rx)
        .map(|data| Ok::<_, std::convert::Infallible>(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use overturned_core::{
        agent::ModelBackend,
        chat::PanelState,
        config::Config,
        types::{CitationSource, GenerateRequest, ModelReply},
    };
    use serde_json::{json, Value};
    use tokio::sync::{broadcast, Semaphore};
    use tower::ServiceExt;

    use crate::AppState;

    struct FakeBackend {
        requests: Mutex<Vec<GenerateRequest>>,
        gate: Option<Semaphore>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                gate: Some(Semaphore::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_prompt(&self) -> String {
            self.requests.lock().unwrap().last().unwrap().prompt.clone()
        }
    }

    #[async_trait]
    impl ModelBackend for FakeBackend {
        async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
            self.requests.lock().unwrap().push(request);
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
            Ok(ModelReply {
                text: "Per [1], see [the statute](https://law.example/459).".into(),
                sources: Some(vec![CitationSource {
                    uri: "https://courts.example/a".into(),
                    title: "People v. A".into(),
                }]),
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn app(backend: Arc<FakeBackend>) -> (Router, Arc<AppState>) {
        let config = Arc::new(Config::from_dotenv_str("API_KEY=k\nMAX_UPLOAD_MB=1").unwrap());
        let (log_tx, _) = broadcast::channel(16);
        let state = Arc::new(AppState::new(
            config,
            backend,
            log_tx,
            Arc::new(Mutex::new(VecDeque::new())),
        ));
        (super::router(Arc::clone(&state), "dist"), state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "overturned-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_app_info() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let (status, body) = send(&app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, body) = send(&app, get("/api/app")).await;
        assert_eq!(body["name"], "Overturned");
        assert!(body["disclaimer"].as_str().unwrap().contains("not a substitute"));
    }

    #[tokio::test]
    async fn tab_selection_resolves_aliases_and_falls_back() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let (_, body) = send(&app, get("/api/tabs")).await;
        assert_eq!(body["active"], "case-overview");
        assert_eq!(body["tabs"].as_array().unwrap().len(), 4);

        let (_, body) = send(&app, json_req("PUT", "/api/tabs/active", json!({ "tab": "motion" }))).await;
        assert_eq!(body["active"], "motion-drafter");

        let (_, body) = send(&app, json_req("PUT", "/api/tabs/active", json!({ "tab": "nope" }))).await;
        assert_eq!(body["active"], "case-overview");
    }

    #[tokio::test]
    async fn case_update_rejects_unknown_keys_atomically() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let req = json_req("PUT", "/api/case", json!({ "jurisdiction": "CA", "shoeSize": "9" }));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, get("/api/case")).await;
        assert_eq!(body["fields"][0]["value"], "");
        assert_eq!(body["context"], "");
    }

    #[tokio::test]
    async fn case_context_reaches_the_prompt() {
        let backend = Arc::new(FakeBackend::new());
        let (app, _) = app(Arc::clone(&backend));
        let (status, body) = send(&app, json_req("PUT", "/api/case", json!({ "jurisdiction": "CA" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"][0]["label"], "Jurisdiction");
        assert_eq!(body["fields"][0]["value"], "CA");

        let req = json_req("POST", "/api/panels/overview/messages", json!({ "text": "PC 459?" }));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(backend.last_prompt().contains("Jurisdiction: CA"));
        assert!(backend.last_prompt().ends_with("User Query: PC 459?"));
    }

    #[tokio::test]
    async fn panel_starts_with_greeting() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let (status, body) = send(&app, get("/api/panels/case-overview")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["turns"].as_array().unwrap().len(), 1);
        assert_eq!(body["turns"][0]["id"], "initial");
        assert_eq!(body["turns"][0]["role"], "assistant");
    }

    #[tokio::test]
    async fn evidence_tab_is_not_a_chat_panel() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let (status, _) = send(&app, get("/api/panels/evidence")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_dispatch() {
        let backend = Arc::new(FakeBackend::new());
        let (app, _) = app(Arc::clone(&backend));
        let req = json_req("POST", "/api/panels/motion/messages", json!({ "text": "   " }));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn reply_is_rendered_with_citations() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let req = json_req("POST", "/api/panels/collateral/messages", json!({ "text": "Visa impact?" }));
        let (status, turn) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(turn["role"], "assistant");
        let html = turn["html"].as_str().unwrap();
        assert!(html.contains(r#"class="citation" href="https://courts.example/a""#));
        assert!(html.contains(r#"href="https://law.example/459""#));
        assert!(turn["sources_html"].as_str().unwrap().contains("People v. A"));

        let (_, panel) = send(&app, get("/api/panels/collateral-consequences")).await;
        assert_eq!(panel["turns"].as_array().unwrap().len(), 3);
        assert_eq!(panel["turns"][1]["text"], "Visa impact?");
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_a_conflict() {
        let backend = Arc::new(FakeBackend::gated());
        let (app, state) = app(Arc::clone(&backend));

        let first = tokio::spawn({
            let app = app.clone();
            async move {
                let req = json_req("POST", "/api/panels/overview/messages", json!({ "text": "one" }));
                app.oneshot(req).await.unwrap().status()
            }
        });
        let panel = state.panel("overview").unwrap();
        while panel.state().await != PanelState::AwaitingResponse {
            tokio::task::yield_now().await;
        }

        let req = json_req("POST", "/api/panels/overview/messages", json!({ "text": "two" }));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, upload("/api/panels/overview/attachments", "a.txt", "text/plain", b"x")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        if let Some(gate) = &backend.gate {
            gate.add_permits(1);
        }
        assert_eq!(first.await.unwrap(), StatusCode::OK);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn attachments_stage_and_unstage() {
        let backend = Arc::new(FakeBackend::new());
        let (app, _) = app(Arc::clone(&backend));
        let (status, body) = send(&app, upload("/api/panels/overview/attachments", "brief.pdf", "application/pdf", b"%PDF-1.4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attachments"][0]["name"], "brief.pdf");
        assert_eq!(body["attachments"][0]["mime_type"], "application/pdf");

        let del = Request::builder()
            .method("DELETE")
            .uri("/api/panels/overview/attachments/3")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, del).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Attachment alone is enough to send; it is consumed by the turn
        let req = json_req("POST", "/api/panels/overview/messages", json!({ "text": "" }));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, get("/api/panels/overview")).await;
        assert!(body["attachments"].as_array().unwrap().is_empty());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (app, _) = app(Arc::new(FakeBackend::new()));
        let data = vec![b'a'; 1024 * 1024 + 1];
        let (status, _) = send(&app, upload("/api/evidence/attachments", "big.bin", "application/octet-stream", &data)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn evidence_analysis_flow() {
        let backend = Arc::new(FakeBackend::new());
        let (app, _) = app(Arc::clone(&backend));

        let (status, body) = send(&app, json_req("POST", "/api/evidence/analyze", json!({ "text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please enter evidence text or upload files to analyze.");
        assert_eq!(backend.calls(), 0);

        let (status, _) = send(&app, upload("/api/evidence/attachments", "photo.png", "image/png", b"\x89PNG")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, json_req("POST", "/api/evidence/analyze", json!({ "text": "Officer report" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["result"].as_str().unwrap().starts_with("Per [1]"));
        assert!(body["result_html"].as_str().unwrap().contains("law.example"));
        assert_eq!(body["attachments"].as_array().unwrap().len(), 1);
        assert!(backend.last_prompt().contains("Officer report"));
    }
    #[tokio::test]
    async fn log_feed_replays_history_then_streams_live() {
        use tokio_stream::StreamExt;

        let (app, state) = app(Arc::new(FakeBackend::new()));
        crate::logging::push_bounded(&state.log_ring, r#"{"message":"first line"}"#.into());
        crate::logging::push_bounded(&state.log_ring, r#"{"message":"second line"}"#.into());

        let resp = app.clone().oneshot(get("/api/logs")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let mut stream = resp.into_body().into_data_stream();
        let mut seen = String::new();
        let mut sent_live = false;
        while !seen.contains("live line") {
            if !sent_live && seen.contains("second line") {
                state.log_tx.send(r#"{"message":"live line"}"#.into()).unwrap();
                sent_live = true;
            }
            let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }
        let first = seen.find("first line").unwrap();
        let second = seen.find("second line").unwrap();
        let live = seen.find("live line").unwrap();
        assert!(first < second && second < live);
    }
}
