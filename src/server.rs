//! HTTP request handler.
//!
//! Exposes the chatbot backend over a JSON HTTP API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness check (plain text) |
//! | `POST` | `/api/upload` | Upload a PDF and rebuild the index |
//! | `POST` | `/api/chat` | Ask a question about the indexed documents |
//!
//! # Error Contract
//!
//! Client mistakes get a 400 with a specific message; asking before any
//! document has been indexed gets a 503 so frontends can prompt for an
//! upload; internal failures are logged in full on the server and reach the
//! client only as a generic `{ "error": ... }` with status 500.
//!
//! # State
//!
//! The query engine lives in [`AppState`] behind an async `RwLock`: chat
//! handlers share read access, while upload (after a successful rebuild)
//! and lazy initialization take the write side to swap the engine
//! wholesale. Uploads run the full rebuild synchronously in the handling
//! task; the response is sent only after the file is saved, the index is
//! rebuilt, and the engine is reloaded.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! demo frontends.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::engine::QueryEngine;
use crate::index;
use crate::llm::ChatClient;
use crate::store;

/// Uploads above this size are rejected by the body-limit layer.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    embedder: Arc<EmbeddingClient>,
    chat: Arc<ChatClient>,
    engine: Arc<RwLock<Option<QueryEngine>>>,
}

impl AppState {
    /// Build the state and its API clients.
    ///
    /// Fails when `OPENAI_API_KEY` is missing, so a misconfigured process
    /// dies at startup instead of on its first request.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let embedder = Arc::new(EmbeddingClient::from_config(&config.embedding)?);
        let chat = Arc::new(ChatClient::from_config(&config.llm)?);
        Ok(Self {
            config: Arc::new(config),
            embedder,
            chat,
            engine: Arc::new(RwLock::new(None)),
        })
    }

    /// Reload the query engine from the current index, swapping it under
    /// the write lock. Returns whether an engine is now loaded; on error
    /// the slot is cleared.
    pub async fn reload_engine(&self) -> anyhow::Result<bool> {
        let mut slot = self.engine.write().await;
        match QueryEngine::load(&self.config, self.embedder.clone(), self.chat.clone()).await {
            Ok(loaded) => {
                let ready = loaded.is_some();
                *slot = loaded;
                Ok(ready)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }
}

/// Starts the HTTP server on the configured bind address and serves until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone())?;

    match state.reload_engine().await {
        Ok(true) => println!("Query engine initialized from existing index."),
        Ok(false) => println!("No index found yet. Upload a document to build one."),
        Err(e) => eprintln!("Could not initialize query engine: {:#}", e),
    }

    let app = app(state);

    println!("docchat listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router. Public so tests can serve it on an ephemeral port.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/api/upload", post(handle_upload))
        .route("/api/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response with a
/// `{ "error": message }` body.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ GET / ============

/// Liveness check.
async fn handle_root() -> &'static str {
    "docchat backend is running"
}

// ============ POST /api/upload ============

/// Handles PDF uploads: validate, save to the document store, rebuild the
/// index over the full store, reload the query engine. Success is reported
/// only after all three steps complete.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Malformed multipart body: {}", e)))?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or_else(|| bad_request("No file part in the request"))?;
    if filename.is_empty() {
        return Err(bad_request("No selected file"));
    }
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(bad_request("Invalid file type. Please upload a PDF."));
    }

    let filename = store::sanitize_filename(&filename);

    let result: anyhow::Result<()> = async {
        store::save_document(&state.config, &filename, &data)?;
        println!("File '{}' uploaded. Rebuilding index...", filename);
        let outcome = index::build_index(&state.config, &state.embedder).await?;
        if let index::BuildOutcome::Built { documents, chunks } = outcome {
            println!("Index rebuilt: {} document(s), {} chunk(s).", documents, chunks);
        }
        state.reload_engine().await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(Json(serde_json::json!({
            "message": format!("File '{}' uploaded and indexed successfully.", filename)
        }))),
        Err(e) => {
            // Full chain on the server, opaque message to the client.
            eprintln!("Upload processing failed: {:#}", e);
            Err(internal(
                "An internal error occurred while processing the PDF.",
            ))
        }
    }
}

// ============ POST /api/chat ============

/// Handles chat messages: validate the body, lazily initialize the query
/// engine if this is the first question, and delegate to it.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(payload) =
        payload.map_err(|e| bad_request(format!("Invalid request body: {}", e)))?;

    let message = payload
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| bad_request("Invalid request. 'message' is required."))?;

    ensure_engine(&state).await;

    let engine_slot = state.engine.read().await;
    let Some(engine) = engine_slot.as_ref() else {
        return Err(unavailable(
            "Chatbot is not ready. Please upload a PDF document first.",
        ));
    };

    match engine.answer(message).await {
        Ok(answer) => Ok(Json(serde_json::json!({ "reply": answer.reply }))),
        Err(e) => {
            eprintln!("Chat processing failed: {:#}", e);
            Err(internal("An error occurred while processing your message."))
        }
    }
}

/// One lazy initialization attempt when no engine is loaded. Failure leaves
/// the slot empty; the caller reports "not ready".
async fn ensure_engine(state: &AppState) {
    if state.engine.read().await.is_some() {
        return;
    }

    println!("Query engine not loaded; attempting initialization...");
    match state.reload_engine().await {
        Ok(true) => println!("Query engine initialized."),
        Ok(false) => println!("No index on disk yet."),
        Err(e) => eprintln!("Query engine initialization failed: {:#}", e),
    }
}
