//! HTTP surface for BrevityLaw.
//!
//! The router serves the single page and the JSON endpoints it drives:
//!
//! - `GET /` – The page: PDF upload, summary, language selector, translation, and audio player.
//! - `GET /languages` – The selectable target languages.
//! - `POST /sessions` – Open a session; every later call names it.
//! - `GET /sessions/:id` – Snapshot of the session's texts and audio availability.
//! - `DELETE /sessions/:id` – End the session and delete its audio; the page calls it on unload.
//! - `POST /sessions/:id/document` – Upload a PDF (`application/pdf`) and extract its text.
//! - `POST /sessions/:id/summarize` – Summarize the extracted text.
//! - `POST /sessions/:id/translate` – Translate the summary (`{"language": "Hindi"}`).
//! - `POST /sessions/:id/speech` – Voice the translation; returns the audio URL.
//! - `GET /sessions/:id/audio` – The session's current MP3.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools.
//!
//! Each stage handler holds its session's lock until the stage finishes, so actions within one
//! session run one at a time while separate sessions proceed independently. Sessions left idle
//! longer than `SESSION_IDLE_SECS` are ended whenever a new one is opened.

use crate::config::get_config;
use crate::pipeline::{PipelineApi, PipelineError, StageError, workflow};
use crate::session::{SessionError, SessionHandle, SessionSnapshot, SessionStore};
use crate::speech::SpeechError;
use crate::translation::{Language, UnknownLanguage};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const INDEX_PAGE: &str = include_str!("../assets/index.html");
const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Shared state handed to every handler.
struct AppState<S: ?Sized> {
    service: Arc<S>,
    sessions: Arc<SessionStore>,
}

impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Build the HTTP router serving the page and the pipeline API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    let idle_timeout = Duration::from_secs(get_config().session_idle_secs);
    router_with_sessions(service, SessionStore::new(idle_timeout))
}

fn router_with_sessions<S>(service: Arc<S>, sessions: SessionStore) -> Router
where
    S: PipelineApi + 'static,
{
    let state = AppState {
        service,
        sessions: Arc::new(sessions),
    };
    Router::new()
        .route("/", get(index_page))
        .route("/languages", get(list_languages))
        .route("/sessions", post(create_session::<S>))
        .route(
            "/sessions/:id",
            get(get_session::<S>).delete(delete_session::<S>),
        )
        .route("/sessions/:id/document", post(upload_document::<S>))
        .route("/sessions/:id/summarize", post(summarize::<S>))
        .route("/sessions/:id/translate", post(translate::<S>))
        .route("/sessions/:id/speech", post(convert_to_speech::<S>))
        .route("/sessions/:id/audio", get(get_audio::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(get_config().max_upload_bytes))
        .with_state(state)
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// One entry of the language selector.
#[derive(Serialize)]
struct LanguageDescriptor {
    name: &'static str,
    code: &'static str,
}

/// Response body for `GET /languages`.
#[derive(Serialize)]
struct LanguagesResponse {
    languages: Vec<LanguageDescriptor>,
}

async fn list_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: Language::ALL
            .into_iter()
            .map(|language| LanguageDescriptor {
                name: language.name(),
                code: language.code(),
            })
            .collect(),
    })
}

/// Response body for `POST /sessions`.
#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: Uuid,
}

async fn create_session<S>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<CreateSessionResponse>)
where
    S: PipelineApi + ?Sized,
{
    let expired = state.sessions.remove_idle().await;
    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "Idle sessions expired");
    }
    for handle in expired {
        let mut session = handle.lock().await;
        workflow::close_session(state.service.as_ref(), &mut session).await;
    }

    let session_id = state.sessions.create().await;
    tracing::info!(session = %session_id, "Session opened");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn get_session<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = lookup(&state, id).await?;
    let snapshot = handle.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// End a session and delete its audio. Later calls naming it answer `404`.
async fn delete_session<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = state
        .sessions
        .remove(id)
        .await
        .ok_or(AppError::UnknownSession(id))?;
    let mut session = handle.lock().await;
    workflow::close_session(state.service.as_ref(), &mut session).await;
    tracing::info!(session = %id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Extract an uploaded PDF, replacing the session's document and everything derived from it.
///
/// The body is the raw file; anything not declared as `application/pdf` is refused before the
/// session is touched.
async fn upload_document<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = lookup(&state, id).await?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !is_pdf(content_type) {
        return Err(AppError::UnsupportedMediaType(content_type.to_string()));
    }

    let bytes = body.len();
    let mut session = handle.lock().await;
    workflow::upload_document(state.service.as_ref(), &mut session, body).await?;
    let snapshot = session.snapshot();
    tracing::info!(
        session = %id,
        bytes,
        pages = snapshot.page_count,
        "Upload request completed"
    );
    Ok(Json(snapshot))
}

fn is_pdf(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

async fn summarize<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = lookup(&state, id).await?;
    let mut session = handle.lock().await;
    workflow::summarize(state.service.as_ref(), &mut session).await?;
    tracing::info!(session = %id, "Summarize request completed");
    Ok(Json(session.snapshot()))
}

/// Request body for `POST /sessions/:id/translate`.
#[derive(Deserialize)]
struct TranslateRequest {
    /// Display name or code of the target language.
    language: String,
}

/// Translate the current summary. A failed translation still answers `200`; the snapshot then
/// carries the error text and `translation_failed: true`.
async fn translate<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<SessionSnapshot>, AppError>
where
    S: PipelineApi + ?Sized,
{
    let language: Language = request.language.parse()?;
    let handle = lookup(&state, id).await?;
    let mut session = handle.lock().await;
    workflow::translate(state.service.as_ref(), &mut session, language).await?;
    let snapshot = session.snapshot();
    tracing::info!(
        session = %id,
        language = language.code(),
        failed = snapshot.translation_failed,
        "Translate request completed"
    );
    Ok(Json(snapshot))
}

/// Response body for `POST /sessions/:id/speech`.
#[derive(Serialize)]
struct SpeechResponse {
    audio_url: String,
    session: SessionSnapshot,
}

async fn convert_to_speech<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SpeechResponse>, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = lookup(&state, id).await?;
    let mut session = handle.lock().await;
    let path = workflow::convert_to_speech(state.service.as_ref(), &mut session).await?;
    tracing::info!(session = %id, path = %path.display(), "Speech request completed");
    Ok(Json(SpeechResponse {
        audio_url: format!("/sessions/{id}/audio"),
        session: session.snapshot(),
    }))
}

async fn get_audio<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError>
where
    S: PipelineApi + ?Sized,
{
    let handle = lookup(&state, id).await?;
    let path = handle
        .lock()
        .await
        .audio()
        .map(|path| path.to_path_buf())
        .ok_or(StageError::Session(SessionError::NoAudio))?;
    let audio = tokio::fs::read(&path).await.map_err(AppError::AudioRead)?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        audio,
    )
        .into_response())
}

async fn lookup<S>(state: &AppState<S>, id: Uuid) -> Result<SessionHandle, AppError>
where
    S: PipelineApi + ?Sized,
{
    state
        .sessions
        .get(id)
        .await
        .ok_or(AppError::UnknownSession(id))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_extracted: u64,
    pages_extracted: u64,
    summaries_generated: u64,
    translations_completed: u64,
    translation_failures: u64,
    audio_generated: u64,
    active_sessions: usize,
}

/// Return the pipeline counters together with the number of open sessions.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsResponse>
where
    S: PipelineApi + ?Sized,
{
    let snapshot = state.service.metrics_snapshot();
    Json(MetricsResponse {
        documents_extracted: snapshot.documents_extracted,
        pages_extracted: snapshot.pages_extracted,
        summaries_generated: snapshot.summaries_generated,
        translations_completed: snapshot.translations_completed,
        translation_failures: snapshot.translation_failures,
        audio_generated: snapshot.audio_generated,
        active_sessions: state.sessions.len().await,
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by scripts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "create_session",
                method: "POST",
                path: "/sessions",
                description: "Open a session. Response returns { \"session_id\": uuid }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "get_session",
                method: "GET",
                path: "/sessions/:id",
                description: "Return the session's extracted text, summary, translation, and audio availability.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_session",
                method: "DELETE",
                path: "/sessions/:id",
                description: "End the session and delete its audio. Idle sessions also expire on their own.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/sessions/:id/document",
                description: "Upload a PDF as the raw request body with Content-Type application/pdf and extract its text.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/sessions/:id/summarize",
                description: "Summarize the extracted text with the legal summarization model.",
                request_example: None,
            },
            CommandDescriptor {
                name: "translate",
                method: "POST",
                path: "/sessions/:id/translate",
                description: "Translate the summary into Hindi, Kannada, Telugu, Tamil, or Malayalam. Failures are shown as translated text.",
                request_example: Some(json!({ "language": "Hindi" })),
            },
            CommandDescriptor {
                name: "convert_to_speech",
                method: "POST",
                path: "/sessions/:id/speech",
                description: "Voice the translated text. Response returns { \"audio_url\": string }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "audio",
                method: "GET",
                path: "/sessions/:id/audio",
                description: "Stream the session's latest MP3.",
                request_example: None,
            },
            CommandDescriptor {
                name: "languages",
                method: "GET",
                path: "/languages",
                description: "List the selectable target languages.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Stage(StageError),
    UnknownSession(Uuid),
    UnsupportedMediaType(String),
    UnknownLanguage(UnknownLanguage),
    AudioRead(std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Stage(StageError::Session(SessionError::NoAudio)) => StatusCode::NOT_FOUND,
            AppError::Stage(StageError::Session(_)) => StatusCode::CONFLICT,
            AppError::Stage(StageError::Pipeline(error)) => match error {
                PipelineError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Summarization(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Speech(SpeechError::Write { .. }) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                PipelineError::Speech(SpeechError::EmptyText) => StatusCode::CONFLICT,
                PipelineError::Speech(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Translation(_)
                | PipelineError::Tokenizer(_)
                | PipelineError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::UnknownSession(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::UnknownLanguage(_) => StatusCode::BAD_REQUEST,
            AppError::AudioRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Stage(error) => error.to_string(),
            AppError::UnknownSession(id) => format!("Unknown session: {id}"),
            AppError::UnsupportedMediaType(content_type) if content_type.is_empty() => {
                format!("Expected a {PDF_MEDIA_TYPE} upload")
            }
            AppError::UnsupportedMediaType(content_type) => {
                format!("Expected a {PDF_MEDIA_TYPE} upload, got {content_type}")
            }
            AppError::UnknownLanguage(error) => error.to_string(),
            AppError::AudioRead(error) => format!("Failed to read audio: {error}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, message).into_response()
    }
}

impl From<StageError> for AppError {
    fn from(inner: StageError) -> Self {
        Self::Stage(inner)
    }
}

impl From<UnknownLanguage> for AppError {
    fn from(inner: UnknownLanguage) -> Self {
        Self::UnknownLanguage(inner)
    }
}
