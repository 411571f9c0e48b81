//! Document viewer HTTP server.
//!
//! Serves the HTML viewer over one shared [`DocsStore`] and [`AuthStore`].
//! Every page handler drives the store operations it needs, then renders the
//! resulting state snapshot with [`crate::views`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Redirect to `/docs` |
//! | `GET`  | `/docs` | Document list |
//! | `GET`  | `/docs/{id}` | Rendered document |
//! | `GET`  | `/docs/edit/{id}` | Edit form |
//! | `POST` | `/docs/edit/{id}` | Save, then redirect to the document |
//! | `GET`  | `/changelog` | Versions, `?chunk=` expands one |
//! | `POST` | `/changelog/refresh` | Clear changelog, refetch stats |
//! | `GET`/`POST` | `/signin`, `/signup` | Account forms |
//! | `POST` | `/signout` | Forget the API key |
//! | `GET`  | `/health` | Viewer and backend status (JSON) |
//!
//! Pages whose backend call failed are still rendered, with the error
//! banner and whatever data the store kept, under `502 Bad Gateway`.
//!
//! # Error Contract
//!
//! Unknown routes answer with the JSON error body:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no route for /nope" } }
//! ```

use axum::{
    extract::{Form, Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{DocsBackend, HttpBackend};
use crate::auth::{AuthStore, FormError, PasswordRule, RegisterForm, SigninForm};
use crate::config::Config;
use crate::models::DocumentPatch;
use crate::store::{DocsStore, OperationError, StoreOptions};
use crate::views;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub docs: Arc<DocsStore>,
    pub auth: Arc<AuthStore>,
}

impl AppState {
    /// Both stores over one backend.
    pub fn new(backend: Arc<dyn DocsBackend>, options: StoreOptions) -> Self {
        Self {
            docs: Arc::new(DocsStore::new(backend.clone(), options)),
            auth: Arc::new(AuthStore::new(backend)),
        }
    }
}

/// Starts the viewer.
///
/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let backend = HttpBackend::new(&config.api)?;
    let state = AppState::new(Arc::new(backend), config.store_options());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        backend = %config.api.base_url,
        "viewer listening"
    );
    println!("Viewer listening on http://{}", config.server.bind);

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { Redirect::to("/docs") }))
        .route("/docs", get(handle_docs_list))
        .route("/docs/{id}", get(handle_document))
        .route("/docs/edit/{id}", get(handle_edit_form).post(handle_edit_save))
        .route("/changelog", get(handle_changelog))
        .route("/changelog/refresh", post(handle_changelog_refresh))
        .route("/signin", get(handle_signin_form).post(handle_signin))
        .route("/signup", get(handle_signup_form).post(handle_signup))
        .route("/signout", post(handle_signout))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

async fn handle_not_found(uri: Uri) -> AppError {
    not_found(format!("no route for {}", uri.path()))
}

type Page = (StatusCode, Html<String>);

fn status_for(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    }
}

fn page<T>(result: &Result<T, OperationError>, html: String) -> Page {
    (status_for(result.is_ok()), Html(html))
}

// ============ Documents ============

async fn handle_docs_list(State(state): State<AppState>) -> Page {
    let result = state.docs.fetch_docs_list().await;
    let html = views::docs_list_page(&state.docs.snapshot(), &state.auth.snapshot());
    page(&result, html)
}

/// Load the sidebar listing once per store lifetime.
async fn ensure_listing(docs: &DocsStore) {
    if docs.snapshot().docs.is_empty() {
        // The failure is already in the store's error slot for the banner.
        if let Err(e) = docs.fetch_docs_list().await {
            tracing::debug!(error = %e.message, "sidebar listing unavailable");
        }
    }
}

async fn handle_document(State(state): State<AppState>, Path(id): Path<String>) -> Page {
    ensure_listing(&state.docs).await;
    let result = state.docs.fetch_doc_by_id(&id).await;

    let mut view = state.docs.snapshot();
    if let Ok(doc) = &result {
        // Another request may have replaced the shared slot meanwhile.
        view.current_doc = Some(doc.clone());
    }
    page(&result, views::document_page(&view, &state.auth.snapshot()))
}

async fn handle_edit_form(State(state): State<AppState>, Path(id): Path<String>) -> Page {
    let result = state.docs.fetch_doc_by_id(&id).await;
    let auth = state.auth.snapshot();
    let html = match &result {
        Ok(doc) => views::edit_page(&id, Some(doc), doc.content.as_deref().unwrap_or(""), None, &auth),
        Err(e) => views::edit_page(&id, None, "", Some(&e.message), &auth),
    };
    page(&result, html)
}

#[derive(Deserialize)]
struct EditForm {
    #[serde(default)]
    content: String,
}

async fn handle_edit_save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<EditForm>,
) -> Response {
    match state
        .docs
        .update_doc(&id, &DocumentPatch::content(form.content.clone()))
        .await
    {
        Ok(_) => Redirect::to(&views::href(&["docs", &id])).into_response(),
        Err(e) => {
            let current = state.docs.snapshot().current_doc;
            let doc = current.as_ref().filter(|d| d.id == id);
            let html = views::edit_page(&id, doc, &form.content, Some(&e.message), &state.auth.snapshot());
            (StatusCode::BAD_GATEWAY, Html(html)).into_response()
        }
    }
}

// ============ Changelog ============

#[derive(Deserialize)]
struct ChangelogQuery {
    chunk: Option<String>,
}

async fn handle_changelog(
    State(state): State<AppState>,
    Query(query): Query<ChangelogQuery>,
) -> Page {
    let selected = query.chunk.filter(|c| !c.is_empty());
    let mut ok = state.docs.fetch_stats().await.is_ok();
    if let Some(chunk_time) = &selected {
        ok &= state.docs.fetch_docs_by_chunk_time(chunk_time).await.is_ok();
    }

    let html = views::changelog_page(
        &state.docs.snapshot(),
        selected.as_deref(),
        &state.auth.snapshot(),
        chrono::Utc::now(),
    );
    (status_for(ok), Html(html))
}

async fn handle_changelog_refresh(State(state): State<AppState>) -> Redirect {
    state.docs.clear_changelog();
    let _ = state.docs.fetch_stats().await;
    Redirect::to("/changelog")
}

// ============ Auth ============

async fn handle_signin_form(State(state): State<AppState>) -> Html<String> {
    Html(views::signin_page(None, &state.auth.snapshot()))
}

async fn handle_signin(State(state): State<AppState>, Form(form): Form<SigninForm>) -> Page {
    let request = match form.validate() {
        Ok(request) => request,
        Err(e) => {
            let html = views::signin_page(Some(&e.to_string()), &state.auth.snapshot());
            return (StatusCode::BAD_REQUEST, Html(html));
        }
    };
    match state.auth.signin(&request).await {
        Ok(api_key) => (
            StatusCode::OK,
            Html(views::api_key_page(&api_key, &state.auth.snapshot())),
        ),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Html(views::signin_page(None, &state.auth.snapshot())),
        ),
    }
}

async fn handle_signup_form(State(state): State<AppState>) -> Html<String> {
    Html(views::signup_page("", "", &[], None, &state.auth.snapshot()))
}

async fn handle_signup(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Page {
    let auth = state.auth.snapshot();
    let request = match form.validate() {
        Ok(request) => request,
        Err(e) => {
            let unmet: &[PasswordRule] = match &e {
                FormError::WeakPassword(rules) => rules.as_slice(),
                _ => &[],
            };
            let html = views::signup_page(
                &form.email,
                &form.project_name,
                unmet,
                Some(&e.to_string()),
                &auth,
            );
            return (StatusCode::BAD_REQUEST, Html(html));
        }
    };
    let result = state.auth.register(&request).await;
    let auth = state.auth.snapshot();
    let html = match &result {
        Ok(api_key) => views::api_key_page(api_key, &auth),
        Err(e) => views::signup_page(&form.email, &form.project_name, &[], Some(&e.message), &auth),
    };
    page(&result, html)
}

async fn handle_signout(State(state): State<AppState>) -> Redirect {
    state.auth.logout();
    Redirect::to("/signin")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the viewer is running.
    status: String,
    version: String,
    /// `"available"` or `"unavailable"`, from a live probe.
    backend: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let available = state.docs.check_health().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: if available { "available" } else { "unavailable" }.to_string(),
    })
}
