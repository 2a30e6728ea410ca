//! Route table and JSON handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use docwright_core::contract::{ExtractedEntities, FileRef, RepoRef};
use docwright_core::error::ValidationError;
use docwright_core::extract::extract;
use docwright_core::pipeline;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::rate_limit::rate_limit;
use super::AppState;

pub const WELCOME: &str = "Welcome to the docwright documentation assistant!";

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/generate-docstring", post(generate_docstring))
        .route("/improve-docstring", post(improve_docstring))
        .route("/fetch-repo", post(fetch_repo))
        .route("/parse-file", post(parse_file))
        .route(
            "/explain-code",
            post(explain_code)
                .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .route("/generate-docs", post(generate_docs))
        .route("/check-docs", post(check_docs))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct DocstringRequest {
    pub code: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocstringResponse {
    pub docstring: String,
}

#[derive(Debug, Deserialize)]
pub struct ImproveRequest {
    pub docstring: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImproveResponse {
    pub improved_docstring: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchRepoRequest {
    pub owner: Option<String>,
    pub repo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchRepoResponse {
    pub python_files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
pub struct ParseFileRequest {
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub code: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDocsRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateDocsResponse {
    pub message: String,
    pub markdown_docs: String,
    pub html_docs: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckDocsRequest {
    pub code: Option<String>,
    pub docs: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn home() -> &'static str {
    WELCOME
}

async fn generate_docstring(
    State(state): State<AppState>,
    payload: Result<Json<DocstringRequest>, JsonRejection>,
) -> Result<Json<DocstringResponse>, ApiError> {
    let req = body(payload)?;
    let code = required(req.code, "code")?;
    let docstring = state
        .narrator
        .generate_docstring(&code, req.context.as_deref())
        .await?;
    Ok(Json(DocstringResponse { docstring }))
}

async fn improve_docstring(
    State(state): State<AppState>,
    payload: Result<Json<ImproveRequest>, JsonRejection>,
) -> Result<Json<ImproveResponse>, ApiError> {
    let req = body(payload)?;
    let docstring = required(req.docstring, "docstring")?;
    let improved_docstring = state
        .narrator
        .improve_docstring(&docstring, req.context.as_deref())
        .await?;
    Ok(Json(ImproveResponse { improved_docstring }))
}

async fn fetch_repo(
    State(state): State<AppState>,
    payload: Result<Json<FetchRepoRequest>, JsonRejection>,
) -> Result<Json<FetchRepoResponse>, ApiError> {
    let req = body(payload)?;
    let repo = RepoRef {
        owner: required(req.owner, "owner")?,
        repo: required(req.repo, "repo")?,
    };
    let python_files = state.locator.list_source_files(&repo).await?;
    info!(owner = %repo.owner, repo = %repo.repo, files = python_files.len(), "Listed repository files");
    Ok(Json(FetchRepoResponse { python_files }))
}

async fn parse_file(
    State(state): State<AppState>,
    payload: Result<Json<ParseFileRequest>, JsonRejection>,
) -> Result<Json<ExtractedEntities>, ApiError> {
    let req = body(payload)?;
    let url = required(req.download_url, "download_url")?;
    let content = state.locator.fetch(&url).await?;
    let entities = extract(&content)?;
    Ok(Json(entities))
}

async fn explain_code(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let req = body(payload)?;
    let code = required(req.code, "code")?;
    let query = required(req.query, "query")?;
    let explanation = state.narrator.narrate(&code, &query).await?;
    Ok(Json(ExplainResponse { explanation }))
}

async fn generate_docs(
    State(state): State<AppState>,
    payload: Result<Json<GenerateDocsRequest>, JsonRejection>,
) -> Result<Json<GenerateDocsResponse>, ApiError> {
    let req = body(payload)?;
    let code = required(req.code, "code")?;
    let document = pipeline::generate_docs(&code, &state.narrator, &state.output).await?;
    Ok(Json(GenerateDocsResponse {
        message: "Documentation generated successfully".to_string(),
        markdown_docs: document.markdown,
        html_docs: document.html,
    }))
}

async fn check_docs(
    State(state): State<AppState>,
    payload: Result<Json<CheckDocsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = body(payload)?;
    let code = required(req.code, "code")?;
    let docs = required(req.docs, "docs")?;
    let status = pipeline::check_docs(&code, &docs, &state.narrator).await?;
    Ok(Json(MessageResponse {
        message: status.message().to_string(),
    }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Absent and empty fields are both rejected.
fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(format!("No {field} provided"))),
    }
}
