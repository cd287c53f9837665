use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use depot_core::{
    Catalog, ContentHash, Depot, DepotError, DepotResult, Page, PageParams, ProjectSummary,
    ReferenceMap, ReleaseKey, ReleaseSubmission, StoredRelease, SubmitOutcome,
};
use depot_types::TypeError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
pub struct AppState<C> {
    pub depot: Arc<Depot<C>>,
    pub default_page_size: usize,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            depot: Arc::clone(&self.depot),
            default_page_size: self.default_page_size,
        }
    }
}

/// Run a depot call on the blocking pool.
async fn blocking<C, T, F>(state: &AppState<C>, f: F) -> ServerResult<T>
where
    C: Catalog + 'static,
    T: Send + 'static,
    F: FnOnce(&Depot<C>) -> DepotResult<T> + Send + 'static,
{
    let depot = Arc::clone(&state.depot);
    tokio::task::spawn_blocking(move || f(&depot))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

fn invalid(err: TypeError) -> ServerError {
    ServerError::Depot(DepotError::InvalidInput(err))
}

fn parse_hashes(raw: Vec<String>) -> ServerResult<BTreeSet<ContentHash>> {
    raw.into_iter()
        .map(|s| ContentHash::new(s).map_err(invalid))
        .collect()
}

fn parse_hash(raw: String) -> ServerResult<ContentHash> {
    ContentHash::new(raw).map_err(invalid)
}

fn parse_key(owner: String, project: String, revision: String) -> ServerResult<ReleaseKey> {
    ReleaseKey::new(owner, project, revision).map_err(invalid)
}

/// Content type for a release file, guessed from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" | "md" | "log" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /v1/check`: which of the posted hashes are already stored.
pub async fn check_hashes<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Json(hashes): Json<Vec<String>>,
) -> ServerResult<Json<BTreeSet<ContentHash>>> {
    let hashes = parse_hashes(hashes)?;
    let found = blocking(&state, move |depot| depot.check_hashes(&hashes)).await?;
    Ok(Json(found))
}

/// `PUT /v1/objects/:hash`. 201 when written, 200 when already present.
pub async fn put_object<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path(hash): Path<String>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<Value>)> {
    let hash = parse_hash(hash)?;
    let size = body.len();
    let reply_hash = hash.clone();
    let written = blocking(&state, move |depot| depot.store_object(&hash, &body)).await?;
    let status = if written {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({ "hash": reply_hash, "size": size, "written": written })),
    ))
}

pub async fn get_object<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path(hash): Path<String>,
) -> ServerResult<Response> {
    let hash = parse_hash(hash)?;
    let bytes = blocking(&state, move |depot| depot.fetch_object(&hash)).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

/// `POST /v1/references`: current reference lists for the posted hashes.
pub async fn query_references<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Json(hashes): Json<Vec<String>>,
) -> ServerResult<Json<ReferenceMap>> {
    let hashes = parse_hashes(hashes)?;
    let refs = blocking(&state, move |depot| depot.query_references(&hashes)).await?;
    Ok(Json(refs))
}

/// `POST /v1/releases`. Missing objects are reported in the body with 200;
/// the client uploads them and resubmits.
pub async fn submit_release<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Json(submission): Json<ReleaseSubmission>,
) -> ServerResult<Json<SubmitOutcome>> {
    let outcome = blocking(&state, move |depot| depot.submit_release(submission)).await?;
    Ok(Json(outcome))
}

pub async fn query_release<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path((owner, project, revision)): Path<(String, String, String)>,
) -> ServerResult<Json<Vec<StoredRelease>>> {
    let key = parse_key(owner, project, revision)?;
    let rows = blocking(&state, move |depot| depot.query_release(&key)).await?;
    Ok(Json(rows))
}

pub async fn delete_release<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path((owner, project, revision)): Path<(String, String, String)>,
) -> ServerResult<Json<Value>> {
    let key = parse_key(owner, project, revision)?;
    let deleted = blocking(&state, move |depot| depot.delete_release(&key)).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn get_commit<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path((owner, project, revision)): Path<(String, String, String)>,
) -> ServerResult<Json<StoredRelease>> {
    let key = parse_key(owner, project, revision)?;
    let row = blocking(&state, move |depot| depot.get_commit(&key)).await?;
    Ok(Json(row))
}

pub async fn list_owners<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
) -> ServerResult<Json<Vec<String>>> {
    let owners = blocking(&state, |depot| depot.list_owners()).await?;
    Ok(Json(owners))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectsQuery {
    pub owner: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl ProjectsQuery {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: self.size,
            start: self.start,
            end: self.end,
        }
    }
}

pub async fn list_projects<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Query(query): Query<ProjectsQuery>,
) -> ServerResult<Json<Page<ProjectSummary>>> {
    let request = query.page_params().into_request(state.default_page_size);
    let owner = query.owner;
    let page = blocking(&state, move |depot| {
        depot.list_projects(owner.as_deref(), request)
    })
    .await?;
    Ok(Json(page))
}

pub async fn list_commits<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path((owner, project)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> ServerResult<Json<Page<StoredRelease>>> {
    let request = params.into_request(state.default_page_size);
    let page = blocking(&state, move |depot| {
        depot.list_commits(&owner, &project, request)
    })
    .await?;
    Ok(Json(page))
}

/// `GET /raw/:owner/:project/:revision/*path`: one file of the newest
/// release, typed by its extension.
pub async fn raw_file<C: Catalog + 'static>(
    State(state): State<AppState<C>>,
    Path((owner, project, revision, path)): Path<(String, String, String, String)>,
) -> ServerResult<Response> {
    let key = parse_key(owner, project, revision)?;
    let content_type = content_type_for(&path);
    let (hash, bytes) = blocking(&state, move |depot| {
        depot.fetch_release_file(&key, &path)
    })
    .await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::ETAG, format!("\"{hash}\"")),
        ],
        bytes,
    )
        .into_response())
}
