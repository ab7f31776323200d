use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use eldar_core::transform::all_expansions;
use eldar_core::{Analyzer, AnalyzerConfig, DocId, InvertedIndex, Path as TreePath, QueryError, QueryTree};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, String);

fn default_true() -> bool { true }

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub canonical: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub doc_ids: Vec<DocId>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub query: String,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct ExpandRequest {
    pub q: String,
    #[serde(default)]
    pub path: Vec<u8>,
    pub word: String,
    #[serde(default = "default_op")]
    pub op: String,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
}
fn default_op() -> String { "AND".into() }

#[derive(Serialize)]
pub struct ExpandResponse {
    pub query: String,
    pub canonical: String,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct ExpansionsParams {
    pub q: String,
    pub word: String,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
}

#[derive(Serialize)]
pub struct ExpansionHit {
    pub query: String,
    pub path: Vec<u8>,
    pub op: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ExpansionsResponse {
    pub query: String,
    pub count: usize,
    pub expansions: Vec<ExpansionHit>,
}

#[derive(Deserialize)]
pub struct DocumentsRequest {
    /// Pre-tokenized documents, indexed verbatim.
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
    /// Raw texts, run through the index's analyzer.
    #[serde(default)]
    pub texts: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RwLock<InvertedIndex>>,
    pub index_path: PathBuf,
    pub analyzer: Analyzer,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Parse a query and, when case is ignored, pass its leaves through the
    /// same analyzer that produced the index terms.
    fn parse(&self, q: &str, ignore_case: bool) -> Result<QueryTree, ApiError> {
        let tree = QueryTree::parse(q, ignore_case).map_err(reject)?;
        if ignore_case {
            Ok(QueryTree::from_root(self.analyzer.normalize_query(tree.root())))
        } else {
            Ok(tree)
        }
    }
}

fn reject(err: QueryError) -> ApiError {
    if err.is_client_error() {
        tracing::warn!(error = %err, "rejected request");
        (StatusCode::BAD_REQUEST, err.to_string())
    } else {
        tracing::error!(error = %err, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    analyzer: AnalyzerConfig,
}

/// Analyzer settings recorded by the indexer in `<index>.meta.json`. An index
/// without a manifest uses the default analyzer; an unreadable or malformed
/// manifest is an error.
fn analyzer_config_for(index_path: &std::path::Path) -> Result<AnalyzerConfig> {
    let manifest = PathBuf::from(format!("{}.meta.json", index_path.display()));
    let text = match std::fs::read_to_string(&manifest) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(manifest = %manifest.display(), "no manifest, using default analyzer");
            return Ok(AnalyzerConfig::default());
        }
        Err(e) => return Err(e).with_context(|| format!("reading manifest {}", manifest.display())),
    };
    let parsed: Manifest =
        serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", manifest.display()))?;
    Ok(parsed.analyzer)
}

pub fn build_app(index_path: String) -> Result<Router> {
    let path = PathBuf::from(&index_path);
    let index = InvertedIndex::open(&path).with_context(|| format!("loading index {index_path}"))?;
    let analyzer = Analyzer::new(analyzer_config_for(&path)?);
    tracing::info!(index = %index_path, num_docs = index.get_document_count(), analyzer = ?analyzer.config(), "index loaded");
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState { index: Arc::new(RwLock::new(index)), index_path: path, analyzer, admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/search", get(search_handler))
        .route("/count", get(count_handler))
        .route("/postings/:term", get(postings_handler))
        .route("/expand", post(expand_handler))
        .route("/expansions", get(expansions_handler))
        .route("/documents", post(documents_handler))
        .route("/save", post(save_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let index = state.index.read();
    Json(serde_json::json!({
        "num_docs": index.get_document_count(),
        "num_terms": index.num_terms(),
    }))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let tree = state.parse(&params.q, params.ignore_case)?;
    let mut doc_ids = state.index.read().search(&tree);
    let total_hits = doc_ids.len();
    if let Some(limit) = params.limit {
        doc_ids.truncate(limit);
    }
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        canonical: tree.to_query_string(false),
        took_s: elapsed.as_secs_f64(),
        total_hits,
        doc_ids,
    }))
}

pub async fn count_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<CountResponse>, ApiError> {
    let tree = state.parse(&params.q, params.ignore_case)?;
    let count = state.index.read().count(&tree);
    Ok(Json(CountResponse { query: params.q, count }))
}

pub async fn postings_handler(State(state): State<AppState>, Path(term): Path<String>) -> Json<serde_json::Value> {
    let doc_ids = state.index.read().get_postings(&term);
    Json(serde_json::json!({ "term": term, "doc_ids": doc_ids }))
}

pub async fn expand_handler(State(state): State<AppState>, Json(req): Json<ExpandRequest>) -> Result<Json<ExpandResponse>, ApiError> {
    let mut tree = state.parse(&req.q, req.ignore_case)?;
    let path = TreePath::from_indices(&req.path).map_err(reject)?;
    let word = if req.ignore_case { state.analyzer.normalize_term(&req.word) } else { req.word.clone() };
    tree.expand_str(&path, &word, &req.op).map_err(reject)?;
    let count = state.index.read().count(&tree);
    Ok(Json(ExpandResponse { query: tree.to_string(), canonical: tree.to_query_string(false), count }))
}

pub async fn expansions_handler(State(state): State<AppState>, Query(params): Query<ExpansionsParams>) -> Result<Json<ExpansionsResponse>, ApiError> {
    let tree = state.parse(&params.q, params.ignore_case)?;
    let word = if params.ignore_case { state.analyzer.normalize_term(&params.word) } else { params.word.clone() };
    let index = state.index.read();
    let expansions = all_expansions(tree.root(), &word)
        .into_iter()
        .map(|e| {
            let expanded = QueryTree::from_root(e.node);
            ExpansionHit { count: index.count(&expanded), query: expanded.to_string(), path: e.path.indices(), op: e.op.to_string() }
        })
        .collect();
    Ok(Json(ExpansionsResponse { query: tree.to_string(), count: index.count(&tree), expansions }))
}

pub async fn documents_handler(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<DocumentsRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut index = state.index.write();
    let mut doc_ids: Vec<DocId> = Vec::with_capacity(req.documents.len() + req.texts.len());
    for words in &req.documents {
        doc_ids.push(index.add_document(words));
    }
    for text in &req.texts {
        doc_ids.push(index.add_text(text, &state.analyzer));
    }
    tracing::info!(added = doc_ids.len(), num_docs = index.get_document_count(), "appended documents");
    Ok(Json(serde_json::json!({ "doc_ids": doc_ids })))
}

pub async fn save_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let index = Arc::clone(&state.index);
    let path = state.index_path.clone();
    let num_docs = tokio::task::spawn_blocking(move || {
        let index = index.read();
        index.save(&path).map(|()| index.get_document_count())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("save task failed: {e}")))?
    .map_err(reject)?;
    Ok(Json(serde_json::json!({
        "path": state.index_path.display().to_string(),
        "num_docs": num_docs,
    })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
