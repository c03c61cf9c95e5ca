use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use booksuggest_core::config::{DEFAULT_K, DEFAULT_TAGS_PER_REQUEST, MAX_K};
use booksuggest_core::{
    BookId, BookRecord, GenreClassifier, KeywordExtractor, SuggestionEngine, SuggestionResult, TfidfKeywordExtractor,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared, read-only handler state. Everything is built before the router
/// exists; handlers never mutate it.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SuggestionEngine>,
    pub classifier: Option<Arc<dyn GenreClassifier>>,
    pub extractor: Arc<dyn KeywordExtractor>,
}

impl AppState {
    /// Keyword extraction reuses the suggestion vocabulary's idf weights.
    pub fn new(engine: SuggestionEngine, classifier: Option<Arc<dyn GenreClassifier>>) -> Self {
        let extractor = Arc::new(TfidfKeywordExtractor::new(engine.vectorizer().clone()));
        Self { engine: Arc::new(engine), classifier, extractor }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct SummaryBody {
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Serialize)]
pub struct GenreResponse {
    pub predicted_genre: String,
}

#[derive(Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

pub fn build_app(state: AppState) -> Router {
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

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/autocomplete", get(autocomplete_handler))
        .route("/books/:id", get(book_handler))
        .route("/predict-genre", post(predict_genre_handler))
        .route("/extract-tags", post(extract_tags_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// first occurrence wins when a key is repeated
fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// `q` absent, empty or unusable yields `[]`; an unparsable `k` falls back
/// to the default. This endpoint always answers 200.
pub async fn autocomplete_handler(
    State(state): State<AppState>,
    params: Option<Query<Vec<(String, String)>>>,
) -> Json<Vec<SuggestionResult>> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let q = param(&params, "q").unwrap_or("");
    let k = param(&params, "k").and_then(|v| v.trim().parse::<usize>().ok()).unwrap_or(DEFAULT_K).clamp(1, MAX_K);

    let start = std::time::Instant::now();
    let results = state.engine.suggest(q, k);
    tracing::debug!(k, hits = results.len(), took_us = start.elapsed().as_micros() as u64, "autocomplete");
    Json(results)
}

pub async fn book_handler(State(state): State<AppState>, Path(id): Path<BookId>) -> Result<Json<BookRecord>, ApiError> {
    state
        .engine
        .catalog()
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("not found".into()))
}

fn required_summary(body: Result<Json<SummaryBody>, JsonRejection>) -> Result<String, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text())))?;
    match body.summary {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::BadRequest("Summary required".into())),
    }
}

pub async fn predict_genre_handler(
    State(state): State<AppState>,
    body: Result<Json<SummaryBody>, JsonRejection>,
) -> Result<Json<GenreResponse>, ApiError> {
    let summary = required_summary(body)?;
    let classifier = state
        .classifier
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("genre model not configured".into()))?;
    match classifier.predict(&summary) {
        Ok(predicted_genre) => Ok(Json(GenreResponse { predicted_genre })),
        Err(e) => {
            tracing::warn!(error = %e, "genre prediction failed");
            Err(ApiError::Internal(format!("Prediction failed: {e}")))
        }
    }
}

pub async fn extract_tags_handler(
    State(state): State<AppState>,
    body: Result<Json<SummaryBody>, JsonRejection>,
) -> Result<Json<TagsResponse>, ApiError> {
    let summary = required_summary(body)?;
    match state.extractor.extract(&summary, DEFAULT_TAGS_PER_REQUEST) {
        Ok(tags) => Ok(Json(TagsResponse { tags })),
        Err(e) => {
            tracing::warn!(error = %e, "tag extraction failed");
            Err(ApiError::Internal(format!("Tag extraction failed: {e}")))
        }
    }
}
