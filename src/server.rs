//! HTTP surface
//!
//! `POST /scrape`, `POST /saveSelections`, `GET /health` and the
//! `GET /selections/live` event stream. Every failure is answered as
//! `{ "error": "<message>" }`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::manager::BrowserManager;
use crate::model::{
    Category, ExtractedElement, ExtractionRequest, Locator, Mode, SelectorEntry, SelectorSet, normalize_domain,
    validate_target_url,
};
use crate::orchestrator::Extractor;
use crate::utils::constants::LIVE_SELECTIONS_MESSAGE;
use crate::utils::errors::{ScrapeError, ValidationError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub extractor: Extractor,
    pub manager: Arc<BrowserManager>,
    /// Selection list after every accepted annotation, for `/selections/live`
    pub live: broadcast::Sender<Vec<ExtractedElement>>,
}

/// Error response: 400 for caller mistakes, 500 for everything else
#[derive(Debug)]
pub struct ApiError {
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

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Validation(e) => e.into(),
            ScrapeError::EmptyResult => ApiError::internal(ScrapeError::EmptyResult.to_string()),
            other => ApiError::internal(format!("Failed to scrape: {other}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/scrape", post(scrape))
        .route("/saveSelections", post(save_selections))
        .route("/health", get(health))
        .route("/selections/live", get(live_selections))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

async fn scrape(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let request = ExtractionRequest::parse(str_field(&body, "url"), str_field(&body, "mode"))?;

    // Read before extraction so a save racing this request cannot leak in
    let stored = state.extractor.stored_selectors(&request).await;
    let suggestions = match (request.mode, &stored) {
        (Mode::Interactive, Some(set)) => set.clone(),
        _ => SelectorSet::default(),
    };

    // Detached so the browser is closed even if the client goes away
    let extractor = state.extractor.clone();
    let job_request = request.clone();
    let content = tokio::spawn(async move { extractor.run_with(&job_request, stored).await })
        .await
        .map_err(|e| {
            error!("Extraction task failed: {}", e);
            ApiError::internal("Failed to scrape: extraction task aborted")
        })?
        .inspect_err(|e| error!("Scraping failed for {}: {}", request.target_url, e))?;

    Ok(Json(json!({
        "success": true,
        "content": content,
        "suggestions": suggestions,
    })))
}

/// Incoming selection; only `type` and `selector` are kept
#[derive(Debug, Deserialize)]
struct SubmittedSelection {
    #[serde(rename = "type")]
    category: Category,
    #[serde(rename = "selector", default)]
    locator: Option<Locator>,
}

fn parse_selections(body: &Value) -> Result<SelectorSet, ValidationError> {
    let Some(raw) = body.get("selectedElements").and_then(Value::as_array) else {
        return Err(ValidationError::InvalidSelections(
            "selectedElements must be an array".to_string(),
        ));
    };

    let entries = raw
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value::<SubmittedSelection>(item.clone())
                .map_err(|e| ValidationError::InvalidSelections(format!("element {idx}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|selection| {
            selection.locator.map(|locator| SelectorEntry {
                category: selection.category,
                locator,
            })
        })
        .collect();

    Ok(SelectorSet::new(entries))
}

async fn save_selections(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let url = validate_target_url(str_field(&body, "url"))?;
    let set = parse_selections(&body)?;
    let domain = normalize_domain(&url);

    state.extractor.store().save(&domain, &set).await.map_err(|e| {
        error!("Failed to save selections for {}: {}", domain, e);
        ApiError::internal("Failed to save selections")
    })?;

    info!("Stored {} selections for {}", set.len(), domain);
    Ok(Json(json!({
        "success": true,
        "message": format!("Selections saved for {domain}"),
    })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "activeSessions": state.manager.active_sessions(),
    }))
}

/// Server-sent `scraper-data` events carrying the full selection list
async fn live_selections(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(state.live.subscribe()).filter_map(|update| async move {
        match update {
            Ok(selections) => match Event::default().event(LIVE_SELECTIONS_MESSAGE).json_data(&selections) {
                Ok(event) => Some(Ok::<_, Infallible>(event)),
                Err(e) => {
                    error!("Failed to encode live selections: {}", e);
                    None
                }
            },
            Err(lagged) => {
                debug!("Live selection subscriber fell behind: {}", lagged);
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_project_to_type_and_selector() {
        let body = json!({
            "url": "https://shop.example",
            "selectedElements": [
                {"type": "title", "selector": "h1#name", "value": "Shoe"},
                {"type": "text", "value": "no selector here"},
                {"type": "image", "selector": "img.hero", "value": {"src": "a.jpg", "alt": "A"}}
            ]
        });
        let set = parse_selections(&body).unwrap();
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!([
                {"type": "title", "selector": "h1#name"},
                {"type": "image", "selector": "img.hero"}
            ])
        );
    }

    #[test]
    fn selections_must_be_a_typed_array() {
        assert!(parse_selections(&json!({"selectedElements": "nope"})).is_err());
        assert!(parse_selections(&json!({})).is_err());
        assert!(parse_selections(&json!({"selectedElements": [{"selector": "h1"}]})).is_err());
        assert!(parse_selections(&json!({"selectedElements": [{"type": "bogus", "selector": "h1"}]})).is_err());
    }

    #[test]
    fn scrape_errors_map_to_status_codes() {
        let bad: ApiError = ScrapeError::Validation(ValidationError::InvalidUrl("x".into())).into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "Invalid URL provided");

        let empty: ApiError = ScrapeError::EmptyResult.into();
        assert_eq!(empty.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(empty.message, "Failed to extract content");
    }
}
