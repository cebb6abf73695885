//! HTTP Server for the formulary API.
//!
//! Holds one [`Catalog`] in shared state. An upload replaces the catalog's
//! formulas; every other endpoint reads from it.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                       |
//! |--------|-------------------------------|-----------------------------------|
//! | GET    | `/health`                     | Health check                      |
//! | POST   | `/api/upload`                 | Upload CSV, replace the catalog   |
//! | GET    | `/api/formulas`               | Search, filter, sort and page     |
//! | GET    | `/api/formulas/{id}`          | One formula                       |
//! | GET    | `/api/formulas/{id}/export`   | One formula's materials as CSV    |
//! | GET    | `/api/export`                 | Every formula as CSV              |
//! | GET    | `/api/categories`             | Distinct categories               |
//! | GET    | `/api/selection`              | Currently selected formula        |
//! | PUT    | `/api/selection`              | Select or clear a formula         |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs     |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LogBroadcaster;
use super::types::{ListParams, SelectionRequest, UploadResponse};
use crate::catalog::{Catalog, Page};
use crate::config::AppConfig;
use crate::error::{ExportError, ServerError, ServerResult};
use crate::export::{aggregate_to_csv, aggregates_to_csv, export_file_name};
use crate::models::FormulaAggregate;
use crate::transform::pipeline::{load_formulas_from_bytes, LoadOptions};

/// State shared by every handler.
pub struct AppState {
    pub catalog: RwLock<Catalog>,
    pub logs: LogBroadcaster,
    pub config: AppConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            catalog: RwLock::new(Catalog::default()),
            logs: LogBroadcaster::new(),
            config,
        })
    }
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_csv))
        .route("/api/formulas", get(list_formulas))
        .route("/api/formulas/{id}", get(get_formula))
        .route("/api/formulas/{id}/export", get(export_formula))
        .route("/api/export", get(export_all))
        .route("/api/categories", get(list_categories))
        .route("/api/selection", get(get_selection).put(put_selection))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> ServerResult<()> {
    let port = config.port;
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "formulary server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "formulary",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "formulas": "GET /api/formulas",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs(State(state): State<SharedState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.logs.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint
async fn upload_csv(State(state): State<SharedState>, mut multipart: Multipart) -> ServerResult<Json<UploadResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    state.logs.info(format!(
        "Upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = LoadOptions {
        parallel_threshold: state.config.parallel_threshold,
        validate_output: true,
    };

    // Parsing and grouping are CPU-bound
    let loaded = tokio::task::spawn_blocking(move || load_formulas_from_bytes(&bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let result = match loaded {
        Ok(result) => result,
        Err(e) => {
            state.logs.error(format!("Load failed: {}", e));
            return Err(e.into());
        }
    };

    state.logs.load_summary(&result);
    state.catalog.write().await.set_formulas(result.formulas.clone());

    Ok(Json(UploadResponse::from_load(result, file_name)))
}

async fn list_formulas(State(state): State<SharedState>, Query(params): Query<ListParams>) -> ServerResult<Json<Page>> {
    let query = params.to_query(state.config.page_size)?;
    let catalog = state.catalog.read().await;

    Ok(Json(catalog.query_by(&params.search, params.category(), &query)))
}

async fn get_formula(State(state): State<SharedState>, Path(id): Path<String>) -> ServerResult<Json<FormulaAggregate>> {
    let catalog = state.catalog.read().await;
    let formula = catalog.get(&id).ok_or(ServerError::NotFound(format!("formula {}", id)))?;

    Ok(Json(formula.clone()))
}

async fn export_formula(State(state): State<SharedState>, Path(id): Path<String>) -> ServerResult<Response> {
    let catalog = state.catalog.read().await;
    let formula = catalog.get(&id).ok_or(ExportError::FormulaNotFound(id.clone()))?;
    let body = aggregate_to_csv(formula)?;

    Ok(csv_attachment(body, &export_file_name(&formula.name)))
}

async fn export_all(State(state): State<SharedState>) -> ServerResult<Response> {
    let catalog = state.catalog.read().await;
    let body = aggregates_to_csv(catalog.formulas())?;

    Ok(csv_attachment(body, "formulas.csv"))
}

async fn list_categories(State(state): State<SharedState>) -> Json<Vec<String>> {
    let catalog = state.catalog.read().await;
    Json(catalog.categories().into_iter().map(str::to_string).collect())
}

async fn get_selection(State(state): State<SharedState>) -> Json<Value> {
    let catalog = state.catalog.read().await;
    let selected = catalog.selected();

    Json(json!({
        "formulaId": selected.map(|f| f.formula_id.as_str()),
        "formula": selected,
    }))
}

async fn put_selection(
    State(state): State<SharedState>,
    Json(request): Json<SelectionRequest>,
) -> ServerResult<Json<Value>> {
    let mut catalog = state.catalog.write().await;
    let formula_id = request.formula_id.as_deref().filter(|id| !id.is_empty());

    if !catalog.select(formula_id) {
        return Err(ServerError::NotFound(format!("formula {}", formula_id.unwrap_or_default())));
    }

    let selected = catalog.selected();
    Ok(Json(json!({
        "formulaId": selected.map(|f| f.formula_id.as_str()),
        "formula": selected,
    })))
}

fn csv_attachment(body: String, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlatRow;
    use crate::transform::grouper::group_rows;
    use axum::http::StatusCode;

    fn state_with_formulas() -> SharedState {
        let state = AppState::new(AppConfig::default());
        let formulas = group_rows(&[
            FlatRow::new("F001", "Sunrise Burst", "M001", "Lemon Oil", 10.0)
                .with_category("Fresh")
                .with_unit_cost(0.5),
            FlatRow::new("F002", "Moonlight Petals", "M010", "Rose Absolute", 2.0).with_category("Floral"),
            FlatRow::new("F003", "Morning Dew", "M001", "Lemon Oil", 1.0).with_category("Fresh"),
        ]);
        state.catalog.try_write().unwrap().set_formulas(formulas);
        state
    }

    #[tokio::test]
    async fn test_list_formulas_filters_and_pages() {
        let state = state_with_formulas();
        let params = ListParams {
            category: Some("Fresh".into()),
            page_size: Some(1),
            ..Default::default()
        };

        let Json(page) = list_formulas(State(state), Query(params)).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].formula_id, "F001");
    }

    #[tokio::test]
    async fn test_get_formula_not_found() {
        let state = state_with_formulas();
        let err = get_formula(State(state), Path("F999".into())).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_formula_headers() {
        let state = state_with_formulas();
        let response = export_formula(State(state), Path("F001".into())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disposition, "attachment; filename=\"Sunrise_Burst_materials.csv\"");
    }

    #[tokio::test]
    async fn test_export_quoted_name_keeps_header_intact() {
        let state = AppState::new(AppConfig::default());
        let formulas = group_rows(&[FlatRow::new("F010", "The \"Classic\" Blend", "M001", "Water", 1.0)]);
        state.catalog.try_write().unwrap().set_formulas(formulas);

        let response = export_formula(State(state), Path("F010".into())).await.unwrap();
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disposition, "attachment; filename=\"The_Classic_Blend_materials.csv\"");
    }

    #[tokio::test]
    async fn test_categories_first_seen_order() {
        let state = state_with_formulas();
        let Json(categories) = list_categories(State(state)).await;
        assert_eq!(categories, vec!["Fresh", "Floral"]);
    }

    #[tokio::test]
    async fn test_selection_roundtrip() {
        let state = state_with_formulas();

        let request = SelectionRequest {
            formula_id: Some("F002".into()),
        };
        let Json(body) = put_selection(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(body["formulaId"], "F002");

        let unknown = SelectionRequest {
            formula_id: Some("F404".into()),
        };
        assert!(put_selection(State(state.clone()), Json(unknown)).await.is_err());

        // Unknown id leaves the previous selection in place
        let Json(body) = get_selection(State(state.clone())).await;
        assert_eq!(body["formula"]["name"], "Moonlight Petals");

        let Json(body) = put_selection(State(state), Json(SelectionRequest::default())).await.unwrap();
        assert!(body["formulaId"].is_null());
    }
}
