//! REST API types.
//!
//! Response envelopes use camelCase; the formulas inside keep the snake_case
//! column vocabulary so they read the same as the CSV.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::{CatalogQuery, SortKey};
use crate::error::{ExportError, PipelineError, ServerError};
use crate::ingest::{Coercion, SkippedRow};
use crate::models::FormulaAggregate;
use crate::transform::pipeline::LoadResult;

/// Response sent after a CSV upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" when every record was used as-is, "warning" otherwise
    pub status: String,

    pub formulas: Vec<FormulaAggregate>,

    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_formulas: usize,
    pub total_rows: usize,
    pub uploaded_at: String,
    pub csv_info: CsvMetadata,
    pub skipped_rows: Vec<SkippedRow>,
    pub coercions: Vec<Coercion>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub file_name: Option<String>,
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl UploadResponse {
    pub fn from_load(result: LoadResult, file_name: Option<String>) -> Self {
        let clean = result.skipped.is_empty() && result.coercions.is_empty();

        UploadResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if clean { "ready" } else { "warning" }.to_string(),
            metadata: ResponseMetadata {
                total_formulas: result.formulas.len(),
                total_rows: result.row_count,
                uploaded_at: chrono::Utc::now().to_rfc3339(),
                csv_info: CsvMetadata {
                    file_name,
                    encoding: result.csv_info.encoding,
                    delimiter: result.csv_info.delimiter.to_string(),
                    row_count: result.csv_info.row_count,
                    columns: result.csv_info.headers,
                },
                skipped_rows: result.skipped,
                coercions: result.coercions,
            },
            formulas: result.formulas,
        }
    }
}

/// Query string for `GET /api/formulas`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub search: String,
    pub category: Option<String>,
    pub sort: Option<String>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
}

impl ListParams {
    /// Sorting and paging part of the parameters.
    pub fn to_query(&self, default_page_size: usize) -> Result<CatalogQuery, ServerError> {
        let sort = self
            .sort
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<SortKey>)
            .transpose()
            .map_err(ServerError::BadRequest)?;

        Ok(CatalogQuery {
            sort,
            descending: self.desc,
            page: self.page,
            page_size: self.page_size.unwrap_or(default_page_size).max(1),
        })
    }

    /// Category filter, blank treated as none.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

/// Body for `PUT /api/selection`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub formula_id: Option<String>,
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "formulas": [],
        "metadata": {
            "totalFormulas": 0,
            "totalRows": 0
        }
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) | ServerError::Export(ExportError::FormulaNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(PipelineError::Csv(_))
            | ServerError::Pipeline(PipelineError::Ingest(_))
            | ServerError::Pipeline(PipelineError::EmptyInput) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Export(_) | ServerError::Io(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}
