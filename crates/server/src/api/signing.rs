use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use playsigner_core::{BundleFile, DispatchError, SigningJob};

use super::middleware::AuthUser;
use crate::metrics::JOB_SUBMISSIONS_TOTAL;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub msg: String,
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, result: &str, error: impl Into<String>) -> ApiError {
    JOB_SUBMISSIONS_TOTAL.with_label_values(&[result]).inc();
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn invalid(error: impl Into<String>) -> ApiError {
    reject(StatusCode::BAD_REQUEST, "invalid", error)
}

fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    let result = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "too_large"
    } else {
        "invalid"
    };
    reject(status, result, format!("Invalid multipart body: {}", e.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /app/{destination_id}/{package_name}/{version_code}
///
/// Accepts a bundle for signing. Multipart fields: `file` (the bundle) and
/// `user_credentials` (JSON object). Responds as soon as the job is queued;
/// the outcome is only ever reported through the failure notification.
pub async fn submit_bundle(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path((destination_id, package_name, version_code)): Path<(String, String, String)>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let version_code: u32 = version_code
        .parse()
        .map_err(|_| invalid(format!("Invalid version code: {}", version_code)))?;

    let mut bundle: Option<Vec<u8>> = None;
    let mut credentials: Option<serde_json::Value> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                bundle = Some(bytes.to_vec());
            }
            "user_credentials" => {
                let text = field.text().await.map_err(multipart_error)?;
                let value: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| invalid(format!("user_credentials is not valid JSON: {}", e)))?;
                if !value.is_object() {
                    return Err(invalid("user_credentials must be a JSON object"));
                }
                credentials = Some(value);
            }
            _ => {}
        }
    }

    let bundle = match bundle {
        Some(b) if !b.is_empty() => b,
        _ => return Err(invalid("No bundle file provided")),
    };
    let credentials = credentials.ok_or_else(|| invalid("No user_credentials provided"))?;

    let distribution_token = state.service_token().issue().map_err(|e| {
        error!(error = %e, "Failed to issue distribution token");
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error",
            "Failed to issue distribution token",
        )
    })?;

    let staged = BundleFile::stage(&state.config().server.temp_dir, &bundle)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to stage bundle");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "Failed to store bundle",
            )
        })?;

    let job = SigningJob {
        job_id: Uuid::new_v4(),
        bundle: staged,
        app_id: package_name,
        version_code,
        destination_id,
        credentials,
        distribution_token,
    };
    let app_id = job.app_id.clone();

    match state.queue().submit(job) {
        Ok(ticket) => {
            JOB_SUBMISSIONS_TOTAL.with_label_values(&["accepted"]).inc();
            info!(
                job_id = %ticket.job_id,
                app_id = %app_id,
                version_code,
                user_id = %user_id,
                size = bundle.len(),
                "Accepted bundle for signing"
            );
            Ok(Json(SubmitResponse {
                msg: "Started aab upload".to_string(),
                job_id: ticket.job_id,
            }))
        }
        Err(DispatchError::QueueFull) => Err(reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "queue_full",
            "Signing queue is full, try again later",
        )),
        Err(DispatchError::Closed) => Err(reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "error",
            "Server is shutting down",
        )),
    }
}
