use axum::{
    extract::{Multipart, State},
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::watermark::WatermarkError;

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
    service: String,
}

pub async fn status_handler(State(app_state): State<crate::AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online",
        service: app_state.config.app.name.clone(),
    })
}

pub async fn watermark_file_handler(
    State(app_state): State<crate::AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    if let Some(expected) = &app_state.config.app.api_token {
        let provided = headers.get("x-api-token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            tracing::warn!("Upload rejected - invalid API token");
            return Err((StatusCode::UNAUTHORIZED, "Invalid API token".to_string()));
        }
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field.bytes().await.map_err(|e| {
                tracing::error!("Failed to read uploaded file: {}", e);
                (StatusCode::BAD_REQUEST, "Failed to read uploaded file".to_string())
            })?;
            upload = Some((filename, data.to_vec()));
            break;
        }
    }

    let Some((filename, data)) = upload else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing multipart field 'file'".to_string(),
        ));
    };

    tracing::info!("Watermarking upload {} ({} bytes)", filename, data.len());

    let rendered = app_state
        .pipeline
        .process(data, &filename)
        .await
        .map_err(|e| match e {
            WatermarkError::Decode(_) | WatermarkError::UnsupportedFormat(_) => {
                tracing::warn!("Rejected upload {}: {}", filename, e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            other => {
                tracing::error!("Failed to watermark {}: {}", filename, other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;

    let disposition = format!("attachment; filename=\"watermarked_{}\"", filename);
    Ok((
        [
            (CONTENT_TYPE, rendered.codec.content_type().to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        rendered.data,
    )
        .into_response())
}
