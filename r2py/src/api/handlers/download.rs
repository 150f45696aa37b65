//! Download of generated Python files.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Response, header},
};
use tracing::{debug, instrument};

use crate::AppState;
use crate::errors::{Error, Result};

/// `GET /download/{filename}`: a file from the output directory, as an attachment.
#[instrument(skip(state))]
pub async fn download_file(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response<Body>> {
    let not_found = || Error::NotFound {
        resource: "File".to_string(),
        id: filename.clone(),
    };

    let path = state.storage.output_path(&filename).ok_or_else(not_found)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        // Directories and other non-files in the output directory are not downloadable
        Err(e) if path.is_dir() => {
            debug!(error = %e, "Download target is a directory");
            return Err(not_found());
        }
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let disposition =
        HeaderValue::from_str(&content_disposition(&filename)).unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
        .map_err(|e| Error::Internal {
            operation: format!("build download response: {e}"),
        })
}

/// `attachment` with an ASCII `filename` fallback and the exact name as RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
