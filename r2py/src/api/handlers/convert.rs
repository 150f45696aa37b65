//! The conversion page: form display, snippet conversion and file conversion.
//!
//! Every outcome of `POST /`, including validation failures and malformed forms, is turned into a
//! [`ConversionView`] here; nothing below this boundary reaches the client as a raw error.

use axum::{extract::State, http::HeaderMap};
use tracing::{info, instrument, warn};
use url::Url;

use crate::AppState;
use crate::api::models::conversions::{ACTION_CONVERT, ACTION_UPLOAD_CONVERT, ConversionForm, ConversionView, UploadedFile};
use crate::errors::Error;
use crate::storage::StoredArtifact;
use crate::translation::{Credential, TranslationOutcome};
use crate::view::{Rendered, ViewFormat};

pub const MISSING_KEY_MESSAGE: &str = "The OpenAI API key is required for conversion. Please enter a valid key.";
pub const EMPTY_SNIPPET_MESSAGE: &str = "Please enter some R code to convert.";
pub const INVALID_FILE_MESSAGE: &str = "The uploaded file must be a valid R file with the extension .R or .r.";
pub const UNSUPPORTED_ACTION_MESSAGE: &str = "Unsupported action. Use \"convert\" or \"upload_convert\".";
pub const SNIPPET_SUCCESS_MESSAGE: &str = "Converted successfully!";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File converted successfully! You can download the Python file.";
const UPLOAD_FAILURE_PREFIX: &str = "Error while processing the uploaded file";

/// `GET /`: the empty form.
pub async fn index(headers: HeaderMap) -> Rendered {
    Rendered::new(ConversionView::default(), ViewFormat::from_headers(&headers))
}

/// `POST /`: run the submitted action.
#[instrument(skip_all)]
pub async fn convert(State(state): State<AppState>, headers: HeaderMap, form: Result<ConversionForm, Error>) -> Rendered {
    let format = ViewFormat::from_headers(&headers);

    let form = match form {
        Ok(form) => form,
        Err(e) => {
            warn!("Rejected conversion form: {e}");
            return Rendered::new(ConversionView::error(e.user_message()), format);
        }
    };

    let Some(credential) = form.credential.as_ref() else {
        return Rendered::new(ConversionView::error(MISSING_KEY_MESSAGE), format);
    };

    let view = match form.action.as_deref().map(str::trim) {
        Some(ACTION_CONVERT) => convert_snippet(&state, credential, form.r_code.as_deref().unwrap_or_default()).await,
        Some(ACTION_UPLOAD_CONVERT) => convert_upload(&state, credential, form.r_file).await,
        other => {
            warn!(action = ?other, "Unsupported conversion action");
            ConversionView::error(UNSUPPORTED_ACTION_MESSAGE)
        }
    };

    Rendered::new(view, format)
}

/// Translate pasted R code. Touches no files.
#[instrument(skip_all)]
async fn convert_snippet(state: &AppState, credential: &Credential, r_code: &str) -> ConversionView {
    let r_code = r_code.trim();
    let mut view = ConversionView {
        r_code: r_code.to_string(),
        ..Default::default()
    };

    if r_code.is_empty() {
        view.error_message = Some(EMPTY_SNIPPET_MESSAGE.to_string());
        return view;
    }

    match state.translator.translate(credential, r_code).await {
        TranslationOutcome::Success(python_code) => {
            info!("Snippet converted");
            view.python_code = python_code;
            view.success_message = Some(SNIPPET_SUCCESS_MESSAGE.to_string());
        }
        TranslationOutcome::Rejected(message) => {
            info!("Snippet rejected as not R");
            view.error_message = Some(message);
        }
        TranslationOutcome::Failed(message) => {
            view.error_message = Some(message);
        }
    }

    view
}

/// How an upload ended once the file was accepted.
enum UploadResult {
    Converted(StoredArtifact),
    Rejected(StoredArtifact, String),
}

/// Translate an uploaded R file and store the result for download.
#[instrument(skip_all)]
async fn convert_upload(state: &AppState, credential: &Credential, file: Option<UploadedFile>) -> ConversionView {
    let Some(file) = file.filter(UploadedFile::has_r_extension) else {
        return ConversionView::error(INVALID_FILE_MESSAGE);
    };

    // Held until the output is written so concurrent uploads cannot evict each other mid-flight
    let _guard = state.storage.lock().await;
    state.storage.clear();

    match store_and_translate(state, credential, &file).await {
        Ok(UploadResult::Converted(artifact)) => {
            info!(output = %artifact.output_path.display(), "File converted");
            ConversionView {
                success_message: Some(UPLOAD_SUCCESS_MESSAGE.to_string()),
                download_link: Some(download_link(&artifact.output_name())),
                ..Default::default()
            }
        }
        Ok(UploadResult::Rejected(artifact, message)) => {
            info!(output = %artifact.output_path.display(), "File rejected as not R");
            ConversionView {
                error_message: Some(message),
                download_link: Some(download_link(&artifact.output_name())),
                ..Default::default()
            }
        }
        Err(message) => ConversionView::error(message),
    }
}

/// Save the upload, read it back, translate it and write the output file.
///
/// A rejection still produces an output file holding the rejection message. Any other failure
/// returns the message to display and produces no link.
async fn store_and_translate(state: &AppState, credential: &Credential, file: &UploadedFile) -> Result<UploadResult, String> {
    let input_path = state
        .storage
        .save_upload(&file.file_name, &file.bytes)
        .await
        .map_err(|e| upload_failure("save upload", e))?;

    let source = tokio::fs::read_to_string(&input_path)
        .await
        .map_err(|e| upload_failure("read upload", e))?;

    let (output_text, rejection) = match state.translator.translate(credential, &source).await {
        TranslationOutcome::Success(python_code) => (python_code, None),
        TranslationOutcome::Rejected(message) => (message.clone(), Some(message)),
        TranslationOutcome::Failed(message) => return Err(message),
    };

    let artifact = state
        .storage
        .write_output(&input_path, &output_text)
        .await
        .map_err(|e| upload_failure("write output", e))?;

    Ok(match rejection {
        None => UploadResult::Converted(artifact),
        Some(message) => UploadResult::Rejected(artifact, message),
    })
}

fn upload_failure(operation: &str, e: std::io::Error) -> String {
    warn!(operation, error = %e, "Upload conversion failed");
    format!("{UPLOAD_FAILURE_PREFIX}: {e}")
}

/// `/download/<name>` with the name percent-encoded as a single path segment.
pub fn download_link(file_name: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/download/") else {
        return format!("/download/{file_name}");
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(file_name);
    }
    url.path().to_string()
}
