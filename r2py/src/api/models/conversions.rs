//! Form input and view state for the conversion page.

use std::collections::HashMap;

use axum::{
    Form,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::translation::Credential;

/// Form action for pasted R code.
pub const ACTION_CONVERT: &str = "convert";
/// Form action for an uploaded R file.
pub const ACTION_UPLOAD_CONVERT: &str = "upload_convert";

/// An R file received through the `r_file` form field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Accepts exactly the `.R` and `.r` suffixes.
    pub fn has_r_extension(&self) -> bool {
        self.file_name.ends_with(".R") || self.file_name.ends_with(".r")
    }
}

/// The submitted conversion form.
///
/// Accepted as `multipart/form-data` (needed for uploads) or `application/x-www-form-urlencoded`.
/// A blank `openai_key` is represented as `credential: None`.
#[derive(Debug, Default)]
pub struct ConversionForm {
    pub action: Option<String>,
    pub credential: Option<Credential>,
    pub r_code: Option<String>,
    pub r_file: Option<UploadedFile>,
}

impl ConversionForm {
    fn set_text_field(&mut self, name: &str, value: String) {
        match name {
            "action" => self.action = Some(value),
            "openai_key" => self.credential = Credential::new(&value),
            "r_code" => self.r_code = Some(value),
            _ => {}
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, Error> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {e}"),
        })? {
            let field_name = field.name().unwrap_or("").to_string();

            if field_name == "r_file" {
                let file_name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read uploaded file: {e}"),
                })?;
                // Browsers send an empty part with no file name when nothing was selected
                if let Some(file_name) = file_name.filter(|n| !n.is_empty()) {
                    tracing::debug!(file_name = %file_name, size = bytes.len(), "Received upload");
                    form.r_file = Some(UploadedFile { file_name, bytes });
                }
            } else {
                let value = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read form field {field_name}: {e}"),
                })?;
                form.set_text_field(&field_name, value);
            }
        }

        Ok(form)
    }
}

impl<S> FromRequest<S> for ConversionForm
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| Error::BadRequest {
                message: format!("Failed to parse multipart data: {e}"),
            })?;
            return Self::from_multipart(multipart).await;
        }

        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|e| Error::BadRequest {
                message: format!("Failed to parse form data: {e}"),
            })?;

        let mut form = Self::default();
        for (name, value) in fields {
            form.set_text_field(&name, value);
        }
        Ok(form)
    }
}

/// Everything the conversion page displays.
///
/// Serialised as-is for JSON clients and handed to the HTML template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionView {
    pub r_code: String,
    pub python_code: String,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
    pub download_link: Option<String>,
}

impl ConversionView {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"x <- 1"),
        }
    }

    #[test]
    fn test_r_extension_is_exact_suffix() {
        assert!(file("script.R").has_r_extension());
        assert!(file("script.r").has_r_extension());
        assert!(!file("script.py").has_r_extension());
        assert!(!file("script.Rmd").has_r_extension());
        assert!(!file("script.R.txt").has_r_extension());
        assert!(!file("script").has_r_extension());
    }

    #[test]
    fn test_blank_key_becomes_missing_credential() {
        let mut form = ConversionForm::default();
        form.set_text_field("openai_key", "   ".to_string());
        assert!(form.credential.is_none());

        form.set_text_field("openai_key", "sk-test".to_string());
        assert_eq!(form.credential.as_ref().map(|c| c.expose()), Some("sk-test"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut form = ConversionForm::default();
        form.set_text_field("csrf", "token".to_string());
        assert!(form.action.is_none() && form.r_code.is_none() && form.credential.is_none());
    }
}
