//! Rendering of [`ConversionView`] as an HTML page or JSON.

use std::sync::OnceLock;

use axum::{
    Json,
    http::{HeaderMap, header::ACCEPT},
    response::{Html, IntoResponse, Response},
};
use minijinja::Environment;

use crate::api::models::conversions::ConversionView;
use crate::errors::Error;

const INDEX_TEMPLATE: &str = "index.html";

static TEMPLATES: OnceLock<Environment<'static>> = OnceLock::new();

fn templates() -> &'static Environment<'static> {
    TEMPLATES.get_or_init(|| {
        let mut env = Environment::new();
        env.add_template(INDEX_TEMPLATE, include_str!("../templates/index.html"))
            .expect("Failed to parse embedded index template");
        env
    })
}

/// Render the conversion page for `view`.
pub fn render_page(view: &ConversionView) -> Result<String, minijinja::Error> {
    templates().get_template(INDEX_TEMPLATE)?.render(view)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFormat {
    Html,
    Json,
}

impl ViewFormat {
    /// JSON when the client asks for it, HTML otherwise.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("application/json"));
        if wants_json { Self::Json } else { Self::Html }
    }
}

/// A view ready to be turned into a response.
#[derive(Debug)]
pub struct Rendered {
    pub view: ConversionView,
    pub format: ViewFormat,
}

impl Rendered {
    pub fn new(view: ConversionView, format: ViewFormat) -> Self {
        Self { view, format }
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        match self.format {
            ViewFormat::Json => Json(self.view).into_response(),
            ViewFormat::Html => match render_page(&self.view) {
                Ok(page) => Html(page).into_response(),
                Err(e) => Error::Internal {
                    operation: format!("render conversion page: {e}"),
                }
                .into_response(),
            },
        }
    }
}
