//! # r2py: R to Python conversion front-end
//!
//! `r2py` serves a single web page where a user pastes R code or uploads an `.R` file together
//! with their OpenAI API key, and gets back a Python translation. The translation itself is done
//! by an external text-completion model; this crate validates input, builds the prompt, calls the
//! completion endpoint once, cleans up the answer and either shows it or stores it for download.
//!
//! ## Request Flow
//!
//! - `GET /` renders the empty form.
//! - `POST /` with `action=convert` translates the `r_code` field and shows the result. No files
//!   are written.
//! - `POST /` with `action=upload_convert` clears the two working directories, stores the uploaded
//!   `r_file`, translates it and writes `<name>.py` into the output directory, returning a link to
//!   `GET /download/<name>.py`.
//!
//! Every view is rendered as HTML, or as JSON when the request carries
//! `Accept: application/json`.
//!
//! ## Core Components
//!
//! - [`translation`]: the [`translation::Translator`] seam, the OpenAI-compatible client and the
//!   prompt/post-processing rules, producing an explicit
//!   [`translation::TranslationOutcome`]
//! - [`storage`]: housekeeping for the upload and output directories
//! - [`api`]: form extraction, the conversion and download handlers
//! - [`view`]: HTML/JSON rendering of the page state
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use r2py::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = r2py::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     r2py::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```
pub mod api;
pub mod config;
pub mod errors;
pub mod storage;
pub mod telemetry;
pub mod translation;
pub mod view;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

use crate::storage::Storage;
use crate::translation::{OpenAiTranslator, Translator};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .storage(storage)
///     .translator(Arc::new(translator))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
    pub translator: Arc<dyn Translator>,
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size;

    Router::new()
        .route(
            "/",
            get(api::handlers::convert::index).post(api::handlers::convert::convert),
        )
        .route("/download/{filename}", get(api::handlers::download::download_file))
        .route("/healthz", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// The assembled service: working directories, translation client and router.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting r2py with configuration: {:#?}", config);

        let storage = Storage::new(&config.storage.upload_dir, &config.storage.output_dir)
            .context("Failed to create working directories")?;
        let translator = OpenAiTranslator::new(&config.completions)?;

        let state = AppState::builder()
            .config(config.clone())
            .storage(storage)
            .translator(Arc::new(translator))
            .build();

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "r2py listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
