//! Test utilities shared by the handler, client and application tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use crate::config::{Config, StorageConfig};
use crate::storage::Storage;
use crate::translation::{Credential, TranslationOutcome, Translator};
use crate::{AppState, build_router};

static CRYPTO_PROVIDER: Once = Once::new();

/// reqwest is built without a default rustls provider; install one once per test binary.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// A `/completions` response body carrying `text` as its only choice.
pub fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "created": 1_700_000_000,
        "model": "gpt-3.5-turbo-instruct",
        "choices": [{
            "text": text,
            "index": 0,
            "logprobs": null,
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 120,
            "completion_tokens": 12,
            "total_tokens": 132
        }
    })
}

/// Config whose working directories live under `root`.
pub fn create_test_config(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            upload_dir: root.join("upload"),
            output_dir: root.join("output"),
        },
        ..Default::default()
    }
}

/// Router over a fresh temp directory, with `translator` in place of the completion client.
///
/// The returned [`TempDir`] must outlive the server.
pub fn create_test_server(translator: Arc<dyn Translator>) -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(dir.path());
    let storage =
        Storage::new(&config.storage.upload_dir, &config.storage.output_dir).expect("Failed to create working directories");

    let state = AppState::builder().config(config).storage(storage).translator(translator).build();
    let server = TestServer::new(build_router(state)).expect("Failed to create test server");
    (server, dir)
}

/// Sorted names of the entries in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|entry| entry.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A [`Translator`] that returns a fixed outcome and records what it was asked.
pub struct StubTranslator {
    outcome: TranslationOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_source: Mutex<Option<String>>,
}

impl StubTranslator {
    fn with_outcome(outcome: TranslationOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_source: Mutex::new(None),
        }
    }

    pub fn success(python: &str) -> Self {
        Self::with_outcome(TranslationOutcome::Success(python.to_string()))
    }

    pub fn rejected(message: &str) -> Self {
        Self::with_outcome(TranslationOutcome::Rejected(message.to_string()))
    }

    /// `message` is shown as-is, so pass the full user-facing text.
    pub fn failed(message: &str) -> Self {
        Self::with_outcome(TranslationOutcome::Failed(message.to_string()))
    }

    /// Sleep for `delay` inside every `translate` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `translate` calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_source(&self) -> Option<String> {
        self.last_source.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, _credential: &Credential, source: &str) -> TranslationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        *self.last_source.lock().unwrap() = Some(source.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
