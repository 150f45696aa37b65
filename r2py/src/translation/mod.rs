//! Translation of R source into Python through an external completion service.
//!
//! The [`Translator`] trait is the seam between request handling and the model: the production
//! implementation is [`OpenAiTranslator`], tests substitute a stub. A translation always ends in
//! one of three [`TranslationOutcome`] variants; callers branch on the variant, never on the text.

mod openai;
mod prompt;

pub use openai::OpenAiTranslator;
pub use prompt::{REJECTION_MESSAGE, REJECTION_PREFIX, build_prompt, classify_completion, dedent};

use async_trait::async_trait;
use std::fmt;

/// Prefix put in front of every operational failure shown to the user.
pub const FAILURE_PREFIX: &str = "Error during R to Python conversion";

/// The user's API key for the completion service.
///
/// Only ever held for the duration of one request. `Debug` is redacted so the key cannot end up
/// in logs or spans by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for a blank key.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Result of one translation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Translated Python code, left-aligned.
    Success(String),
    /// The model judged the input not to be valid R. Carries the model's message.
    Rejected(String),
    /// Transport, authentication or response-format failure. Carries a user-facing description.
    Failed(String),
}

impl TranslationOutcome {
    pub fn failed(cause: impl fmt::Display) -> Self {
        Self::Failed(format!("{FAILURE_PREFIX}: {cause}"))
    }
}

/// Translates R source text into Python.
///
/// Implementations make a single attempt per call and never retry.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, credential: &Credential, source: &str) -> TranslationOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   \t").is_none());
        assert_eq!(Credential::new("  sk-test ").unwrap().expose(), "sk-test");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("sk-very-secret").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn test_failed_carries_prefix_and_cause() {
        assert_eq!(
            TranslationOutcome::failed("connection refused"),
            TranslationOutcome::Failed("Error during R to Python conversion: connection refused".to_string())
        );
    }
}
