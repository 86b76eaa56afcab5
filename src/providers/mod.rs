use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::strings::TranslationUnit;

mod openai;
mod retry;

pub use openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAI};

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl ProviderUsage {
    pub fn add(&mut self, other: &ProviderUsage) {
        self.prompt_tokens = sum(self.prompt_tokens, other.prompt_tokens);
        self.completion_tokens = sum(self.completion_tokens, other.completion_tokens);
        self.total_tokens = sum(self.total_tokens, other.total_tokens);
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

fn sum(left: Option<u64>, right: Option<u64>) -> Option<u64> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left + right),
        (value, None) | (None, value) => value,
    }
}

/// One entry of a batch as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub key: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl From<&TranslationUnit> for BatchItem {
    fn from(unit: &TranslationUnit) -> Self {
        Self {
            key: unit.key.clone(),
            text: unit.source_text.clone(),
            comment: unit.comment.clone(),
        }
    }
}

/// Per-run instructions shared by every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequest {
    /// "auto" lets the model detect it.
    pub source_language: String,
    pub target_language: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationResult {
    /// One entry per batch item, same order.
    pub translations: Vec<String>,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<TranslationResult>> + Send + 'a>>;

/// Translates one batch per call.
pub trait TranslationClient: Send + Sync {
    fn translate<'a>(
        &'a self,
        batch: &'a [BatchItem],
        request: &'a TranslateRequest,
    ) -> TranslateFuture<'a>;
}

impl<C: TranslationClient + ?Sized> TranslationClient for Box<C> {
    fn translate<'a>(
        &'a self,
        batch: &'a [BatchItem],
        request: &'a TranslateRequest,
    ) -> TranslateFuture<'a> {
        (**self).translate(batch, request)
    }
}
