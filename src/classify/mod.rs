//! Query domain classification
//!
//! Decides which knowledge domain a query belongs to. Three classifiers
//! share one trait: keyword scoring (fast, offline), LLM classification,
//! and a hybrid that runs keywords first and consults the LLM only when
//! the keyword signal is weak.

mod hybrid;
mod keyword;
mod llm_classifier;
pub mod rules;

pub use hybrid::HybridClassifier;
pub use keyword::KeywordClassifier;
pub use llm_classifier::LlmClassifier;

use crate::config::ClassifyConfig;
use crate::error::{Error, Result};
use crate::llm::LlmClient;
use crate::store::{DomainCatalog, RuleCatalog};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// A non-winning candidate domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainAlternative {
    pub namespace: String,
    pub display_name: String,
    pub confidence: f32,
}

/// Outcome of classifying one query
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub namespace: String,
    pub display_name: String,
    pub confidence: f32,
    /// Which path produced this result ("keyword", "llm", "keyword_only",
    /// "both_agree", "keyword_chosen", "llm_chosen", "keyword_fallback")
    pub method: String,
    pub reasoning: Option<String>,
    pub alternatives: Vec<DomainAlternative>,
    /// Set when the signal is too weak to trust a single domain
    pub fallback_to_cross_domain: bool,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Conversation state available to classifiers
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    pub previous_domain: Option<String>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, query: &str, ctx: &ClassifyContext) -> Result<ClassificationResult>;
}

/// Build the classifier selected by `classify.mode`.
pub fn create_classifier(
    cfg: &ClassifyConfig,
    domains: Arc<DomainCatalog>,
    rules: Arc<RuleCatalog>,
    llm: Arc<dyn LlmClient>,
) -> Result<Box<dyn Classifier>> {
    match cfg.mode.as_str() {
        "keyword" => Ok(Box::new(KeywordClassifier::new(
            domains,
            rules,
            cfg.clone(),
        ))),
        "llm" => Ok(Box::new(LlmClassifier::new(domains, llm, cfg.clone()))),
        "hybrid" => Ok(Box::new(HybridClassifier::new(
            KeywordClassifier::new(domains.clone(), rules, cfg.clone()),
            LlmClassifier::new(domains, llm, cfg.clone()),
            cfg.clone(),
        ))),
        other => Err(Error::Config(format!(
            "Unknown classification mode '{}', expected keyword, llm or hybrid",
            other
        ))),
    }
}
