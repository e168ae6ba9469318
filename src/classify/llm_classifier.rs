use super::{ClassificationResult, Classifier, ClassifyContext};
use crate::config::ClassifyConfig;
use crate::error::{Error, Result};
use crate::llm::{strip_code_fences, ChatMessage, LlmClient};
use crate::store::{DomainCatalog, KnowledgeDomain, DEFAULT_NAMESPACE};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const CLASSIFY_SYSTEM_PROMPT: &str = "You are a query router for a multi-domain knowledge base. \
Given a user query and the list of available domains, pick the single best domain. \
Respond with strict JSON only, no prose: \
{\"namespace\": \"...\", \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}";

const CLASSIFY_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Deserialize)]
struct LlmClassification {
    namespace: String,
    confidence: f32,
    #[serde(default)]
    reasoning: Option<String>,
}

/// LLM-backed domain classifier.
///
/// Sends the active domain catalog and the query to the completion
/// backend and expects a strict JSON verdict back. Errors here are real
/// errors; degradation to keywords is the hybrid classifier's job.
pub struct LlmClassifier {
    domains: Arc<DomainCatalog>,
    llm: Arc<dyn LlmClient>,
    cfg: ClassifyConfig,
}

impl LlmClassifier {
    pub fn new(domains: Arc<DomainCatalog>, llm: Arc<dyn LlmClient>, cfg: ClassifyConfig) -> Self {
        Self { domains, llm, cfg }
    }

    fn build_user_prompt(query: &str, domains: &[KnowledgeDomain], ctx: &ClassifyContext) -> String {
        let mut prompt = String::from("Available domains:\n");
        for domain in domains {
            prompt.push_str(&format!(
                "- {} ({}): {} [keywords: {}]\n",
                domain.namespace,
                domain.display_name,
                domain.description.as_deref().unwrap_or(""),
                domain.keywords().join(", ")
            ));
        }
        if let Some(previous) = &ctx.previous_domain {
            prompt.push_str(&format!(
                "\nThe previous turn in this conversation was routed to '{}'.\n",
                previous
            ));
        }
        prompt.push_str(&format!("\nQuery: {}", query));
        prompt
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, query: &str, ctx: &ClassifyContext) -> Result<ClassificationResult> {
        let domains = self.domains.active().await?;
        if domains.is_empty() {
            return Err(Error::Classification(
                "no active domains to classify into".to_string(),
            ));
        }

        let messages = vec![
            ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_prompt(query, &domains, ctx)),
        ];
        let completion = self
            .llm
            .complete(messages, CLASSIFY_TEMPERATURE, 256)
            .await?;
        let body = strip_code_fences(&completion.content);
        let mut verdict: LlmClassification = serde_json::from_str(body).map_err(|e| {
            Error::Classification(format!("LLM returned unparseable classification: {}", e))
        })?;

        // An unknown namespace in the reply is substituted with the
        // default domain rather than failing the turn
        let mut reasoning = verdict.reasoning.take();
        let domain = match domains.iter().find(|d| d.namespace == verdict.namespace) {
            Some(domain) => domain,
            None => {
                warn!(
                    chosen = %verdict.namespace,
                    "LLM chose unknown domain, substituting default"
                );
                reasoning = Some(format!(
                    "LLM chose unknown domain '{}'",
                    verdict.namespace
                ));
                verdict.confidence = self.cfg.default_confidence;
                domains
                    .iter()
                    .find(|d| d.namespace == DEFAULT_NAMESPACE)
                    .unwrap_or(&domains[0])
            }
        };

        let confidence = verdict.confidence.clamp(0.0, 1.0);
        debug!(
            namespace = %domain.namespace,
            confidence,
            "LLM classification complete"
        );

        Ok(ClassificationResult {
            namespace: domain.namespace.clone(),
            display_name: domain.display_name.clone(),
            confidence,
            method: "llm".to_string(),
            reasoning,
            alternatives: Vec::new(),
            fallback_to_cross_domain: confidence < self.cfg.keyword_fallback_threshold,
            metadata: serde_json::Map::new(),
        })
    }
}
