use super::{ClassificationResult, Classifier, ClassifyContext, KeywordClassifier, LlmClassifier};
use crate::config::ClassifyConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

/// Keyword-first classifier with LLM escalation.
///
/// A strong keyword verdict skips the LLM call entirely. Otherwise both
/// verdicts are combined: agreement earns a confidence bonus, and on
/// disagreement the more confident classifier wins. An LLM failure
/// degrades to the keyword verdict instead of failing the query.
pub struct HybridClassifier {
    keyword: KeywordClassifier,
    llm: LlmClassifier,
    cfg: ClassifyConfig,
}

impl HybridClassifier {
    pub fn new(keyword: KeywordClassifier, llm: LlmClassifier, cfg: ClassifyConfig) -> Self {
        Self { keyword, llm, cfg }
    }
}

/// Mark a verdict as hybrid and record which path produced it
fn tag(mut result: ClassificationResult, strategy: &str) -> ClassificationResult {
    result.method = "hybrid".to_string();
    result
        .metadata
        .insert("strategy".to_string(), json!(strategy));
    result
}

#[async_trait]
impl Classifier for HybridClassifier {
    async fn classify(&self, query: &str, ctx: &ClassifyContext) -> Result<ClassificationResult> {
        let keyword = self.keyword.classify(query, ctx).await?;

        if keyword.confidence >= self.cfg.keyword_shortcut_threshold {
            debug!(
                namespace = %keyword.namespace,
                confidence = keyword.confidence,
                "Keyword verdict strong enough, skipping LLM"
            );
            return Ok(tag(keyword, "keyword_only"));
        }

        let llm = match self.llm.classify(query, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "LLM classification failed, keeping keyword verdict");
                return Ok(tag(keyword, "keyword_fallback"));
            }
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("keyword_confidence".to_string(), json!(keyword.confidence));
        metadata.insert("llm_confidence".to_string(), json!(llm.confidence));

        if keyword.namespace == llm.namespace {
            let averaged = (keyword.confidence + llm.confidence) / 2.0;
            let confidence = (averaged + self.cfg.agreement_bonus).min(1.0);
            let mut result = ClassificationResult {
                namespace: llm.namespace,
                display_name: llm.display_name,
                confidence,
                method: String::new(),
                reasoning: llm.reasoning,
                alternatives: keyword.alternatives,
                fallback_to_cross_domain: confidence < self.cfg.keyword_fallback_threshold,
                metadata,
            };
            result = tag(result, "both_agree");
            return Ok(result);
        }

        let winner = if llm.confidence >= keyword.confidence {
            let mut result = llm;
            result.alternatives = keyword.alternatives;
            result.metadata = metadata;
            tag(result, "llm_chosen")
        } else {
            let mut result = keyword;
            result.metadata = metadata;
            tag(result, "keyword_chosen")
        };
        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, Completion, LlmClient};
    use crate::store::{DomainCatalog, KnowledgeDomain, RuleCatalog, Store};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct CannedLlm(Result<String>);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<Completion> {
            match &self.0 {
                Ok(content) => Ok(Completion {
                    content: content.clone(),
                    tokens_used: None,
                }),
                Err(_) => Err(crate::error::Error::Llm("backend down".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    async fn hybrid_with(llm_reply: Result<String>) -> (TempDir, HybridClassifier) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        store.ensure_default_domain().await.unwrap();
        store
            .insert_domain(&KnowledgeDomain::new(
                "billing",
                "Billing",
                vec!["发票".to_string(), "账单".to_string()],
            ))
            .await
            .unwrap();
        store
            .insert_domain(&KnowledgeDomain::new(
                "technical_docs",
                "Technical Docs",
                vec!["API".to_string()],
            ))
            .await
            .unwrap();

        let domains = Arc::new(DomainCatalog::new(store.clone(), Duration::from_secs(300)));
        let rules = Arc::new(RuleCatalog::new(store, Duration::from_secs(300)));
        let cfg = ClassifyConfig::default();
        let classifier = HybridClassifier::new(
            KeywordClassifier::new(domains.clone(), rules, cfg.clone()),
            LlmClassifier::new(domains, Arc::new(CannedLlm(llm_reply)), cfg.clone()),
            cfg,
        );
        (dir, classifier)
    }

    #[tokio::test]
    async fn test_strong_keyword_verdict_skips_llm() {
        // The single query token matches a billing keyword, confidence 1.0
        let (_dir, classifier) = hybrid_with(Err(crate::error::Error::Llm("unused".into()))).await;

        let result = classifier
            .classify("发票", &ClassifyContext::default())
            .await
            .unwrap();
        assert_eq!(result.namespace, "billing");
        assert_eq!(result.method, "hybrid");
        assert_eq!(result.metadata["strategy"], "keyword_only");
    }

    #[tokio::test]
    async fn test_agreement_earns_bonus() {
        let (_dir, classifier) = hybrid_with(Ok(
            r#"{"namespace": "technical_docs", "confidence": 0.6}"#.to_string(),
        ))
        .await;

        // Weak keyword signal toward technical_docs, LLM agrees
        let result = classifier
            .classify(
                "请问调用API的时候出现错误应该怎么排查问题",
                &ClassifyContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.namespace, "technical_docs");
        assert_eq!(result.metadata["strategy"], "both_agree");
        let keyword_conf = result.metadata["keyword_confidence"].as_f64().unwrap() as f32;
        let expected = ((keyword_conf + 0.6) / 2.0 + 0.2).min(1.0);
        assert!((result.confidence - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_disagreement_keeps_higher_confidence() {
        let (_dir, classifier) =
            hybrid_with(Ok(r#"{"namespace": "billing", "confidence": 0.9}"#.to_string())).await;

        let result = classifier
            .classify(
                "请问调用API的时候出现错误应该怎么排查问题",
                &ClassifyContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.namespace, "billing");
        assert_eq!(result.metadata["strategy"], "llm_chosen");
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_keyword() {
        let (_dir, classifier) = hybrid_with(Err(crate::error::Error::Llm("down".into()))).await;

        let result = classifier
            .classify(
                "请问调用API的时候出现错误应该怎么排查问题",
                &ClassifyContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.namespace, "technical_docs");
        assert_eq!(result.metadata["strategy"], "keyword_fallback");
    }
}
