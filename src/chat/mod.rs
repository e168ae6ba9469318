//! Chat-facing retrieval orchestration
//!
//! One entry point, `ChatOrchestrator::search_for_chat`, runs the full
//! pipeline for a conversational query: rewrite, domain classification
//! with inheritance from the previous turn, single- or cross-domain
//! retrieval with a multi-level degradation chain, and telemetry. The
//! orchestrator never returns an error: every failure degrades to the
//! next level and is reported through response metadata instead.

use crate::classify::{ClassificationResult, Classifier, ClassifyContext};
use crate::config::{ClassifyConfig, RetrievalConfig};
use crate::error::Result;
use crate::llm::ChatMessage;
use crate::retrieval::{Bm25Retrieval, CrossDomainRetrieval, HybridRetrieval, ScoredChunk};
use crate::rewrite::QueryRewriter;
use crate::store::DEFAULT_NAMESPACE;
use crate::telemetry::{QueryLogEntry, QueryLogSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Marker returned when every retrieval level came back empty or failed.
/// The wording is load-bearing: chat clients match on it.
pub const ALL_RETRIEVAL_FAILED: &str = "所有检索方法均失败";

const CROSS_DOMAIN_EMPTY: &str = "跨领域检索无结果";

/// A chat search request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatSearchRequest {
    pub query: String,
    /// Explicit domain; skips classification entirely when set
    pub namespace: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    /// Domain the previous turn was routed to, for inheritance
    pub previous_domain: Option<String>,
    pub session_id: Option<String>,
    pub top_k: Option<usize>,
}

/// One source chunk in the legacy chat response shape
#[derive(Debug, Clone, Serialize)]
pub struct ChatSource {
    pub chunk_id: String,
    pub content: String,
    pub similarity: f32,
    pub filename: String,
    pub namespace: Option<String>,
}

impl From<ScoredChunk> for ChatSource {
    fn from(chunk: ScoredChunk) -> Self {
        Self {
            chunk_id: chunk.id,
            content: chunk.content,
            similarity: chunk.score,
            filename: chunk.filename,
            namespace: Some(chunk.namespace),
        }
    }
}

/// Chat search response: sources plus diagnostic metadata
#[derive(Debug, Clone, Serialize)]
pub struct ChatSearchResponse {
    pub sources: Vec<ChatSource>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One level of the single-domain degradation chain
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self, query: &str, namespace: &str, top_k: usize)
        -> Result<Vec<ScoredChunk>>;
}

/// Cross-domain search seam, mockable in tests
#[async_trait]
pub trait CrossDomainSearch: Send + Sync {
    async fn search_across(
        &self,
        query: &str,
        top_k: usize,
        domain_weights: Option<HashMap<String, f32>>,
        alpha: f32,
    ) -> Result<Vec<ScoredChunk>>;
}

#[async_trait]
impl CrossDomainSearch for CrossDomainRetrieval {
    async fn search_across(
        &self,
        query: &str,
        top_k: usize,
        domain_weights: Option<HashMap<String, f32>>,
        alpha: f32,
    ) -> Result<Vec<ScoredChunk>> {
        self.search_across_domains(query, None, top_k, domain_weights, alpha)
            .await
    }
}

/// Level 1: full hybrid fusion, optionally reranked
pub struct HybridStrategy {
    hybrid: Arc<HybridRetrieval>,
    alpha: f32,
    use_rrf: bool,
    use_rerank: bool,
}

impl HybridStrategy {
    pub fn new(hybrid: Arc<HybridRetrieval>, alpha: f32, use_rrf: bool, use_rerank: bool) -> Self {
        Self {
            hybrid,
            alpha,
            use_rrf,
            use_rerank,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for HybridStrategy {
    fn name(&self) -> &str {
        "混合检索"
    }

    async fn attempt(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.hybrid
            .search_by_namespace(
                query,
                namespace,
                top_k,
                self.alpha,
                self.use_rrf,
                self.use_rerank,
            )
            .await
    }
}

/// Level 2: vector leg only (alpha 1.0, no RRF)
pub struct VectorOnlyStrategy {
    hybrid: Arc<HybridRetrieval>,
}

impl VectorOnlyStrategy {
    pub fn new(hybrid: Arc<HybridRetrieval>) -> Self {
        Self { hybrid }
    }
}

#[async_trait]
impl RetrievalStrategy for VectorOnlyStrategy {
    fn name(&self) -> &str {
        "向量检索"
    }

    async fn attempt(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.hybrid
            .search_by_namespace(query, namespace, top_k, 1.0, false, false)
            .await
    }
}

/// Level 3: lexical BM25 only
pub struct Bm25Strategy {
    bm25: Arc<Bm25Retrieval>,
}

impl Bm25Strategy {
    pub fn new(bm25: Arc<Bm25Retrieval>) -> Self {
        Self { bm25 }
    }
}

#[async_trait]
impl RetrievalStrategy for Bm25Strategy {
    fn name(&self) -> &str {
        "BM25检索"
    }

    async fn attempt(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.bm25.search_by_namespace(query, namespace, top_k).await
    }
}

pub struct ChatOrchestrator {
    classifier: Arc<dyn Classifier>,
    rewriter: Option<Arc<QueryRewriter>>,
    strategies: Vec<Arc<dyn RetrievalStrategy>>,
    cross_domain: Arc<dyn CrossDomainSearch>,
    log_sink: Arc<dyn QueryLogSink>,
    classify_cfg: ClassifyConfig,
    retrieval_cfg: RetrievalConfig,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        rewriter: Option<Arc<QueryRewriter>>,
        strategies: Vec<Arc<dyn RetrievalStrategy>>,
        cross_domain: Arc<dyn CrossDomainSearch>,
        log_sink: Arc<dyn QueryLogSink>,
        classify_cfg: ClassifyConfig,
        retrieval_cfg: RetrievalConfig,
    ) -> Self {
        Self {
            classifier,
            rewriter,
            strategies,
            cross_domain,
            log_sink,
            classify_cfg,
            retrieval_cfg,
        }
    }

    /// Run the full chat retrieval pipeline. Infallible by contract:
    /// degradation and metadata carry every failure instead of an Err.
    pub async fn search_for_chat(&self, request: ChatSearchRequest) -> ChatSearchResponse {
        let started = Instant::now();
        let top_k = request.top_k.unwrap_or(self.retrieval_cfg.top_k);

        // Step 1: query rewriting from chat history
        let rewrite_started = Instant::now();
        let (effective_query, was_rewritten) = match &self.rewriter {
            Some(rewriter) if !request.chat_history.is_empty() => {
                rewriter
                    .rewrite_with_context(&request.query, &request.chat_history)
                    .await
            }
            _ => (request.query.clone(), false),
        };
        let rewrite_ms = rewrite_started.elapsed().as_millis() as i64;

        // Step 2: domain classification, or the caller's explicit domain
        let classification_started = Instant::now();
        let (classification, inherited) = self
            .resolve_domain(&effective_query, &request)
            .await;
        let classification_ms = classification_started.elapsed().as_millis() as i64;
        info!(
            namespace = %classification.namespace,
            confidence = classification.confidence,
            method = %classification.method,
            "Query classified"
        );

        // Step 3: retrieval with degradation
        let single_domain = classification.confidence >= self.classify_cfg.route_threshold;
        let retrieval_started = Instant::now();
        let (results, degradation) = if single_domain {
            self.single_domain_search(&effective_query, &classification.namespace, top_k)
                .await
        } else {
            debug!(
                confidence = classification.confidence,
                "Low confidence, searching across domains"
            );
            self.cross_domain_search(&effective_query, &classification, top_k)
                .await
        };
        let retrieval_ms = retrieval_started.elapsed().as_millis() as i64;

        let retrieval_mode = if single_domain {
            "single_domain"
        } else {
            "cross_domain"
        };
        let sources: Vec<ChatSource> = results.into_iter().map(ChatSource::from).collect();
        let total_ms = started.elapsed().as_millis() as i64;

        // Step 4: telemetry, swallowed on failure
        let entry = QueryLogEntry {
            query: request.query.clone(),
            namespace: Some(classification.namespace.clone()),
            retrieval_mode: Some(retrieval_mode.to_string()),
            retrieval_method: Some(classification.method.clone()),
            classification_ms: Some(classification_ms),
            retrieval_ms: Some(retrieval_ms),
            rewrite_ms: was_rewritten.then_some(rewrite_ms),
            total_ms: Some(total_ms),
            result_count: sources.len() as i64,
            session_id: request.session_id.clone(),
            error: degradation.clone(),
        };
        if let Err(e) = self.log_sink.log_query(&entry).await {
            warn!(error = %e, "Query telemetry failed");
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "classification".to_string(),
            serde_json::to_value(&classification).unwrap_or(serde_json::Value::Null),
        );
        metadata.insert("retrieval_mode".to_string(), json!(retrieval_mode));
        metadata.insert(
            "query_rewrite".to_string(),
            json!({
                "was_rewritten": was_rewritten,
                "rewritten_query": effective_query,
            }),
        );
        metadata.insert(
            "session_context".to_string(),
            json!({ "domain_inherited": inherited }),
        );
        metadata.insert("classification_latency_ms".to_string(), json!(classification_ms));
        metadata.insert("retrieval_latency_ms".to_string(), json!(retrieval_ms));
        metadata.insert("total_latency_ms".to_string(), json!(total_ms));
        metadata.insert("total_results".to_string(), json!(sources.len()));
        metadata.insert("error".to_string(), json!(degradation));

        ChatSearchResponse { sources, metadata }
    }

    /// Classify the query, inheriting the previous turn's domain when the
    /// fresh verdict is too weak to route on.
    async fn resolve_domain(
        &self,
        query: &str,
        request: &ChatSearchRequest,
    ) -> (ClassificationResult, bool) {
        if let Some(namespace) = &request.namespace {
            return (
                ClassificationResult {
                    namespace: namespace.clone(),
                    display_name: namespace.clone(),
                    confidence: 1.0,
                    method: "user_specified".to_string(),
                    reasoning: None,
                    alternatives: Vec::new(),
                    fallback_to_cross_domain: false,
                    metadata: serde_json::Map::new(),
                },
                false,
            );
        }

        let ctx = ClassifyContext {
            previous_domain: request.previous_domain.clone(),
        };
        let fresh = match self.classifier.classify(query, &ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Classification failed, using fallback domain");
                let (namespace, confidence) = match &request.previous_domain {
                    Some(previous) => (previous.clone(), 0.6),
                    None => (
                        DEFAULT_NAMESPACE.to_string(),
                        self.classify_cfg.default_confidence,
                    ),
                };
                let inherited = request.previous_domain.is_some();
                return (
                    ClassificationResult {
                        display_name: namespace.clone(),
                        namespace,
                        confidence,
                        method: "fallback".to_string(),
                        reasoning: Some(format!("classification failed: {}", e)),
                        alternatives: Vec::new(),
                        fallback_to_cross_domain: !inherited,
                        metadata: serde_json::Map::new(),
                    },
                    inherited,
                );
            }
        };

        let Some(previous) = &request.previous_domain else {
            return (fresh, false);
        };
        if fresh.confidence >= self.classify_cfg.route_threshold {
            return (fresh, false);
        }

        info!(
            previous_domain = %previous,
            fresh_namespace = %fresh.namespace,
            fresh_confidence = fresh.confidence,
            "Inheriting previous turn's domain"
        );
        let mut metadata = fresh.metadata.clone();
        metadata.insert(
            "original_classification".to_string(),
            json!({
                "namespace": fresh.namespace,
                "confidence": fresh.confidence,
                "method": fresh.method,
            }),
        );
        let inherited = ClassificationResult {
            namespace: previous.clone(),
            display_name: previous.clone(),
            confidence: self.classify_cfg.inherited_confidence,
            method: format!("{}_inherited", fresh.method),
            reasoning: fresh.reasoning,
            alternatives: fresh.alternatives,
            fallback_to_cross_domain: false,
            metadata,
        };
        (inherited, true)
    }

    /// Walk the degradation chain until a level returns results. Returns
    /// the results plus a marker describing the degradation, if any.
    async fn single_domain_search(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> (Vec<ScoredChunk>, Option<String>) {
        for (level, strategy) in self.strategies.iter().enumerate() {
            match strategy.attempt(query, namespace, top_k).await {
                Ok(results) if !results.is_empty() => {
                    let marker = if level == 0 {
                        None
                    } else {
                        Some(format!("降级到{}", strategy.name()))
                    };
                    if marker.is_some() {
                        info!(level, strategy = %strategy.name(), "Retrieval degraded");
                    }
                    return (results, marker);
                }
                Ok(_) => {
                    debug!(strategy = %strategy.name(), "No results, trying next level");
                }
                Err(e) => {
                    warn!(strategy = %strategy.name(), error = %e, "Retrieval level failed");
                }
            }
        }
        warn!(namespace = %namespace, "All retrieval levels exhausted");
        (Vec::new(), Some(ALL_RETRIEVAL_FAILED.to_string()))
    }

    async fn cross_domain_search(
        &self,
        query: &str,
        classification: &ClassificationResult,
        top_k: usize,
    ) -> (Vec<ScoredChunk>, Option<String>) {
        let weights = CrossDomainRetrieval::calculate_domain_weights(classification);
        match self
            .cross_domain
            .search_across(query, top_k, Some(weights), self.retrieval_cfg.alpha)
            .await
        {
            Ok(results) if !results.is_empty() => (results, None),
            Ok(_) => (Vec::new(), Some(CROSS_DOMAIN_EMPTY.to_string())),
            Err(e) => {
                warn!(error = %e, "Cross-domain search failed, degrading to default domain");
                self.single_domain_search(query, DEFAULT_NAMESPACE, top_k)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(id: &str) -> ScoredChunk {
        ScoredChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            content: format!("content {}", id),
            filename: "file.md".to_string(),
            namespace: "ns".to_string(),
            score: 0.9,
        }
    }

    struct FixedClassifier {
        result: Result<(String, f32)>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(namespace: &str, confidence: f32) -> Self {
            Self {
                result: Ok((namespace.to_string(), confidence)),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err(Error::Classification("llm down".to_string())),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _query: &str,
            _ctx: &ClassifyContext,
        ) -> Result<ClassificationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok((namespace, confidence)) => Ok(ClassificationResult {
                    namespace: namespace.clone(),
                    display_name: namespace.clone(),
                    confidence: *confidence,
                    method: "keyword".to_string(),
                    reasoning: None,
                    alternatives: Vec::new(),
                    fallback_to_cross_domain: *confidence < 0.5,
                    metadata: serde_json::Map::new(),
                }),
                Err(_) => Err(Error::Classification("llm down".to_string())),
            }
        }
    }

    struct MockStrategy {
        name: String,
        outcome: Result<Vec<ScoredChunk>>,
        attempts: Arc<AtomicUsize>,
    }

    impl MockStrategy {
        fn new(name: &str, outcome: Result<Vec<ScoredChunk>>, attempts: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                outcome,
                attempts,
            }
        }
    }

    #[async_trait]
    impl RetrievalStrategy for MockStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(
            &self,
            _query: &str,
            _namespace: &str,
            _top_k: usize,
        ) -> Result<Vec<ScoredChunk>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(chunks) => Ok(chunks.clone()),
                Err(_) => Err(Error::Retrieval("level failed".to_string())),
            }
        }
    }

    struct MockCross {
        outcome: Result<Vec<ScoredChunk>>,
    }

    #[async_trait]
    impl CrossDomainSearch for MockCross {
        async fn search_across(
            &self,
            _query: &str,
            _top_k: usize,
            _domain_weights: Option<HashMap<String, f32>>,
            _alpha: f32,
        ) -> Result<Vec<ScoredChunk>> {
            match &self.outcome {
                Ok(chunks) => Ok(chunks.clone()),
                Err(_) => Err(Error::Retrieval("cross failed".to_string())),
            }
        }
    }

    struct NullSink;

    #[async_trait]
    impl QueryLogSink for NullSink {
        async fn log_query(&self, _entry: &QueryLogEntry) -> Result<()> {
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl QueryLogSink for FailingSink {
        async fn log_query(&self, _entry: &QueryLogEntry) -> Result<()> {
            Err(Error::Database(sqlx::Error::PoolClosed))
        }
    }

    fn orchestrator(
        classifier: Arc<dyn Classifier>,
        strategies: Vec<Arc<dyn RetrievalStrategy>>,
        cross: MockCross,
        sink: Arc<dyn QueryLogSink>,
    ) -> ChatOrchestrator {
        ChatOrchestrator::new(
            classifier,
            None,
            strategies,
            Arc::new(cross),
            sink,
            ClassifyConfig::default(),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_degradation_exhausts_all_levels_then_reports_marker() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![
            Arc::new(MockStrategy::new(
                "混合检索",
                Err(Error::Retrieval("down".to_string())),
                attempts.clone(),
            )),
            Arc::new(MockStrategy::new("向量检索", Ok(Vec::new()), attempts.clone())),
            Arc::new(MockStrategy::new(
                "BM25检索",
                Err(Error::Retrieval("down".to_string())),
                attempts.clone(),
            )),
        ];
        let orch = orchestrator(
            Arc::new(FixedClassifier::new("billing", 0.9)),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "发票".to_string(),
                ..Default::default()
            })
            .await;

        assert!(response.sources.is_empty());
        assert_eq!(
            response.metadata["error"].as_str(),
            Some(ALL_RETRIEVAL_FAILED)
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_degraded_level_reports_marker() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![
            Arc::new(MockStrategy::new("混合检索", Ok(Vec::new()), attempts.clone())),
            Arc::new(MockStrategy::new(
                "向量检索",
                Ok(vec![chunk("a")]),
                attempts.clone(),
            )),
        ];
        let orch = orchestrator(
            Arc::new(FixedClassifier::new("billing", 0.9)),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "发票".to_string(),
                ..Default::default()
            })
            .await;

        assert_eq!(response.sources.len(), 1);
        assert_eq!(
            response.metadata["error"].as_str(),
            Some("降级到向量检索")
        );
    }

    #[tokio::test]
    async fn test_domain_inheritance_on_weak_classification() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![Arc::new(MockStrategy::new(
            "混合检索",
            Ok(vec![chunk("a")]),
            attempts.clone(),
        ))];
        let orch = orchestrator(
            Arc::new(FixedClassifier::new("other_domain", 0.4)),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "他的技术栈是什么".to_string(),
                previous_domain: Some("job_doc".to_string()),
                ..Default::default()
            })
            .await;

        let classification = &response.metadata["classification"];
        assert_eq!(classification["namespace"].as_str(), Some("job_doc"));
        assert!(classification["method"]
            .as_str()
            .unwrap()
            .ends_with("_inherited"));
        assert_eq!(
            classification["metadata"]["original_classification"]["namespace"].as_str(),
            Some("other_domain")
        );
        assert_eq!(
            response.metadata["session_context"]["domain_inherited"].as_bool(),
            Some(true)
        );
        // Inherited confidence 0.7 routes single-domain
        assert_eq!(
            response.metadata["retrieval_mode"].as_str(),
            Some("single_domain")
        );
    }

    #[tokio::test]
    async fn test_classifier_error_falls_back_to_previous_domain() {
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![Arc::new(MockStrategy::new(
            "混合检索",
            Ok(vec![chunk("a")]),
            Arc::new(AtomicUsize::new(0)),
        ))];
        let orch = orchestrator(
            Arc::new(FixedClassifier::failing()),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "然后呢".to_string(),
                previous_domain: Some("job_doc".to_string()),
                ..Default::default()
            })
            .await;

        let classification = &response.metadata["classification"];
        assert_eq!(classification["namespace"].as_str(), Some("job_doc"));
        assert!((classification["confidence"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_classifier_error_without_previous_uses_default_and_cross() {
        let orch = orchestrator(
            Arc::new(FixedClassifier::failing()),
            Vec::new(),
            MockCross {
                outcome: Ok(vec![chunk("x")]),
            },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "随便问问".to_string(),
                ..Default::default()
            })
            .await;

        let classification = &response.metadata["classification"];
        assert_eq!(classification["namespace"].as_str(), Some(DEFAULT_NAMESPACE));
        assert_eq!(
            response.metadata["retrieval_mode"].as_str(),
            Some("cross_domain")
        );
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_namespace_skips_classification() {
        let classifier = Arc::new(FixedClassifier::new("ignored", 0.9));
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![Arc::new(MockStrategy::new(
            "混合检索",
            Ok(vec![chunk("a")]),
            Arc::new(AtomicUsize::new(0)),
        ))];
        let orch = orchestrator(
            classifier.clone(),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "发票".to_string(),
                namespace: Some("billing".to_string()),
                ..Default::default()
            })
            .await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        let classification = &response.metadata["classification"];
        assert_eq!(classification["method"].as_str(), Some("user_specified"));
        assert_eq!(classification["namespace"].as_str(), Some("billing"));
    }

    #[tokio::test]
    async fn test_cross_domain_failure_degrades_to_default_namespace() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![Arc::new(MockStrategy::new(
            "混合检索",
            Ok(vec![chunk("a")]),
            attempts.clone(),
        ))];
        let orch = orchestrator(
            Arc::new(FixedClassifier::new("weak", 0.3)),
            strategies,
            MockCross {
                outcome: Err(Error::Retrieval("cross down".to_string())),
            },
            Arc::new(NullSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "随便问问".to_string(),
                ..Default::default()
            })
            .await;

        assert_eq!(response.sources.len(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_telemetry_failure_is_swallowed() {
        let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![Arc::new(MockStrategy::new(
            "混合检索",
            Ok(vec![chunk("a")]),
            Arc::new(AtomicUsize::new(0)),
        ))];
        let orch = orchestrator(
            Arc::new(FixedClassifier::new("billing", 0.9)),
            strategies,
            MockCross { outcome: Ok(vec![]) },
            Arc::new(FailingSink),
        );

        let response = orch
            .search_for_chat(ChatSearchRequest {
                query: "发票".to_string(),
                ..Default::default()
            })
            .await;

        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].chunk_id, "a");
        assert_eq!(response.sources[0].similarity, 0.9);
    }
}
