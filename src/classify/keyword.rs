use super::{ClassificationResult, Classifier, ClassifyContext, DomainAlternative};
use crate::classify::rules::wildcard_to_regex;
use crate::config::ClassifyConfig;
use crate::error::Result;
use crate::store::{DomainCatalog, KnowledgeDomain, RoutingRule, RuleCatalog, DEFAULT_NAMESPACE};
use async_trait::async_trait;
use regex::RegexBuilder;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Function words excluded from query tokens. Mostly Chinese since
/// English queries carry little scoring weight per word anyway.
const STOPWORDS: &[&str] = &[
    "的", "了", "是", "在", "有", "和", "就", "不", "也", "很", "都", "要", "去", "会", "着",
    "说", "看", "这", "那", "我们", "你们", "他们", "什么", "怎么", "如何", "为什么", "请问",
    "一个", "没有", "可以", "这个", "那个", "还是", "或者", "以及", "关于", "the", "an", "of",
    "to", "in", "is", "are", "how", "what", "why", "about", "for", "and",
];

/// Keyword-overlap domain classifier.
///
/// Scores each active domain by the fraction of query tokens covered by
/// its keywords, then lets routing rules raise a domain's score. No
/// network calls, so it is also the degradation target when the LLM path
/// is unavailable.
pub struct KeywordClassifier {
    domains: Arc<DomainCatalog>,
    rules: Arc<RuleCatalog>,
    cfg: ClassifyConfig,
}

impl KeywordClassifier {
    pub fn new(domains: Arc<DomainCatalog>, rules: Arc<RuleCatalog>, cfg: ClassifyConfig) -> Self {
        Self {
            domains,
            rules,
            cfg,
        }
    }

    fn score_domains(
        &self,
        query: &str,
        tokens: &HashSet<String>,
        domains: &[KnowledgeDomain],
        rules: &[RoutingRule],
    ) -> HashMap<String, f32> {
        let query_lower = query.to_lowercase();
        let mut scores: HashMap<String, f32> = HashMap::new();

        for domain in domains {
            let keywords = domain.keywords();
            if keywords.is_empty() || tokens.is_empty() {
                continue;
            }
            let matched = keywords
                .iter()
                .filter(|kw| {
                    let kw_lower = kw.to_lowercase();
                    tokens.contains(&kw_lower) || query_lower.contains(&kw_lower)
                })
                .count();
            if matched > 0 {
                let score = (matched as f32 / tokens.len() as f32).min(1.0);
                scores.insert(domain.namespace.clone(), score);
            }
        }

        for rule in rules {
            if let Some(boost) = rule_boost(rule, &query_lower) {
                let entry = scores.entry(rule.target_namespace.clone()).or_insert(0.0);
                *entry = entry.max(boost);
            }
        }

        scores
    }
}

/// Rule contribution to a domain's score: keyword rules give the matched
/// fraction of their keywords, pattern rules give a flat 0.9 on match.
fn rule_boost(rule: &RoutingRule, query_lower: &str) -> Option<f32> {
    match rule.rule_type.as_str() {
        "keyword" => {
            let keywords: Vec<&str> = rule
                .pattern
                .split('|')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .collect();
            if keywords.is_empty() {
                return None;
            }
            let matched = keywords
                .iter()
                .filter(|k| query_lower.contains(&k.to_lowercase()))
                .count();
            (matched > 0).then(|| matched as f32 / keywords.len() as f32)
        }
        "regex" | "wildcard" => {
            let pattern = if rule.rule_type == "wildcard" {
                wildcard_to_regex(&rule.pattern)
            } else {
                rule.pattern.clone()
            };
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(regex) => regex.is_match(query_lower).then_some(0.9),
                Err(e) => {
                    warn!(rule = %rule.rule_name, error = %e, "Skipping rule with invalid pattern");
                    None
                }
            }
        }
        other => {
            warn!(rule = %rule.rule_name, rule_type = %other, "Skipping rule with unknown type");
            None
        }
    }
}

/// Tokenize a query into lowercased English words and CJK n-grams of
/// length 2 to 4, with stopwords removed.
pub fn tokenize_query(query: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut ascii_run = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let mut flush_ascii = |run: &mut String, tokens: &mut HashSet<String>| {
        if run.chars().count() > 1 {
            tokens.insert(run.to_lowercase());
        }
        run.clear();
    };
    let mut flush_cjk = |run: &mut Vec<char>, tokens: &mut HashSet<String>| {
        for n in 2..=4usize {
            for gram in run.windows(n) {
                tokens.insert(gram.iter().collect());
            }
        }
        run.clear();
    };

    for c in query.chars() {
        if c.is_ascii_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            ascii_run.push(c);
        } else if matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}') {
            flush_ascii(&mut ascii_run, &mut tokens);
            cjk_run.push(c);
        } else {
            flush_ascii(&mut ascii_run, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_ascii(&mut ascii_run, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    for stopword in STOPWORDS {
        tokens.remove(*stopword);
    }
    tokens
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, query: &str, _ctx: &ClassifyContext) -> Result<ClassificationResult> {
        let domains = self.domains.active().await?;
        let rules = self.rules.active().await?;
        let tokens = tokenize_query(query);
        let scores = self.score_domains(query, &tokens, &domains, &rules);

        let display_names: HashMap<&str, &str> = domains
            .iter()
            .map(|d| (d.namespace.as_str(), d.display_name.as_str()))
            .collect();
        let display_for = |namespace: &str| -> String {
            display_names
                .get(namespace)
                .map(|n| n.to_string())
                .unwrap_or_else(|| namespace.to_string())
        };

        let mut ranked: Vec<(&String, &f32)> = scores.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((best_namespace, best_score)) = ranked.first().map(|(ns, s)| (*ns, **s)) else {
            return Ok(ClassificationResult {
                namespace: DEFAULT_NAMESPACE.to_string(),
                display_name: display_for(DEFAULT_NAMESPACE),
                confidence: self.cfg.default_confidence,
                method: "keyword".to_string(),
                reasoning: Some("no keyword overlap with any domain".to_string()),
                alternatives: Vec::new(),
                fallback_to_cross_domain: true,
                metadata: serde_json::Map::new(),
            });
        };

        let alternatives = ranked
            .iter()
            .skip(1)
            .take(3)
            .map(|(ns, score)| DomainAlternative {
                namespace: (*ns).clone(),
                display_name: display_for(ns),
                confidence: **score,
            })
            .collect();

        Ok(ClassificationResult {
            namespace: best_namespace.clone(),
            display_name: display_for(best_namespace),
            confidence: best_score.min(1.0),
            method: "keyword".to_string(),
            reasoning: None,
            alternatives,
            fallback_to_cross_domain: best_score < self.cfg.keyword_fallback_threshold,
            metadata: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        store.ensure_default_domain().await.unwrap();
        (dir, store)
    }

    fn classifier(store: &Store) -> KeywordClassifier {
        KeywordClassifier::new(
            Arc::new(DomainCatalog::new(store.clone(), Duration::from_secs(300))),
            Arc::new(RuleCatalog::new(store.clone(), Duration::from_secs(300))),
            ClassifyConfig::default(),
        )
    }

    #[test]
    fn test_tokenize_mixed_query() {
        let tokens = tokenize_query("API密钥配置");
        assert!(tokens.contains("api"));
        assert!(tokens.contains("密钥"));
        assert!(tokens.contains("配置"));
        assert!(tokens.contains("密钥配置"));
    }

    #[test]
    fn test_tokenize_removes_stopwords() {
        let tokens = tokenize_query("如何退货");
        assert!(!tokens.contains("如何"));
        assert!(tokens.contains("退货"));
    }

    #[tokio::test]
    async fn test_keyword_overlap_picks_matching_domain() {
        let (_dir, store) = test_store().await;
        store
            .insert_domain(&KnowledgeDomain::new(
                "technical_docs",
                "Technical Docs",
                vec!["API".to_string(), "SDK".to_string()],
            ))
            .await
            .unwrap();
        store
            .insert_domain(&KnowledgeDomain::new(
                "product_support",
                "Product Support",
                vec!["退货".to_string(), "保修".to_string()],
            ))
            .await
            .unwrap();

        let result = classifier(&store)
            .classify("API密钥配置", &ClassifyContext::default())
            .await
            .unwrap();

        assert_eq!(result.namespace, "technical_docs");
        assert!(result.confidence > 0.0);
        assert_eq!(result.method, "keyword");
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_default() {
        let (_dir, store) = test_store().await;
        store
            .insert_domain(&KnowledgeDomain::new(
                "billing",
                "Billing",
                vec!["发票".to_string()],
            ))
            .await
            .unwrap();

        let result = classifier(&store)
            .classify("今天天气怎么样", &ClassifyContext::default())
            .await
            .unwrap();

        assert_eq!(result.namespace, DEFAULT_NAMESPACE);
        assert_eq!(result.confidence, 0.3);
        assert!(result.fallback_to_cross_domain);
    }

    #[tokio::test]
    async fn test_routing_rule_raises_domain_score() {
        let (_dir, store) = test_store().await;
        store
            .insert_domain(&KnowledgeDomain::new(
                "billing",
                "Billing",
                vec!["发票".to_string()],
            ))
            .await
            .unwrap();
        store
            .insert_rule(&RoutingRule::new(
                "invoice-regex",
                "regex",
                r"发票|开票",
                "billing",
                100,
            ))
            .await
            .unwrap();

        let result = classifier(&store)
            .classify("帮我开票", &ClassifyContext::default())
            .await
            .unwrap();

        assert_eq!(result.namespace, "billing");
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert!(!result.fallback_to_cross_domain);
    }

    #[tokio::test]
    async fn test_uppercase_regex_rule_matches_lowercase_query() {
        let (_dir, store) = test_store().await;
        store
            .insert_domain(&KnowledgeDomain::new(
                "technical_docs",
                "Technical Docs",
                vec!["SDK".to_string()],
            ))
            .await
            .unwrap();
        store
            .insert_rule(&RoutingRule::new(
                "api-key",
                "regex",
                r"API\s*key",
                "technical_docs",
                100,
            ))
            .await
            .unwrap();

        let result = classifier(&store)
            .classify("rotate my api key", &ClassifyContext::default())
            .await
            .unwrap();

        assert_eq!(result.namespace, "technical_docs");
        assert!((result.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_weak_match_sets_cross_domain_fallback() {
        let (_dir, store) = test_store().await;
        store
            .insert_domain(&KnowledgeDomain::new(
                "technical_docs",
                "Technical Docs",
                vec!["API".to_string()],
            ))
            .await
            .unwrap();

        // Long query, one matching token: score well under 0.5
        let result = classifier(&store)
            .classify("请问调用API的时候出现错误应该怎么排查问题", &ClassifyContext::default())
            .await
            .unwrap();

        assert_eq!(result.namespace, "technical_docs");
        assert!(result.fallback_to_cross_domain);
    }
}
