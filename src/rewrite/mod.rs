//! Query rewriting for multi-turn chat
//!
//! Follow-up queries often lean on pronouns or are bare confirmations of
//! the assistant's last question. The rewriter expands them into
//! standalone queries using recent chat history, and degrades to the
//! original query on any failure.

use crate::config::RewriteConfig;
use crate::error::Result;
use crate::llm::{strip_code_fences, ChatMessage, LlmClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Replies that are answers to the assistant rather than standalone
/// queries and always need history to make sense.
const CONFIRMATION_PHRASES: &[&str] = &[
    "是的", "对", "可以", "不用", "好", "嗯", "继续", "还有吗", "然后呢", "接着", "下一个",
];

const REWRITE_SYSTEM_PROMPT: &str = "You rewrite follow-up queries from a multi-turn \
conversation into standalone queries suitable for knowledge base retrieval. Resolve \
pronouns and expand confirmations using the history, preserve the intent, and do not \
over-expand. Respond with strict JSON only: \
{\"rewritten_query\": \"...\", \"was_rewritten\": true/false, \"reasoning\": \"...\"}";

const MAX_HISTORY_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct RewriteVerdict {
    rewritten_query: String,
    #[serde(default)]
    was_rewritten: bool,
    #[serde(default)]
    reasoning: Option<String>,
}

pub struct QueryRewriter {
    llm: Arc<dyn LlmClient>,
    cfg: RewriteConfig,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: RewriteConfig) -> Self {
        Self { llm, cfg }
    }

    /// Rewrite a query using recent chat history. Returns the query to
    /// retrieve with and whether it was rewritten. Never fails: any LLM
    /// or parse error falls back to the original query.
    pub async fn rewrite_with_context(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
    ) -> (String, bool) {
        if !self.cfg.enabled {
            return (query.to_string(), false);
        }
        if query.chars().count() > 20 && looks_complete(query) {
            debug!("Query looks complete, skipping rewrite");
            return (query.to_string(), false);
        }

        let window = self.cfg.max_history * 2;
        let recent = if chat_history.len() > window {
            &chat_history[chat_history.len() - window..]
        } else {
            chat_history
        };
        if recent.is_empty() {
            return (query.to_string(), false);
        }

        match self.call_llm(query, recent).await {
            Ok(verdict) => {
                if verdict.was_rewritten {
                    info!(
                        original = %query,
                        rewritten = %verdict.rewritten_query,
                        reasoning = verdict.reasoning.as_deref().unwrap_or(""),
                        "Query rewritten"
                    );
                    (verdict.rewritten_query, true)
                } else {
                    (query.to_string(), false)
                }
            }
            Err(e) => {
                warn!(error = %e, "Query rewrite failed, using original query");
                (query.to_string(), false)
            }
        }
    }

    async fn call_llm(&self, query: &str, history: &[ChatMessage]) -> Result<RewriteVerdict> {
        let prompt = format!(
            "Conversation history:\n{}\n\nCurrent query: \"{}\"\n\n\
             Rewrite the current query so it can be understood without the history. \
             If it is already standalone, return it unchanged with was_rewritten=false.",
            format_history(history),
            query
        );
        let messages = vec![
            ChatMessage::system(REWRITE_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let completion = self.llm.complete(messages, 0.3, 300).await?;
        let body = strip_code_fences(&completion.content);
        let verdict: RewriteVerdict = serde_json::from_str(body).map_err(|e| {
            crate::error::Error::Llm(format!("unparseable rewrite response: {}", e))
        })?;
        Ok(verdict)
    }
}

fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|msg| {
            let content: String = if msg.content.chars().count() > MAX_HISTORY_MESSAGE_CHARS {
                let truncated: String = msg.content.chars().take(MAX_HISTORY_MESSAGE_CHARS).collect();
                format!("{}...", truncated)
            } else {
                msg.content.clone()
            };
            format!("{}: {}", msg.role, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Heuristic for queries that do not need rewriting. Deliberately
/// conservative: short queries and known confirmation replies are always
/// treated as incomplete.
pub fn looks_complete(query: &str) -> bool {
    let chars = query.chars().count();
    if chars < 10 {
        return false;
    }
    if CONFIRMATION_PHRASES.contains(&query.trim()) {
        return false;
    }
    if chars > 15 && (query.contains('?') || query.contains('？') || query.contains('。')) {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use async_trait::async_trait;

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

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("张建红的到岗时间是什么时候?"),
            ChatMessage {
                role: "assistant".to_string(),
                content: "一周内到岗。需要他的技能详情吗?".to_string(),
            },
        ]
    }

    #[test]
    fn test_looks_complete_heuristics() {
        assert!(!looks_complete("是的"));
        assert!(!looks_complete("短查询"));
        assert!(looks_complete("FastAPI的依赖注入机制是如何工作的?"));
        // Long enough but no sentence punctuation
        assert!(!looks_complete("关于依赖注入机制的一些说明文档"));
    }

    #[tokio::test]
    async fn test_rewrites_confirmation_reply() {
        let rewriter = QueryRewriter::new(
            Arc::new(CannedLlm(Ok(
                r#"{"rewritten_query": "请提供张建红的技能详情", "was_rewritten": true, "reasoning": "确认回复"}"#
                    .to_string(),
            ))),
            RewriteConfig::default(),
        );

        let (query, rewritten) = rewriter.rewrite_with_context("是的", &history()).await;
        assert!(rewritten);
        assert_eq!(query, "请提供张建红的技能详情");
    }

    #[tokio::test]
    async fn test_no_history_returns_original() {
        let rewriter = QueryRewriter::new(
            Arc::new(CannedLlm(Ok("unused".to_string()))),
            RewriteConfig::default(),
        );

        let (query, rewritten) = rewriter.rewrite_with_context("是的", &[]).await;
        assert!(!rewritten);
        assert_eq!(query, "是的");
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_original() {
        let rewriter = QueryRewriter::new(
            Arc::new(CannedLlm(Err(crate::error::Error::Llm("down".to_string())))),
            RewriteConfig::default(),
        );

        let (query, rewritten) = rewriter.rewrite_with_context("是的", &history()).await;
        assert!(!rewritten);
        assert_eq!(query, "是的");
    }

    #[tokio::test]
    async fn test_complete_query_skips_llm() {
        // LLM would fail if called; the long punctuated query never reaches it
        let rewriter = QueryRewriter::new(
            Arc::new(CannedLlm(Err(crate::error::Error::Llm("down".to_string())))),
            RewriteConfig::default(),
        );

        let query = "在多租户部署下如何为每个租户单独配置检索参数?";
        let (out, rewritten) = rewriter.rewrite_with_context(query, &history()).await;
        assert!(!rewritten);
        assert_eq!(out, query);
    }

    #[tokio::test]
    async fn test_disabled_rewriter_is_passthrough() {
        let rewriter = QueryRewriter::new(
            Arc::new(CannedLlm(Ok("unused".to_string()))),
            RewriteConfig {
                enabled: false,
                max_history: 5,
            },
        );

        let (query, rewritten) = rewriter.rewrite_with_context("是的", &history()).await;
        assert!(!rewritten);
        assert_eq!(query, "是的");
    }
}
