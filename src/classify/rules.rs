//! Routing rule matching
//!
//! Rules are evaluated in priority order (highest first) and the first
//! rule whose confidence clears its threshold wins, regardless of whether
//! a lower-priority rule would have scored higher.

use crate::error::{Error, Result};
use crate::store::RoutingRule;
use regex::RegexBuilder;
use serde::Serialize;

/// A winning routing rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleMatch {
    pub namespace: String,
    pub confidence: f32,
    pub rule_name: String,
}

/// Match a query against routing rules sorted by priority descending.
///
/// A rule wins when its confidence reaches both its own threshold and
/// `min_confidence`. Unknown rule types and invalid patterns are
/// configuration errors, not silent misses.
pub fn match_query(
    rules: &[RoutingRule],
    query: &str,
    min_confidence: f32,
) -> Result<Option<RuleMatch>> {
    for rule in rules {
        if !rule.is_active {
            continue;
        }
        let Some(confidence) = rule_confidence(rule, query)? else {
            continue;
        };
        let threshold = (rule.confidence_threshold as f32).max(min_confidence);
        if confidence >= threshold {
            return Ok(Some(RuleMatch {
                namespace: rule.target_namespace.clone(),
                confidence,
                rule_name: rule.rule_name.clone(),
            }));
        }
    }
    Ok(None)
}

fn rule_confidence(rule: &RoutingRule, query: &str) -> Result<Option<f32>> {
    match rule.rule_type.as_str() {
        "keyword" => Ok(keyword_confidence(&rule.pattern, query)),
        "regex" => regex_confidence(&rule.pattern, query, &rule.rule_name),
        "wildcard" => {
            let pattern = wildcard_to_regex(&rule.pattern);
            regex_confidence(&pattern, query, &rule.rule_name)
        }
        other => Err(Error::Config(format!(
            "Routing rule '{}' has unknown type '{}'",
            rule.rule_name, other
        ))),
    }
}

/// Fraction of the rule's `|`-separated keywords present in the query,
/// scaled by 1.5 and capped at 1.0.
fn keyword_confidence(pattern: &str, query: &str) -> Option<f32> {
    let query_lower = query.to_lowercase();
    let keywords: Vec<&str> = pattern
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
    if matched == 0 {
        return None;
    }
    Some((matched as f32 / keywords.len() as f32 * 1.5).min(1.0))
}

/// Confidence from the length of the case-insensitive regex match relative
/// to the query, scaled by 2.0 and capped at 1.0.
fn regex_confidence(pattern: &str, query: &str, rule_name: &str) -> Result<Option<f32>> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            Error::Config(format!(
                "Routing rule '{}' has invalid pattern: {}",
                rule_name, e
            ))
        })?;
    let Some(found) = regex.find(query) else {
        return Ok(None);
    };
    let query_chars = query.chars().count();
    if query_chars == 0 {
        return Ok(None);
    }
    let match_chars = found.as_str().chars().count();
    Ok(Some(
        (match_chars as f32 / query_chars as f32 * 2.0).min(1.0),
    ))
}

/// Convert a shell-style wildcard pattern to an anchored regex.
/// `*` matches any run of characters, `?` matches one character.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, rule_type: &str, pattern: &str, target: &str, priority: i32) -> RoutingRule {
        RoutingRule::new(name, rule_type, pattern, target, priority)
    }

    #[test]
    fn test_keyword_confidence_scales_with_matches() {
        // 1 of 2 keywords: 0.5 * 1.5 = 0.75
        let conf = keyword_confidence("退货|保修", "如何申请退货").unwrap();
        assert!((conf - 0.75).abs() < 1e-6);
        // 2 of 2 keywords caps at 1.0
        let conf = keyword_confidence("退货|保修", "退货和保修政策").unwrap();
        assert_eq!(conf, 1.0);
    }

    #[test]
    fn test_priority_order_beats_raw_confidence() {
        let rules = vec![
            rule("billing", "keyword", "发票|账单|付款", "billing", 100),
            rule("support", "keyword", "发票", "product_support", 10),
        ];
        // Both rules match; the lower-confidence high-priority rule wins
        let m = match_query(&rules, "发票怎么开", 0.0).unwrap().unwrap();
        assert_eq!(m.namespace, "billing");
        assert_eq!(m.rule_name, "billing");
    }

    #[test]
    fn test_rule_threshold_gates_weak_matches() {
        let mut weak = rule("weak", "keyword", "a1|b2|c3|d4|e5", "ns", 100);
        weak.confidence_threshold = 0.9;
        let rules = vec![weak, rule("broad", "keyword", "a1", "other", 1)];

        // 1/5 keywords gives 0.3, below the first rule's own threshold,
        // so matching falls through to the next rule
        let m = match_query(&rules, "tell me about a1", 0.0).unwrap().unwrap();
        assert_eq!(m.namespace, "other");
    }

    #[test]
    fn test_wildcard_is_anchored() {
        assert_eq!(wildcard_to_regex("如何*"), "^如何.*$");

        let rules = vec![rule("howto", "wildcard", "如何*", "guides", 1)];
        let m = match_query(&rules, "如何重置密码", 0.0).unwrap();
        assert!(m.is_some());
        // Pattern must cover the whole query, not a substring
        let miss = match_query(&rules, "请问如何重置", 0.0).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_regex_matches_case_insensitively() {
        let rules = vec![rule("apikey", "regex", r"API\s*key", "technical_docs", 1)];
        let m = match_query(&rules, "how do i rotate my api key", 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(m.namespace, "technical_docs");
    }

    #[test]
    fn test_regex_confidence_relative_to_query_length() {
        let rules = vec![rule("order", "regex", r"订单\d+", "orders", 1)];
        let m = match_query(&rules, "订单12345", 0.0).unwrap().unwrap();
        assert_eq!(m.confidence, 1.0);
    }

    #[test]
    fn test_unknown_rule_type_is_config_error() {
        let rules = vec![rule("bad", "fuzzy", "whatever", "ns", 1)];
        let result = match_query(&rules, "query", 0.0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let mut inactive = rule("off", "keyword", "发票", "billing", 100);
        inactive.is_active = false;
        let rules = vec![inactive];
        assert!(match_query(&rules, "发票", 0.0).unwrap().is_none());
    }
}
