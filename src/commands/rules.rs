//! Routing rule management commands

use crate::classify::rules::{match_query, wildcard_to_regex, RuleMatch};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{RoutingRule, Store};
use regex::Regex;
use tracing::info;

/// Parameters for registering a routing rule
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub rule_name: String,
    /// "keyword", "regex", or "wildcard"
    pub rule_type: String,
    pub pattern: String,
    pub target_namespace: String,
    pub priority: i32,
    pub confidence_threshold: Option<f64>,
}

/// Register a routing rule after validating its type and pattern
pub async fn cmd_add_rule(store: &Store, spec: RuleSpec) -> Result<()> {
    if store.get_domain(&spec.target_namespace).await?.is_none() {
        return Err(Error::DomainNotFound(spec.target_namespace));
    }

    match spec.rule_type.as_str() {
        "keyword" => {
            if spec.pattern.split('|').all(|k| k.trim().is_empty()) {
                return Err(Error::Config(
                    "Keyword pattern must contain at least one keyword".to_string(),
                ));
            }
        }
        "regex" => {
            Regex::new(&spec.pattern)
                .map_err(|e| Error::Config(format!("Invalid regex pattern: {}", e)))?;
        }
        "wildcard" => {
            Regex::new(&wildcard_to_regex(&spec.pattern))
                .map_err(|e| Error::Config(format!("Invalid wildcard pattern: {}", e)))?;
        }
        other => {
            return Err(Error::Config(format!(
                "Unknown rule type '{}': expected keyword, regex, or wildcard",
                other
            )))
        }
    }

    let mut rule = RoutingRule::new(
        spec.rule_name,
        spec.rule_type,
        spec.pattern,
        spec.target_namespace,
        spec.priority,
    );
    if let Some(threshold) = spec.confidence_threshold {
        rule.confidence_threshold = threshold;
    }

    store.insert_rule(&rule).await?;
    info!("Registered rule '{}'", rule.rule_name);
    println!("✓ Rule '{}' registered ({})", rule.rule_name, rule.id);
    Ok(())
}

/// List routing rules, optionally including inactive ones
pub async fn cmd_list_rules(store: &Store, all: bool) -> Result<Vec<RoutingRule>> {
    store.list_rules(!all).await
}

/// Remove a routing rule by id
pub async fn cmd_remove_rule(store: &Store, id: &str) -> Result<()> {
    store.delete_rule(id).await?;
    println!("✓ Rule {} removed", id);
    Ok(())
}

/// Dry-run a query against the routing rules
pub async fn cmd_test_route(
    store: &Store,
    config: &Config,
    query: &str,
) -> Result<Option<RuleMatch>> {
    let rules = store.list_rules(true).await?;
    match_query(&rules, query, config.classify.route_threshold)
}

/// Print routing rules to console
pub fn print_rules(rules: &[RoutingRule]) {
    println!("\n{} rules:\n", rules.len());
    for rule in rules {
        let active = if rule.is_active { "" } else { " (inactive)" };
        println!(
            "  [{}] {} ({}){} -> {} priority={} threshold={:.2}",
            rule.id,
            rule.rule_name,
            rule.rule_type,
            active,
            rule.target_namespace,
            rule.priority,
            rule.confidence_threshold
        );
        println!("    pattern: {}", rule.pattern);
    }
}

/// Print a routing dry-run result to console
pub fn print_route(query: &str, matched: &Option<RuleMatch>) {
    match matched {
        Some(m) => println!(
            "\n'{}' routes to '{}' via rule '{}' (confidence {:.2})",
            query, m.namespace, m.rule_name, m.confidence
        ),
        None => println!("\n'{}' matches no routing rule", query),
    }
}
