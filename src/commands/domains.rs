//! Domain management commands

use crate::error::Result;
use crate::store::{KnowledgeDomain, Store};
use tracing::info;

/// Parameters for registering a domain
#[derive(Debug, Clone)]
pub struct DomainSpec {
    pub namespace: String,
    pub display_name: String,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub priority: i32,
}

/// Register a knowledge domain
pub async fn cmd_add_domain(store: &Store, spec: DomainSpec) -> Result<()> {
    let mut domain = KnowledgeDomain::new(spec.namespace, spec.display_name, spec.keywords);
    domain.description = spec.description;
    domain.priority = spec.priority;

    store.insert_domain(&domain).await?;
    info!("Registered domain '{}'", domain.namespace);
    println!("✓ Domain '{}' registered", domain.namespace);
    Ok(())
}

/// List domains, optionally including inactive ones
pub async fn cmd_list_domains(store: &Store, all: bool) -> Result<Vec<KnowledgeDomain>> {
    store.list_domains(!all).await
}

/// Remove a domain (the default domain is protected)
pub async fn cmd_remove_domain(store: &Store, namespace: &str) -> Result<()> {
    store.delete_domain(namespace).await?;
    println!("✓ Domain '{}' removed", namespace);
    Ok(())
}

/// Print domains to console
pub fn print_domains(domains: &[KnowledgeDomain]) {
    println!("\n{} domains:\n", domains.len());
    for domain in domains {
        let active = if domain.is_active { "" } else { " (inactive)" };
        println!(
            "  {} [{}]{} priority={}",
            domain.namespace, domain.display_name, active, domain.priority
        );
        if let Some(description) = &domain.description {
            println!("    {}", description);
        }
        let keywords = domain.keywords();
        if !keywords.is_empty() {
            println!("    keywords: {}", keywords.join(", "));
        }
    }
}
