//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::index::{ChangeDetector, ChangeSummary};
use crate::store::{GlobalStats, Store};
use serde::Serialize;

/// Per-domain counts
#[derive(Debug, Serialize)]
pub struct DomainStatus {
    pub namespace: String,
    pub display_name: String,
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}

/// Full system status
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub config_file: String,
    pub db_file: String,
    pub stats: GlobalStats,
    pub domains: Vec<DomainStatus>,
    pub pending: ChangeSummary,
}

/// Collect system status
pub async fn cmd_status(config: &Config, store: &Store) -> Result<StatusReport> {
    let stats = store.get_global_stats().await?;

    let mut domains = Vec::new();
    for domain in store.list_domains(false).await? {
        let ns = domain.namespace.as_str();
        domains.push(DomainStatus {
            documents: store.list_documents(Some(ns)).await?.len(),
            chunks: store.count_chunks(Some(ns)).await?,
            indexed: store.list_index_records(Some(ns)).await?.len(),
            namespace: domain.namespace,
            display_name: domain.display_name,
        });
    }

    let pending = ChangeDetector::new(store.clone())
        .get_change_summary(None)
        .await?;

    Ok(StatusReport {
        config_file: config.paths.config_file.display().to_string(),
        db_file: config.paths.db_file.display().to_string(),
        stats,
        domains,
        pending,
    })
}

/// Print system status to console
pub fn print_status(report: &StatusReport) {
    println!("\narchivist status\n");
    println!("Config: {}", report.config_file);
    println!("Database: {}", report.db_file);
    println!(
        "\n{} domains, {} documents, {} chunks, {} indexed",
        report.stats.domain_count,
        report.stats.document_count,
        report.stats.chunk_count,
        report.stats.indexed_document_count
    );

    println!("\nDomains:");
    for domain in &report.domains {
        println!(
            "  {} [{}]: {} docs, {} chunks, {} indexed",
            domain.namespace, domain.display_name, domain.documents, domain.chunks, domain.indexed
        );
    }

    println!(
        "\nPending: {} new, {} modified, {} deleted",
        report.pending.new, report.pending.modified, report.pending.deleted
    );
}
