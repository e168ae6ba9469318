//! Add command implementation
//!
//! Registers documents in a domain. Adding only stores content; the
//! index command decides what actually needs (re)embedding.

use crate::error::{Error, Result};
use crate::store::{Document, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Statistics from an add run
#[derive(Debug, Default, Serialize)]
pub struct AddStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Add a single file to a domain
pub async fn cmd_add_file(store: &Store, path: &Path, namespace: &str) -> Result<AddStats> {
    ensure_domain(store, namespace).await?;
    let mut stats = AddStats::default();
    add_one(store, path, namespace, &mut stats).await;
    Ok(stats)
}

/// Add every text file under a directory to a domain
pub async fn cmd_add_dir(store: &Store, path: &Path, namespace: &str) -> Result<AddStats> {
    ensure_domain(store, namespace).await?;

    let canonical = path
        .canonicalize()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Adding directory: {}", canonical.display());

    let mut stats = AddStats::default();
    for entry in WalkDir::new(&canonical)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Walk error: {}", e);
                stats.errors.push(e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        add_one(store, entry.path(), namespace, &mut stats).await;
    }

    info!(
        "Add complete: {} added, {} updated, {} unchanged, {} skipped",
        stats.added, stats.updated, stats.unchanged, stats.skipped
    );
    Ok(stats)
}

async fn ensure_domain(store: &Store, namespace: &str) -> Result<()> {
    if store.get_domain(namespace).await?.is_none() {
        return Err(Error::DomainNotFound(namespace.to_string()));
    }
    Ok(())
}

async fn add_one(store: &Store, path: &Path, namespace: &str, stats: &mut AddStats) {
    match process_file(store, path, namespace).await {
        Ok(AddOutcome::Added) => stats.added += 1,
        Ok(AddOutcome::Updated) => stats.updated += 1,
        Ok(AddOutcome::Unchanged) => stats.unchanged += 1,
        Ok(AddOutcome::Skipped) => stats.skipped += 1,
        Err(e) => {
            let msg = format!("{}: {}", path.display(), e);
            warn!("{}", msg);
            stats.errors.push(msg);
        }
    }
}

enum AddOutcome {
    Added,
    Updated,
    Unchanged,
    Skipped,
}

async fn process_file(store: &Store, path: &Path, namespace: &str) -> Result<AddOutcome> {
    let bytes = std::fs::read(path)?;
    if is_binary_content(&bytes) {
        debug!("Skipping binary file: {}", path.display());
        return Ok(AddOutcome::Skipped);
    }
    let content = String::from_utf8_lossy(&bytes).to_string();
    let filename = path.display().to_string();
    let modified_at = file_modified_at(path);

    match store.find_document(namespace, &filename).await? {
        Some(existing) if existing.content == content => {
            debug!("Unchanged: {}", filename);
            Ok(AddOutcome::Unchanged)
        }
        Some(existing) => {
            store
                .update_document_content(&existing.id, &content, modified_at.as_deref())
                .await?;
            debug!("Updated: {}", filename);
            Ok(AddOutcome::Updated)
        }
        None => {
            let mut doc = Document::new(namespace, filename.as_str(), content);
            doc.file_modified_at = modified_at;
            store.insert_document(&doc).await?;
            debug!("Added: {}", filename);
            Ok(AddOutcome::Added)
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// A NUL byte in the leading bytes marks the file as binary
fn is_binary_content(bytes: &[u8]) -> bool {
    bytes.iter().take(8000).any(|&b| b == 0)
}

fn file_modified_at(path: &Path) -> Option<String> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_store(dir: &TempDir) -> Store {
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        store.ensure_default_domain().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_dir_then_readd_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir).await;

        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "发票如何开具").unwrap();
        std::fs::write(docs.join("b.md"), "API usage guide").unwrap();

        let first = cmd_add_dir(&store, &docs, "default").await.unwrap();
        assert_eq!(first.added, 2);

        let second = cmd_add_dir(&store, &docs, "default").await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.unchanged, 2);

        std::fs::write(docs.join("a.md"), "发票如何作废").unwrap();
        let third = cmd_add_dir(&store, &docs, "default").await.unwrap();
        assert_eq!(third.updated, 1);
        assert_eq!(third.unchanged, 1);
    }

    #[tokio::test]
    async fn test_add_skips_binary_and_hidden() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir).await;

        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(docs.join(".hidden.md"), "secret").unwrap();
        std::fs::write(docs.join("ok.md"), "visible").unwrap();

        let stats = cmd_add_dir(&store, &docs, "default").await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.skipped, 1);

        let docs_in_store = store.list_documents(Some("default")).await.unwrap();
        assert_eq!(docs_in_store.len(), 1);
        assert!(docs_in_store[0].filename.ends_with("ok.md"));
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_domain() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir).await;
        let file = dir.path().join("doc.md");
        std::fs::write(&file, "content").unwrap();

        let result = cmd_add_file(&store, &file, "no_such_domain").await;
        assert!(matches!(result, Err(Error::DomainNotFound(_))));
    }
}
