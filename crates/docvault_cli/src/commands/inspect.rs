//! Inspect command implementation.

use crate::Format;
use serde::Serialize;
use std::path::Path;

/// Vault inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Vault root.
    pub path: String,
    /// Branch that was read.
    pub branch: String,
    /// All branches with a journal.
    pub branches: Vec<String>,
    /// Working document path.
    pub document_path: String,
    /// Working document size in bytes, if it exists.
    pub document_size: Option<u64>,
    /// Number of revisions on the branch.
    pub revisions: usize,
    /// Head handle.
    pub head: Option<String>,
    /// Head commit message.
    pub head_message: Option<String>,
    /// Contention policy the vault is opened with.
    pub lock_policy: String,
}

/// Collects the inspection result.
pub fn inspect(path: &Path, branch: &str) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let service = super::open(path, branch)?;
    let status = service.status();
    let document_size = std::fs::metadata(&status.document_path)
        .ok()
        .map(|meta| meta.len());

    Ok(InspectResult {
        path: status.root.display().to_string(),
        branch: status.branch,
        branches: service.branches()?,
        document_path: status.document_path.display().to_string(),
        document_size,
        revisions: status.revisions,
        head: status.head.as_ref().map(|head| head.handle.to_string()),
        head_message: status.head.map(|head| head.message),
        lock_policy: format!("{:?}", status.lock_policy),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, branch: &str, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, branch)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => {
            println!("Vault: {}", result.path);
            println!("Branch: {} (of {})", result.branch, result.branches.join(", "));
            println!("Document: {}", result.document_path);
            match result.document_size {
                Some(size) => println!("  size: {size} bytes"),
                None => println!("  (not saved yet)"),
            }
            println!("Revisions: {}", result.revisions);
            println!("Lock policy: {}", result.lock_policy);
            if let (Some(head), Some(message)) = (&result.head, &result.head_message) {
                println!("Head: {head}");
                println!("  {message}");
            }
        }
    }
    Ok(())
}
