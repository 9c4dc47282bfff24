//! Log command implementation.

use crate::Format;
use docvault_core::Revision;
use std::path::Path;

/// Runs the log command.
pub fn run(
    path: &Path,
    branch: &str,
    limit: Option<usize>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = super::open(path, branch)?;
    let revisions = service.history(limit.unwrap_or(usize::MAX));

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&revisions)?),
        Format::Text => {
            if revisions.is_empty() {
                println!("No revisions on branch '{branch}'");
            }
            for revision in &revisions {
                println!("{}", one_line(revision));
            }
        }
    }
    Ok(())
}

/// Formats a revision as `<short handle> <time> <author>: <message>`.
pub fn one_line(revision: &Revision) -> String {
    format!(
        "{} {} {}: {}",
        revision.handle.short(),
        revision.timestamp.format("%Y-%m-%d %H:%M:%S"),
        revision.author,
        revision.message
    )
}
