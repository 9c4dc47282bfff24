//! Show command implementation.

use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, branch: &str, handle: &str) -> Result<(), Box<dyn std::error::Error>> {
    let service = super::open(path, branch)?;
    let revision = service.revision(handle)?;

    println!("revision {}", revision.handle);
    match &revision.parent {
        Some(parent) => println!("parent   {parent}"),
        None => println!("parent   (none)"),
    }
    println!("sequence {}", revision.sequence);
    println!("date     {}", revision.timestamp.to_rfc3339());
    println!("author   {}", revision.author);
    println!("content  sha256:{}", revision.content_digest);
    println!();
    println!("    {}", revision.message);
    Ok(())
}
