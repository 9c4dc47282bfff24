//! Verify command implementation.

use docvault_core::VerifyReport;
use std::path::Path;

/// Runs the verify command.
///
/// Opening the vault replays the journal and checks checksums, the parent
/// chain and every handle; this then compares head with the working file.
pub fn run(path: &Path, branch: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying vault at {}", path.display());
    println!();

    let service = match super::open(path, branch) {
        Ok(service) => service,
        Err(err) => {
            println!("✗ Journal check failed: {err}");
            return Err("Verification failed".into());
        }
    };

    let report = service.verify()?;
    print_report(&report, service.head().map(|head| head.content_digest.to_string()));

    println!();
    if report.head_matches_working {
        println!("✓ Vault verification passed");
        Ok(())
    } else {
        println!("✗ Vault verification failed: head does not tag the working document");
        Err("Verification failed".into())
    }
}

fn print_report(report: &VerifyReport, head_digest: Option<String>) {
    println!("Journal: {} revisions, chain intact", report.revisions);
    println!(
        "  head digest:    {}",
        head_digest.as_deref().unwrap_or("(no revisions)")
    );
    println!(
        "  working digest: {}",
        report
            .working_digest
            .as_ref()
            .map_or("(no document)".to_string(), ToString::to_string)
    );
}
