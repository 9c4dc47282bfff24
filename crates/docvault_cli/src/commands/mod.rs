//! CLI command implementations.

pub mod inspect;
pub mod log;
pub mod show;
pub mod verify;

use docvault_core::{BackupService, Config};
use std::path::Path;
use tracing::{debug, info};

/// Opens the vault at `path` for reading.
pub fn open(path: &Path, branch: &str) -> Result<BackupService, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No vault found at {}", path.display()).into());
    }
    info!("Opening vault {:?} (branch {branch})", path);
    let config = Config::default().branch(branch);
    let service = BackupService::open_read_only(path, config)?;
    debug!(head = ?service.head().map(|head| head.sequence), "journal replayed");
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn open_logs_the_vault_being_read() {
        let temp = tempdir().unwrap();
        BackupService::open(temp.path(), Config::default())
            .unwrap()
            .save(b"[1]")
            .unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || open(temp.path(), "main").unwrap());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Opening vault"), "{output}");
        assert!(output.contains("journal replayed"), "{output}");
    }

    #[test]
    fn open_refuses_a_directory_that_is_not_a_vault() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

        assert!(open(temp.path(), "main").is_err());
        assert!(!temp.path().join(".docvault").exists());
    }
}
