//! Write serialization.
//!
//! Every save runs inside an exclusive write scope. The scope holds the
//! per-vault write lock and tracks the attempt through its state machine:
//!
//! ```text
//! Idle → Locked → Validating → Writing → Committing → Committed
//!                     │           │           │
//!                     └───────────┴───────────┴──────→ RolledBack
//! ```
//!
//! The lock guard is released on every exit path, including errors and
//! panics inside the scope. Readers never take this lock.

use crate::config::LockPolicy;
use crate::error::{CoreError, CoreResult};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// State of one save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Waiting for the write lock.
    Idle,
    /// Lock acquired.
    Locked,
    /// Checking the candidate document.
    Validating,
    /// Replacing the working document.
    Writing,
    /// Recording the revision.
    Committing,
    /// Terminal success.
    Committed,
    /// Terminal failure; the working document is as it was before.
    RolledBack,
}

impl SaveState {
    /// Returns true for `Committed` and `RolledBack`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: SaveState) -> bool {
        use SaveState::*;
        matches!(
            (self, next),
            (Idle, Locked)
                | (Locked, Validating)
                | (Validating, Writing)
                | (Writing, Committing)
                | (Committing, Committed)
                | (Locked | Validating | Writing | Committing, RolledBack)
        )
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Locked => "locked",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// Serializes saves against one vault.
#[derive(Debug)]
pub struct WriteSerializer {
    lock: Mutex<()>,
    policy: LockPolicy,
    attempts: AtomicU64,
}

impl WriteSerializer {
    /// Creates a serializer with the given contention policy.
    #[must_use]
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            lock: Mutex::new(()),
            policy,
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns the contention policy.
    #[must_use]
    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Returns true if a save currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Runs `f` while holding the exclusive write lock.
    ///
    /// The scope starts in [`SaveState::Locked`]. If `f` returns an error
    /// without reaching a terminal state, the scope is marked
    /// [`SaveState::RolledBack`]; `f` is responsible for undoing any I/O it
    /// did before returning.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Busy`] under [`LockPolicy::FailFast`] when contended
    /// - [`CoreError::Timeout`] when the blocking wait runs out
    /// - whatever `f` returns
    pub fn with_exclusive_write<R, F>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut WriteScope<'_>) -> CoreResult<R>,
    {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = self.acquire(attempt)?;

        let mut scope = WriteScope {
            _guard: guard,
            attempt,
            state: SaveState::Idle,
        };
        scope.advance(SaveState::Locked);

        let result = f(&mut scope);
        if result.is_err() && !scope.state.is_terminal() {
            scope.advance(SaveState::RolledBack);
        }
        result
    }

    fn acquire(&self, attempt: u64) -> CoreResult<MutexGuard<'_, ()>> {
        match self.policy {
            LockPolicy::FailFast => self.lock.try_lock().ok_or_else(|| {
                debug!(attempt, "write lock busy, failing fast");
                CoreError::Busy
            }),
            LockPolicy::Block { timeout } => {
                let started = Instant::now();
                self.lock.try_lock_for(timeout).ok_or_else(|| {
                    let waited = started.elapsed();
                    warn!(attempt, ?waited, "timed out waiting for write lock");
                    CoreError::Timeout { waited }
                })
            }
        }
    }
}

/// An acquired exclusive write scope.
///
/// Dropping the scope releases the lock.
pub struct WriteScope<'a> {
    _guard: MutexGuard<'a, ()>,
    attempt: u64,
    state: SaveState,
}

impl WriteScope<'_> {
    /// Returns the attempt number (1-based, per serializer).
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SaveState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// Illegal transitions are a programming error: they trip a debug
    /// assertion and are logged in release builds.
    pub fn advance(&mut self, next: SaveState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal save transition {} -> {}",
            self.state,
            next
        );
        if !self.state.can_advance_to(next) {
            warn!(attempt = self.attempt, from = %self.state, to = %next, "illegal save transition");
        }
        trace!(attempt = self.attempt, from = %self.state, to = %next, "save transition");
        self.state = next;
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            warn!(
                attempt = self.attempt,
                state = %self.state,
                "write scope released before reaching a terminal state"
            );
        }
    }
}

impl fmt::Debug for WriteScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteScope")
            .field("attempt", &self.attempt)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn blocking(ms: u64) -> WriteSerializer {
        WriteSerializer::new(LockPolicy::Block {
            timeout: Duration::from_millis(ms),
        })
    }

    #[test]
    fn legal_transitions() {
        use SaveState::*;
        assert!(Idle.can_advance_to(Locked));
        assert!(Committing.can_advance_to(Committed));
        assert!(Writing.can_advance_to(RolledBack));
        assert!(!Idle.can_advance_to(Writing));
        assert!(!Committed.can_advance_to(RolledBack));
        assert!(!Validating.can_advance_to(Committed));
    }

    #[test]
    fn scope_runs_and_releases() {
        let serializer = blocking(100);
        let value = serializer
            .with_exclusive_write(|scope| {
                assert_eq!(scope.state(), SaveState::Locked);
                assert_eq!(scope.attempt(), 1);
                scope.advance(SaveState::RolledBack);
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert!(!serializer.is_locked());
    }

    #[test]
    fn error_marks_rolled_back_and_releases() {
        let serializer = blocking(100);
        let result: CoreResult<()> = serializer.with_exclusive_write(|scope| {
            scope.advance(SaveState::Validating);
            Err(CoreError::validation("bad"))
        });
        assert!(matches!(result, Err(CoreError::Validation { .. })));
        assert!(!serializer.is_locked());
    }

    #[test]
    fn panic_inside_scope_releases_lock() {
        let serializer = Arc::new(blocking(100));
        let worker = Arc::clone(&serializer);
        let joined = thread::spawn(move || {
            let _: CoreResult<()> = worker.with_exclusive_write(|_| panic!("boom"));
        })
        .join();
        assert!(joined.is_err());
        assert!(!serializer.is_locked());
        assert!(serializer
            .with_exclusive_write(|scope| {
                scope.advance(SaveState::RolledBack);
                Ok(())
            })
            .is_ok());
    }

    fn hold_lock(serializer: &Arc<WriteSerializer>) -> (mpsc::Sender<()>, thread::JoinHandle<()>) {
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = Arc::clone(serializer);
        let handle = thread::spawn(move || {
            holder
                .with_exclusive_write(|scope| {
                    locked_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    scope.advance(SaveState::RolledBack);
                    Ok(())
                })
                .unwrap();
        });
        locked_rx.recv().unwrap();
        (release_tx, handle)
    }

    #[test]
    fn fail_fast_reports_busy() {
        let serializer = Arc::new(WriteSerializer::new(LockPolicy::FailFast));
        let (release, handle) = hold_lock(&serializer);

        let result: CoreResult<()> = serializer.with_exclusive_write(|_| Ok(()));
        assert!(matches!(result, Err(CoreError::Busy)));

        release.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn blocking_policy_times_out() {
        let serializer = Arc::new(blocking(50));
        let (release, handle) = hold_lock(&serializer);

        let result: CoreResult<()> = serializer.with_exclusive_write(|_| Ok(()));
        match result {
            Err(CoreError::Timeout { waited }) => assert!(waited >= Duration::from_millis(50)),
            other => panic!("expected timeout, got {other:?}"),
        }

        release.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn blocking_policy_waits_for_release() {
        let serializer = Arc::new(blocking(5_000));
        let (release, handle) = hold_lock(&serializer);

        let waiter = {
            let serializer = Arc::clone(&serializer);
            thread::spawn(move || {
                serializer.with_exclusive_write(|scope| {
                    scope.advance(SaveState::RolledBack);
                    Ok(scope.attempt())
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        release.send(()).unwrap();
        handle.join().unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), 2);
    }
}
