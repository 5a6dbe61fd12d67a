//! System call interface for exec
//!
//! Turns raw register arguments into a call to [`crate::user::exec`] and the
//! result back into a register value.
//!
//! # System Calls
//!
//! | ID | Name | Description |
//! |----|------|-------------|
//! | 9 | SYS_EXECV | Replace the calling process image |
//!
//! # Example Usage
//!
//! ```rust,ignore
//! // Userland code
//! let path = b"/bin/sh\0";
//! let arg0 = b"sh\0";
//! let argv = [arg0.as_ptr() as usize, 0];
//! syscall(9, path.as_ptr() as usize, argv.as_ptr() as usize, 0);
//! // Only reached on failure; the return value is a negative errno
//! ```

pub mod syscall;

use core::sync::atomic::{AtomicUsize, Ordering};

/// Exec counters for observability and debugging
///
/// All counters use relaxed ordering for performance.
///
/// # Metrics Tracked
///
/// - **exec_calls**: SYS_EXECV invocations
/// - **exec_commits**: Transactions that reached the point of no return
/// - **exec_rollbacks**: Transactions that failed and restored the caller
/// - **invalid_syscalls**: Dispatches with an unknown syscall number
pub struct ExecMetrics {
    pub exec_calls: AtomicUsize,
    pub exec_commits: AtomicUsize,
    pub exec_rollbacks: AtomicUsize,
    pub invalid_syscalls: AtomicUsize,
}

impl ExecMetrics {
    pub const fn new() -> Self {
        Self {
            exec_calls: AtomicUsize::new(0),
            exec_commits: AtomicUsize::new(0),
            exec_rollbacks: AtomicUsize::new(0),
            invalid_syscalls: AtomicUsize::new(0),
        }
    }

    pub fn record_call(&self) {
        self.exec_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.exec_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.exec_rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of (calls, commits, rollbacks)
    pub fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.exec_calls.load(Ordering::Relaxed),
            self.exec_commits.load(Ordering::Relaxed),
            self.exec_rollbacks.load(Ordering::Relaxed),
        )
    }
}

impl Default for ExecMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global exec metrics instance
pub static METRICS: ExecMetrics = ExecMetrics::new();
