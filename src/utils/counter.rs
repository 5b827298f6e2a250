//! A simple counter for tracking per-file results.
use crate::types::*;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// A counter for tracking per-file results.
pub struct Counter {
    ok: AtomicUsize,
    ignored: AtomicUsize,
    error: AtomicUsize,
}

impl Counter {
    /// Creates a new Counter instance.
    pub fn new() -> Self {
        Self {
            ok: AtomicUsize::new(0),
            ignored: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
        }
    }

    /// Increments the count of errors.
    pub fn inc_error(&self) {
        self.error.fetch_add(1, SeqCst);
    }

    pub fn inc(&self, result: ProcessResult) {
        match result {
            ProcessResult::Ok => {
                self.ok.fetch_add(1, SeqCst);
            }
            ProcessResult::Ignored => {
                self.ignored.fetch_add(1, SeqCst);
            }
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.load(SeqCst) > 0
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OK: {}, Ignored: {}, Error: {}",
            self.ok.load(SeqCst),
            self.ignored.load(SeqCst),
            self.error.load(SeqCst),
        )
    }
}

#[test]
fn test_counter() {
    let counter = Counter::new();
    counter.inc(ProcessResult::Ok);
    counter.inc(ProcessResult::Ok);
    counter.inc(ProcessResult::Ignored);
    assert!(!counter.has_error());
    counter.inc_error();
    assert!(counter.has_error());
    assert_eq!(counter.to_string(), "OK: 2, Ignored: 1, Error: 1");
}
