//! Task-local error queue (spec.md §7, §9 "global error queue becomes a
//! task-local stack").
//!
//! Every [`crate::CmpError`] constructed by the engine is also pushed here
//! together with its [`crate::error::ReasonCode`] and any contextual data
//! (host:port, a DN, an OID). A session driver that recovers from a failure
//! internally — e.g. falling back from the cached validated server cert to
//! full candidate discovery — brackets the attempt with [`mark`] and
//! [`pop_to_mark`] so a successful retry leaves no stale diagnostics for the
//! caller to see after a session that ultimately succeeded.

use crate::error::{ErrorData, ReasonCode};
use std::cell::RefCell;

/// One entry in the error queue.
#[derive(Debug, Clone)]
pub struct QueuedError {
    /// Stable reason code
    pub reason: ReasonCode,
    /// Human-readable detail
    pub message: String,
    /// Contextual data (host:port, DN, OID, ...)
    pub data: ErrorData,
}

thread_local! {
    static QUEUE: RefCell<Vec<QueuedError>> = RefCell::new(Vec::new());
}

/// Push an error record onto the current task's queue.
pub fn push(reason: ReasonCode, message: impl Into<String>, data: ErrorData) {
    QUEUE.with(|q| {
        q.borrow_mut().push(QueuedError {
            reason,
            message: message.into(),
            data,
        })
    });
}

/// Push `err`'s own [`crate::error::CmpError::reason`] and message, the
/// common case call sites use instead of building a [`QueuedError`] by hand.
pub fn push_err(err: &crate::error::CmpError, data: ErrorData) {
    push(err.reason(), err.to_string(), data);
}

/// Current queue depth, used as a checkpoint for [`pop_to_mark`].
pub fn mark() -> usize {
    QUEUE.with(|q| q.borrow().len())
}

/// Truncate the queue back to a previously captured [`mark`], discarding
/// everything pushed since — used when an internal fallback path succeeds
/// and its intermediate diagnostics should not surface to the caller.
pub fn pop_to_mark(mark: usize) {
    QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if mark < q.len() {
            q.truncate(mark);
        }
    });
}

/// Drain and return every queued error, oldest first.
pub fn drain() -> Vec<QueuedError> {
    QUEUE.with(|q| q.borrow_mut().drain(..).collect())
}

/// Render the queue as the multi-line string a failed session would print.
pub fn render() -> String {
    QUEUE.with(|q| {
        q.borrow()
            .iter()
            .map(|e| match &e.data {
                Some(d) => format!("{:?}: {} ({})", e.reason, e.message, d),
                None => format!("{:?}: {}", e.reason, e.message),
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_pop_discards_only_new_entries() {
        push(ReasonCode::InvalidArgs, "first", None);
        let m = mark();
        push(ReasonCode::WrongPbmValue, "second", None);
        push(ReasonCode::MissingProtection, "third", None);
        pop_to_mark(m);
        let remaining = drain();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "first");
    }

    #[test]
    fn drain_empties_the_queue() {
        push(ReasonCode::InvalidArgs, "x", Some("ctx".into()));
        assert_eq!(drain().len(), 1);
        assert!(drain().is_empty());
    }
}
