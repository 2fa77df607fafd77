//! Per-caller ownership records.
//!
//! A [`LockContext`] stands in for "the calling thread": it is owned by one
//! logical unit of execution and tracks how many times that unit has entered
//! each lock. It is a local cache of "do I already own this", never the
//! source of truth for mutual exclusion.

use std::collections::HashMap;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Unique identifier of a caller context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ownership record of one caller context.
///
/// Not `Clone`: two copies of a record would both believe they own the same
/// backend claim.
#[derive(Debug)]
pub struct LockContext {
    id: ContextId,
    label: String,
    held: HashMap<String, u32>,
}

impl LockContext {
    /// Create a context labelled after the current thread, if it has a name.
    pub fn new() -> Self {
        let id = ContextId::new();
        let label = std::thread::current()
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("context-{}", id));
        Self {
            id,
            label,
            held: HashMap::new(),
        }
    }

    /// Create a context with an explicit diagnostic label.
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            id: ContextId::new(),
            label: label.into(),
            held: HashMap::new(),
        }
    }

    /// Get the context ID.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Get the diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of unreleased acquisitions of `name` by this context.
    pub fn hold_count(&self, name: &str) -> u32 {
        self.held.get(name).copied().unwrap_or(0)
    }

    /// Check if this context holds `name`.
    pub fn is_held(&self, name: &str) -> bool {
        self.hold_count(name) > 0
    }

    /// Names of all locks currently held.
    pub fn held_locks(&self) -> impl Iterator<Item = &str> {
        self.held.keys().map(String::as_str)
    }

    /// Bump the count if already held. Returns the new count.
    pub(crate) fn reenter(&mut self, name: &str) -> Option<u32> {
        let count = self.held.get_mut(name)?;
        *count += 1;
        Some(*count)
    }

    /// Record the first acquisition after a successful backend claim.
    pub(crate) fn record_claim(&mut self, name: &str) {
        self.held.insert(name.to_string(), 1);
    }

    /// Drop one hold. Returns the remaining count, or `None` if not held.
    pub(crate) fn release_one(&mut self, name: &str) -> Option<u32> {
        let count = self.held.get_mut(name)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.held.remove(name);
        }
        Some(remaining)
    }
}

impl Default for LockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LockContext {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            let locks: Vec<&str> = self.held_locks().collect();
            warn!(
                context = %self.label,
                ?locks,
                "Context dropped while holding locks; claims remain until expiry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_count_lifecycle() {
        let mut ctx = LockContext::named("worker");
        assert_eq!(ctx.hold_count("a"), 0);
        assert_eq!(ctx.reenter("a"), None);

        ctx.record_claim("a");
        assert_eq!(ctx.reenter("a"), Some(2));
        assert!(ctx.is_held("a"));

        assert_eq!(ctx.release_one("a"), Some(1));
        assert_eq!(ctx.release_one("a"), Some(0));
        assert!(!ctx.is_held("a"));
        assert_eq!(ctx.held_locks().count(), 0);
        assert_eq!(ctx.release_one("a"), None);
    }

    #[test]
    fn test_contexts_are_distinct() {
        let a = LockContext::new();
        let b = LockContext::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_label_defaults_to_thread_name() {
        let label = std::thread::Builder::new()
            .name("lock-worker-7".into())
            .spawn(|| LockContext::new().label().to_string())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(label, "lock-worker-7");
    }
}
