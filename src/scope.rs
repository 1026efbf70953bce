//! Resource-scope collaborator — scoped services with explicit teardown.
//!
//! Every manager owns exactly one scope. Child managers get a scope *derived*
//! from the parent's, never an alias to it, so the unconditional teardown in
//! `run`/`parallel_run` cannot destroy state the parent or a sibling is still
//! using.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

/// A scope supplying services to one manager, reclaimable via explicit teardown.
pub trait ResourceScope: Send + Sync {
    /// Derive an isolated child scope. Destroying the child must not affect
    /// this scope, and vice versa.
    fn derive_child(&self) -> Arc<dyn ResourceScope>;

    /// Release the scope's resources. Idempotent: calling it again is a no-op.
    fn destroy(&self);

    /// Whether the scope has been destroyed.
    fn is_destroyed(&self) -> bool;
}

/// Stock scope implementation: an id, parent lineage, and teardown callbacks.
pub struct ServiceScope {
    id: Uuid,
    parent: Option<Uuid>,
    destroyed: AtomicBool,
    finalizers: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl ServiceScope {
    /// Create a root scope.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            parent: None,
            destroyed: AtomicBool::new(false),
            finalizers: Mutex::new(Vec::new()),
        }
    }

    /// Scope ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// ID of the scope this one was derived from, if any.
    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent
    }

    /// Register a callback to run exactly once when the scope is destroyed.
    pub fn on_destroy(&self, f: impl FnOnce() + Send + 'static) {
        if let Ok(mut finalizers) = self.finalizers.lock() {
            finalizers.push(Box::new(f));
        }
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceScope for ServiceScope {
    fn derive_child(&self) -> Arc<dyn ResourceScope> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            parent: Some(self.id),
            destroyed: AtomicBool::new(false),
            finalizers: Mutex::new(Vec::new()),
        })
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let finalizers = match self.finalizers.lock() {
            Ok(mut f) => std::mem::take(&mut *f),
            Err(_) => Vec::new(),
        };
        for f in finalizers {
            f();
        }
        tracing::debug!(scope = %self.id, "scope destroyed");
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_destroy_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = ServiceScope::new();
        let counter = Arc::clone(&calls);
        scope.on_destroy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scope.destroy();
        scope.destroy();

        assert!(scope.is_destroyed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_child_destruction_leaves_parent_intact() {
        let parent = ServiceScope::new();
        let child = parent.derive_child();

        child.destroy();

        assert!(child.is_destroyed());
        assert!(!parent.is_destroyed());
    }

    #[test]
    fn test_parent_destruction_leaves_child_intact() {
        let parent = ServiceScope::new();
        let child = parent.derive_child();

        parent.destroy();

        assert!(parent.is_destroyed());
        assert!(!child.is_destroyed());
    }

    #[test]
    fn test_siblings_are_independent() {
        let parent = ServiceScope::new();
        let a = parent.derive_child();
        let b = parent.derive_child();

        a.destroy();

        assert!(a.is_destroyed());
        assert!(!b.is_destroyed());
    }
}
