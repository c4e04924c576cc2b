//! The per-worker stack of active consumer contexts.

use crate::entity::EntityId;
use deptrack_source::FileId;
use std::cell::RefCell;

/// The file, and optionally the declaration inside it, whose processing is
/// currently issuing queries. Edges are attributed to the innermost one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ConsumerContext {
    /// The primary file being processed.
    pub file: FileId,
    /// The declaration being checked, or `None` at file level.
    pub decl: Option<EntityId>,
}

impl ConsumerContext {
    /// A file-level context.
    pub fn file(file: FileId) -> Self {
        Self { file, decl: None }
    }

    /// A declaration-level context.
    pub fn decl(file: FileId, decl: EntityId) -> Self {
        Self {
            file,
            decl: Some(decl),
        }
    }
}

/// Strictly nested consumer contexts of one worker.
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<ConsumerContext>,
}

impl ContextStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `context` the innermost context.
    pub fn push(&mut self, context: ConsumerContext) {
        self.frames.push(context);
    }

    /// Removes and returns the innermost context.
    pub fn pop(&mut self) -> Option<ConsumerContext> {
        self.frames.pop()
    }

    /// Returns the innermost context, if any.
    pub fn current(&self) -> Option<ConsumerContext> {
        self.frames.last().copied()
    }

    /// Number of active contexts.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }
}

/// Scope guard returned by [`Tracker::enter`](crate::Tracker::enter).
///
/// Dropping the guard restores the stack to its depth before the push, so an
/// early return or an unwinding panic inside the scope cannot leak a context.
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ContextGuard<'a> {
    stack: &'a RefCell<ContextStack>,
    depth: usize,
}

impl<'a> ContextGuard<'a> {
    pub(crate) fn push(stack: &'a RefCell<ContextStack>, context: ConsumerContext) -> Self {
        let mut frames = stack.borrow_mut();
        let depth = frames.depth();
        frames.push(context);
        Self { stack, depth }
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().truncate(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_current() {
        let mut stack = ContextStack::new();
        assert_eq!(stack.current(), None);
        let file = ConsumerContext::file(FileId::from_raw(0));
        let decl = ConsumerContext::decl(FileId::from_raw(0), EntityId::from_raw(7));
        stack.push(file);
        stack.push(decl);
        assert_eq!(stack.current(), Some(decl));
        assert_eq!(stack.pop(), Some(decl));
        assert_eq!(stack.current(), Some(file));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn guards_nest() {
        let stack = RefCell::new(ContextStack::new());
        let file = ConsumerContext::file(FileId::from_raw(1));
        let decl = ConsumerContext::decl(FileId::from_raw(1), EntityId::from_raw(2));
        {
            let _outer = ContextGuard::push(&stack, file);
            {
                let _inner = ContextGuard::push(&stack, decl);
                assert_eq!(stack.borrow().current(), Some(decl));
            }
            assert_eq!(stack.borrow().current(), Some(file));
        }
        assert_eq!(stack.borrow().current(), None);
    }

    #[test]
    fn guard_restores_after_panic() {
        let stack = RefCell::new(ContextStack::new());
        let file = ConsumerContext::file(FileId::from_raw(1));
        let _outer = ContextGuard::push(&stack, file);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _inner = ContextGuard::push(
                &stack,
                ConsumerContext::decl(FileId::from_raw(1), EntityId::from_raw(0)),
            );
            panic!("checker bug");
        }));
        assert!(result.is_err());
        assert_eq!(stack.borrow().current(), Some(file));
    }
}
