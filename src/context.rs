//! Ambient typed values scoped to a subtree.
//!
//! A provider pushes a value before rendering its children and pops it afterwards.
//! Values are keyed by their concrete type; lookups scan from the top of the stack
//! so the innermost provider of a type shadows outer ones.
//!
//! ## Storage
//!
//! One `Vec<(TypeId, Box<dyn Any>)>` for all types. Trees rarely nest more than a
//! handful of providers, so a linear scan from the top beats a map of per-type
//! stacks and keeps push/pop ordering trivially checkable.
//!
//! ## Balance
//!
//! [`ContextStack::mark`] and [`ContextStack::restore`] give the dispatch boundary
//! scoped acquisition: whatever a renderer pushed, including on a panic path, is
//! unwound to the depth recorded before the renderer ran.

use std::any::{Any, TypeId};
use std::borrow::Cow;

use crate::error::{Error, Result};

struct Entry {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any>,
}

#[derive(Default)]
pub struct ContextStack {
    entries: Vec<Entry>,
}

/// Depth snapshot returned by [`ContextStack::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMark(usize);

impl ContextMark {
    pub fn depth(self) -> usize {
        self.0
    }
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: 'static>(&mut self, value: T) {
        self.entries.push(Entry {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        });
    }

    /// Pop the top entry, which must be a `T`.
    ///
    /// A mismatched or empty top means a provider popped out of order.
    pub fn pop<T: 'static>(&mut self) -> Result<T> {
        let expected = std::any::type_name::<T>();
        match self.entries.last() {
            Some(top) if top.type_id == TypeId::of::<T>() => {}
            Some(top) => {
                return Err(Error::ContextMismatch {
                    expected,
                    found: Cow::Borrowed(top.type_name),
                })
            }
            None => {
                return Err(Error::ContextMismatch {
                    expected,
                    found: Cow::Borrowed("an empty stack"),
                })
            }
        }
        let entry = self.entries.pop().expect("top checked above");
        Ok(*entry
            .value
            .downcast::<T>()
            .expect("context type mismatch (should be impossible)"))
    }

    /// Nearest enclosing value of type `T`, or `None` if no provider pushed one.
    pub fn try_get<T: 'static>(&self) -> Option<&T> {
        let type_id = TypeId::of::<T>();
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.type_id == type_id)
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.try_get::<T>().is_some()
    }

    /// Number of entries of type `T` currently on the stack.
    pub fn depth_of<T: 'static>(&self) -> usize {
        let type_id = TypeId::of::<T>();
        self.entries.iter().filter(|e| e.type_id == type_id).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push every entry of `batch` in order.
    pub fn push_batch(&mut self, batch: &ContextBatch) {
        for entry in &batch.entries {
            self.entries.push(entry.to_entry());
        }
    }

    /// Pop a batch pushed by [`push_batch`](Self::push_batch), in reverse order.
    pub fn pop_batch(&mut self, batch: &ContextBatch) -> Result<()> {
        for entry in batch.entries.iter().rev() {
            match self.entries.last() {
                Some(top) if top.type_id == entry.value_type_id() => {
                    self.entries.pop();
                }
                top => {
                    return Err(Error::ContextMismatch {
                        expected: entry.value_type_name(),
                        found: Cow::Borrowed(top.map_or("an empty stack", |t| t.type_name)),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn mark(&self) -> ContextMark {
        ContextMark(self.entries.len())
    }

    /// Unwind to `mark`. Returns `false` if the stack was not already at that depth.
    ///
    /// A stack shallower than the mark cannot be repaired; it is left as is.
    pub fn restore(&mut self, mark: ContextMark) -> bool {
        let balanced = self.entries.len() == mark.0;
        if self.entries.len() > mark.0 {
            self.entries.truncate(mark.0);
        }
        balanced
    }
}

trait BatchValue {
    fn value_type_id(&self) -> TypeId;
    fn value_type_name(&self) -> &'static str;
    fn to_entry(&self) -> Entry;
}

struct BatchEntry<T>(T);

impl<T: Clone + 'static> BatchValue for BatchEntry<T> {
    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_entry(&self) -> Entry {
        Entry {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(self.0.clone()),
        }
    }
}

/// Several typed values pushed and popped as one unit.
///
/// ```ignore
/// let batch = ContextBatch::new().with(ReadOnly(true)).with(Theme::dark());
/// ```
#[derive(Default)]
pub struct ContextBatch {
    entries: Vec<Box<dyn BatchValue>>,
}

impl ContextBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Clone + 'static>(mut self, value: T) -> Self {
        self.entries.push(Box::new(BatchEntry(value)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
