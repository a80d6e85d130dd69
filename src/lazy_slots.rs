//! Fixed-size, lazily populated slot arena.
//!
//! [`LazySlots`] hands out one element per index, constructing it on first
//! access and memoizing it for the lifetime of the arena. It exists to give
//! every port index a stable, identity-preserving element: repeated calls to
//! `step.in_port(0)` must yield the same port object, which equality-based
//! wiring depends on.
//!
//! Each slot is populated at most once and never recomputed or invalidated.
//! The arena is *not* concurrency-safe: it assumes a single writer per slot
//! (graphs are constructed on one thread), and it lives in the same
//! `Rc`/`RefCell` world as the rest of the crate.

use std::cell::OnceCell;

/// A fixed-length arena of lazily initialized slots.
///
/// ```
/// use stepflow::LazySlots;
///
/// let slots: LazySlots<String> = LazySlots::new(3);
/// let a = slots.get_or_init(0, || "port-0".to_string());
/// let b = slots.get_or_init(0, || unreachable!("slot 0 is already populated"));
/// assert!(std::ptr::eq(a, b));
/// ```
#[derive(Debug)]
pub struct LazySlots<E> {
    slots: Vec<OnceCell<E>>,
}

impl<E> LazySlots<E> {
    /// Create an arena with `len` empty slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Number of slots, populated or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the arena has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Return the element at `index`, constructing it via `init` on first
    /// access. Later calls return the same element and never run `init`.
    ///
    /// # Panics
    ///
    /// Panics when `index >= len()`. An out-of-range slot access is a
    /// programming error, not a recoverable condition.
    pub fn get_or_init(&self, index: usize, init: impl FnOnce() -> E) -> &E {
        self.slots[index].get_or_init(init)
    }

    /// Return the element at `index` if that slot has been populated.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.slots.get(index).and_then(OnceCell::get)
    }
}
