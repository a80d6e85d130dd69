//! Directed wiring endpoints between steps.
//!
//! A [`ConnectionSource`] is a (step, output index) pair; pulling its value
//! forwards to the step's `output_at`. A [`ConnectionTarget`] is an input slot
//! holding at most one inbound source. Binding a target that is already
//! connected silently replaces the previous edge — last bind wins, there is no
//! disconnect operation.
//!
//! A connection carries no state of its own: the edge *is* the target's
//! inbound reference. A source may fan out to arbitrarily many targets.

use crate::error::Result;
use crate::step::{EvalMode, Payload, Step};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// An output port: where a connection starts.
///
/// Holds a strong reference to its step, so wiring keeps upstream nodes alive
/// for as long as anything downstream can still pull from them. Equality is
/// step identity plus index, which makes memoized and freshly minted handles
/// for the same port compare equal.
pub struct ConnectionSource<T: Payload, C: 'static> {
    step: Rc<dyn Step<T, C>>,
    index: usize,
}

impl<T: Payload, C: 'static> ConnectionSource<T, C> {
    /// A source handle for output `index` of `step`.
    pub fn new(step: Rc<dyn Step<T, C>>, index: usize) -> Self {
        Self { step, index }
    }

    /// The step this port belongs to.
    pub fn step(&self) -> &Rc<dyn Step<T, C>> {
        &self.step
    }

    /// The output index on the owning step.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pull the value of this port: forwards to `step.output_at`.
    pub fn value(&self, ctx: &C, mode: EvalMode) -> Result<T> {
        self.step.output_at(ctx, self.index, mode)
    }

    /// Metadata attached to the owning step's output, if any.
    pub fn metadata(&self) -> Option<T::Meta> {
        self.step.out_metadata()
    }

    /// Wire this source into `target`, returning the target for chaining.
    pub fn connect_to<'a>(
        &self,
        target: &'a ConnectionTarget<T, C>,
    ) -> &'a ConnectionTarget<T, C> {
        target.bind_from(self.clone())
    }

    /// Wire this source into the default (index 0) input of `step`.
    ///
    /// # Panics
    ///
    /// Panics when `step` has no input ports.
    pub fn connect_to_step(&self, step: &dyn Step<T, C>) {
        self.connect_to(step.in_port(0));
    }
}

impl<T: Payload, C: 'static> Clone for ConnectionSource<T, C> {
    fn clone(&self) -> Self {
        Self {
            step: Rc::clone(&self.step),
            index: self.index,
        }
    }
}

impl<T: Payload, C: 'static> PartialEq for ConnectionSource<T, C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.step, &other.step) && self.index == other.index
    }
}

impl<T: Payload, C: 'static> Eq for ConnectionSource<T, C> {}

impl<T: Payload, C: 'static> fmt::Debug for ConnectionSource<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSource")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// An input port: where a connection ends.
///
/// Owns the mutable inbound-edge slot. Unconnected is an explicit state
/// (`source()` returns `None`), not a sentinel value.
pub struct ConnectionTarget<T: Payload, C: 'static> {
    index: usize,
    inbound: RefCell<Option<ConnectionSource<T, C>>>,
}

impl<T: Payload, C: 'static> ConnectionTarget<T, C> {
    /// An unconnected target for input `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            inbound: RefCell::new(None),
        }
    }

    /// The input index on the owning step.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bind `source` as the inbound edge, unconditionally replacing any
    /// previous one. Returns the target for chaining.
    pub fn bind_from(&self, source: ConnectionSource<T, C>) -> &Self {
        *self.inbound.borrow_mut() = Some(source);
        self
    }

    /// The currently bound inbound source, if any.
    pub fn source(&self) -> Option<ConnectionSource<T, C>> {
        self.inbound.borrow().clone()
    }

    /// True when an inbound edge is bound.
    pub fn is_connected(&self) -> bool {
        self.inbound.borrow().is_some()
    }
}

impl<T: Payload, C: 'static> fmt::Debug for ConnectionTarget<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("index", &self.index)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Bind each source to the target at the same position.
///
/// The i-th source is wired into the i-th target. Used to fan the outputs of
/// a multi-output step into a row of downstream inputs. A count mismatch
/// between the two sides is a wiring bug: it trips a debug assertion, and in
/// release builds the extra items on the longer side are ignored.
pub fn bind_each<'a, T: Payload, C: 'static>(
    sources: impl IntoIterator<Item = ConnectionSource<T, C>>,
    targets: impl IntoIterator<Item = &'a ConnectionTarget<T, C>>,
) {
    let mut sources = sources.into_iter();
    let mut targets = targets.into_iter();
    loop {
        match (sources.next(), targets.next()) {
            (Some(source), Some(target)) => {
                source.connect_to(target);
            }
            (None, None) => return,
            (source, _) => {
                debug_assert!(
                    false,
                    "bind_each: mismatched source and target counts ({} side ran out first)",
                    if source.is_none() { "source" } else { "target" }
                );
                return;
            }
        }
    }
}
