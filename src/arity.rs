//! Fixed-size port collections backing a step's declared arity.
//!
//! [`InPorts`] and [`OutPorts`] replace the input/output arity mixins of a
//! class hierarchy with explicit, [`LazySlots`]-backed collections: a step with
//! `n` inputs owns an `InPorts` of length `n`, and the no-input case is simply
//! length zero. Port objects are built on first access and memoized, so every
//! index has exactly one identity for the lifetime of the step.

use crate::error::{Result, StepError};
use crate::lazy_slots::LazySlots;
use crate::ports::{ConnectionSource, ConnectionTarget};
use crate::step::{EvalMode, Payload, Step};
use std::rc::{Rc, Weak};

/// The input side of a step: `len()` connection targets.
#[derive(Debug)]
pub struct InPorts<T: Payload, C: 'static> {
    slots: LazySlots<ConnectionTarget<T, C>>,
}

impl<T: Payload, C: 'static> InPorts<T, C> {
    /// A collection of `count` unconnected input ports.
    pub fn new(count: usize) -> Self {
        Self {
            slots: LazySlots::new(count),
        }
    }

    /// Declared input count.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True for a no-input step.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The target port at `index`. Stable: every call returns the same object.
    ///
    /// # Panics
    ///
    /// Panics when `index >= len()`.
    pub fn port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.slots.get_or_init(index, || ConnectionTarget::new(index))
    }

    /// Pull the value of input `index`.
    ///
    /// An unconnected port raises [`StepError::UnconnectedInput`] when
    /// `required`, and substitutes [`Payload::absent`] otherwise.
    pub fn pull_at(&self, ctx: &C, index: usize, mode: EvalMode, required: bool) -> Result<T> {
        match self.port(index).source() {
            Some(source) => source.value(ctx, mode),
            None if required => Err(StepError::UnconnectedInput { index }),
            None => Ok(T::absent()),
        }
    }

    /// Pull input 0. The single-input convenience.
    pub fn pull_one(&self, ctx: &C, mode: EvalMode, required: bool) -> Result<T> {
        self.pull_at(ctx, 0, mode, required)
    }

    /// Pull every input in ascending port order.
    ///
    /// The returned sequence has length `len()`; unconnected slots follow the
    /// same required/absent policy as [`pull_at`](InPorts::pull_at). The first
    /// failing pull aborts the sweep.
    pub fn pull_all(&self, ctx: &C, mode: EvalMode, required: bool) -> Result<Vec<T>> {
        (0..self.len())
            .map(|index| self.pull_at(ctx, index, mode, required))
            .collect()
    }

    /// Metadata reported by the step feeding input `index`, if that port is
    /// connected and its upstream step has any.
    pub fn metadata(&self, index: usize) -> Option<T::Meta> {
        self.port(index).source().and_then(|source| source.metadata())
    }
}

/// The output side of a step: `len()` addressable connection sources.
///
/// Unlike [`InPorts`], nothing is memoized here: a source handle carries a
/// strong reference to its own step, so stashing one inside the step would tie
/// a reference cycle. Handles are minted per call instead; their equality is
/// step identity plus index, so every handle for the same port compares equal.
#[derive(Debug)]
pub struct OutPorts<T: Payload, C: 'static> {
    count: usize,
    _marker: std::marker::PhantomData<(T, fn(&C))>,
}

impl<T: Payload, C: 'static> OutPorts<T, C> {
    /// A collection of `count` output ports.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            _marker: std::marker::PhantomData,
        }
    }

    /// Declared output count.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the step declares no outputs.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The source handle for output `index` of the step behind `step`.
    ///
    /// # Panics
    ///
    /// Panics when `index >= len()`, or when `step` no longer upgrades (the
    /// owning step must live inside an `Rc`).
    pub fn port(&self, step: &Weak<dyn Step<T, C>>, index: usize) -> ConnectionSource<T, C> {
        assert!(
            index < self.count,
            "output index {index} out of range for {} ports",
            self.count
        );
        let step: Rc<dyn Step<T, C>> = step.upgrade().expect("step must be owned by an Rc");
        ConnectionSource::new(step, index)
    }
}
