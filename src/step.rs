//! The node abstraction of the step graph.
//!
//! A [`Step`] is a processing node with fixed input/output arity, generic over
//! the payload type `T` flowing on wires and the runtime context `C` needed to
//! evaluate it. The core never inspects either: concrete steps delegate the
//! actual work to whatever engine the context carries.
//!
//! Evaluation is pull-based and synchronous. Calling [`Step::output`] on a
//! terminal step recursively pulls `value` from each connected upstream port
//! on the same call stack. Nothing is evaluated until some downstream step
//! asks for it, and nothing is memoized across pulls: a step with two
//! downstream consumers is recomputed once per pull. That statelessness is
//! deliberate — callers needing shared results must cache externally.

use crate::error::{Result, StepError};
use crate::export::StepExport;
use crate::ports::ConnectionTarget;
use std::fmt;

/// Bound on the payload type carried between steps.
///
/// Besides being cheaply cloneable (payloads are typically handles into an
/// external engine, not the data itself), a payload names the metadata type
/// propagated alongside it and designates the stand-in value used for an
/// unconnected optional input.
pub trait Payload: Clone + 'static {
    /// Schema-like descriptor optionally attached to a step's output and
    /// propagated downstream by value.
    type Meta: Clone + PartialEq + fmt::Debug + 'static;

    /// The designated value substituted for an unconnected input when the
    /// owning step does not require all inputs.
    fn absent() -> Self;
}

/// Advisory flag requesting a reduced computation result.
///
/// `Preview` asks the implementation for a bounded sample (for example a
/// row-limited slice) instead of the full result. A step is free to ignore it
/// and return everything, but should never return *more* than the full result.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EvalMode {
    /// Compute the full result.
    #[default]
    Full,
    /// Compute a reduced/bounded result.
    Preview,
}

impl EvalMode {
    /// True in preview mode.
    pub fn is_preview(self) -> bool {
        matches!(self, EvalMode::Preview)
    }
}

/// A node in the processing graph.
///
/// Arity is fixed for the lifetime of the instance. A step is mutable only at
/// wiring time (binding inbound ports); `output` calls never change topology.
///
/// Concrete steps implement [`compute`](Step::compute); callers go through the
/// provided `output*` methods, which validate the output index and apply the
/// uniform failure-wrapping boundary: any error that is not already a
/// [`StepError`] is wrapped into [`StepError::Execution`] carrying the
/// original cause, while an existing `StepError` passes through untouched.
pub trait Step<T: Payload, C: 'static> {
    /// Declared number of input ports.
    fn input_count(&self) -> usize;

    /// Declared number of output ports.
    fn output_count(&self) -> usize;

    /// Whether every input port must be connected at evaluation time.
    /// Defaults to true.
    fn all_inputs_required(&self) -> bool {
        true
    }

    /// The input port at `index`.
    ///
    /// Repeated calls return the same port object; wiring relies on that.
    ///
    /// # Panics
    ///
    /// Panics when `index >= input_count()` — addressing a port that does not
    /// exist is a programming error, not a recoverable condition.
    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C>;

    /// Metadata attached to this step's output, if any. Defaults to `None`.
    fn out_metadata(&self) -> Option<T::Meta> {
        None
    }

    /// Export capability of this step, if it has one. Steps built from
    /// closures have none; every concrete step type in an instantiation
    /// module does.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }

    /// The extension point: compute the output at `index`.
    ///
    /// Implementations pull their own inputs (in ascending port order) and
    /// delegate the work to the engine reachable through `ctx`. Errors may be
    /// raised freely; the `output` boundary wraps them uniformly.
    fn compute(&self, ctx: &C, index: usize, mode: EvalMode) -> anyhow::Result<T>;

    /// Compute the output at `index`, validating arity and wrapping failures.
    fn output_at(&self, ctx: &C, index: usize, mode: EvalMode) -> Result<T> {
        if index >= self.output_count() {
            return Err(StepError::OutputOutOfRange {
                index,
                outputs: self.output_count(),
            });
        }
        tracing::trace!(index, preview = mode.is_preview(), "pulling step output");
        self.compute(ctx, index, mode).map_err(StepError::wrap)
    }

    /// `output_at(ctx, 0, mode)`.
    fn output_with(&self, ctx: &C, mode: EvalMode) -> Result<T> {
        self.output_at(ctx, 0, mode)
    }

    /// `output_at(ctx, 0, EvalMode::Full)`.
    fn output(&self, ctx: &C) -> Result<T> {
        self.output_at(ctx, 0, EvalMode::Full)
    }
}
