//! Topology templates: pre-wired step shapes.
//!
//! Each template fixes an input/output arity pair and narrows the generic
//! per-index `compute` down to the natural signature for that topology, via a
//! small op trait:
//!
//! | Template      | Arity   | Op method                           |
//! |---------------|---------|-------------------------------------|
//! | [`Producer`]    | 0 / 1   | `produce(ctx, mode)`                |
//! | [`Transformer`] | 1 / 1   | `transform(ctx, input, mode)`       |
//! | [`Splitter`]    | 1 / m   | `split(ctx, input, out_index, mode)`|
//! | [`Merger`]      | n / 1   | `merge(ctx, inputs, mode)`          |
//! | [`Module`]      | n / m   | `run(ctx, inputs, out_index, mode)` |
//!
//! The narrowing is purely a dispatch convenience: arity validation and the
//! uniform error wrapping of [`Step::output_at`] are untouched. Closures are
//! adapted through the `*Fn` wrapper structs rather than blanket impls, so
//! concrete op types and ad-hoc closures coexist.

use crate::arity::{InPorts, OutPorts};
use crate::export::StepExport;
use crate::metadata;
use crate::ports::{ConnectionSource, ConnectionTarget, bind_each};
use crate::step::{EvalMode, Payload, Step};
use std::rc::{Rc, Weak};

/// Op for a 0-in/1-out step.
pub trait ProduceOp<T: Payload, C: 'static> {
    /// Produce the step's single output.
    fn produce(&self, ctx: &C, mode: EvalMode) -> anyhow::Result<T>;

    /// Export capability of this op, if it has one.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }
}

/// Op for a 1-in/1-out step.
pub trait TransformOp<T: Payload, C: 'static> {
    /// Transform the pulled input into the single output.
    fn transform(&self, ctx: &C, input: T, mode: EvalMode) -> anyhow::Result<T>;

    /// Export capability of this op, if it has one.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }
}

/// Op for a 1-in/m-out step.
pub trait SplitOp<T: Payload, C: 'static> {
    /// Produce output `out_index` from the pulled input.
    fn split(&self, ctx: &C, input: T, out_index: usize, mode: EvalMode) -> anyhow::Result<T>;

    /// Export capability of this op, if it has one.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }
}

/// Op for an n-in/1-out step.
pub trait MergeOp<T: Payload, C: 'static> {
    /// Merge the pulled inputs (ascending port order) into the single output.
    fn merge(&self, ctx: &C, inputs: Vec<T>, mode: EvalMode) -> anyhow::Result<T>;

    /// Export capability of this op, if it has one.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }
}

/// Op for an n-in/m-out step.
pub trait ModuleOp<T: Payload, C: 'static> {
    /// Produce output `out_index` from the pulled inputs (ascending port order).
    fn run(&self, ctx: &C, inputs: Vec<T>, out_index: usize, mode: EvalMode)
    -> anyhow::Result<T>;

    /// Export capability of this op, if it has one.
    fn as_export(&self) -> Option<&dyn StepExport> {
        None
    }
}

/// Closure adapter for [`ProduceOp`].
pub struct ProduceFn<F>(pub F);

impl<T: Payload, C: 'static, F> ProduceOp<T, C> for ProduceFn<F>
where
    F: Fn(&C, EvalMode) -> anyhow::Result<T>,
{
    fn produce(&self, ctx: &C, mode: EvalMode) -> anyhow::Result<T> {
        (self.0)(ctx, mode)
    }
}

/// Closure adapter for [`TransformOp`].
pub struct TransformFn<F>(pub F);

impl<T: Payload, C: 'static, F> TransformOp<T, C> for TransformFn<F>
where
    F: Fn(&C, T, EvalMode) -> anyhow::Result<T>,
{
    fn transform(&self, ctx: &C, input: T, mode: EvalMode) -> anyhow::Result<T> {
        (self.0)(ctx, input, mode)
    }
}

/// Closure adapter for [`SplitOp`].
pub struct SplitFn<F>(pub F);

impl<T: Payload, C: 'static, F> SplitOp<T, C> for SplitFn<F>
where
    F: Fn(&C, T, usize, EvalMode) -> anyhow::Result<T>,
{
    fn split(&self, ctx: &C, input: T, out_index: usize, mode: EvalMode) -> anyhow::Result<T> {
        (self.0)(ctx, input, out_index, mode)
    }
}

/// Closure adapter for [`MergeOp`].
pub struct MergeFn<F>(pub F);

impl<T: Payload, C: 'static, F> MergeOp<T, C> for MergeFn<F>
where
    F: Fn(&C, Vec<T>, EvalMode) -> anyhow::Result<T>,
{
    fn merge(&self, ctx: &C, inputs: Vec<T>, mode: EvalMode) -> anyhow::Result<T> {
        (self.0)(ctx, inputs, mode)
    }
}

/// Closure adapter for [`ModuleOp`].
pub struct ModuleFn<F>(pub F);

impl<T: Payload, C: 'static, F> ModuleOp<T, C> for ModuleFn<F>
where
    F: Fn(&C, Vec<T>, usize, EvalMode) -> anyhow::Result<T>,
{
    fn run(
        &self,
        ctx: &C,
        inputs: Vec<T>,
        out_index: usize,
        mode: EvalMode,
    ) -> anyhow::Result<T> {
        (self.0)(ctx, inputs, out_index, mode)
    }
}

/// 0-in/1-out template.
pub struct Producer<T: Payload, C: 'static, O> {
    op: O,
    meta: Option<T::Meta>,
    slf: Weak<dyn Step<T, C>>,
    inputs: InPorts<T, C>,
    outputs: OutPorts<T, C>,
}

impl<T: Payload, C: 'static, O: ProduceOp<T, C> + 'static> Producer<T, C, O> {
    /// A producer with no output metadata.
    pub fn new(op: O) -> Rc<Self> {
        Self::build(op, None)
    }

    /// A producer declaring `meta` on its output.
    pub fn with_metadata(op: O, meta: T::Meta) -> Rc<Self> {
        Self::build(op, Some(meta))
    }

    fn build(op: O, meta: Option<T::Meta>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let slf: Weak<dyn Step<T, C>> = weak.clone();
            Self {
                op,
                meta,
                slf,
                inputs: InPorts::new(0),
                outputs: OutPorts::new(1),
            }
        })
    }

    /// The single output port.
    pub fn out(&self) -> ConnectionSource<T, C> {
        self.outputs.port(&self.slf, 0)
    }

    /// The wrapped op.
    pub fn op(&self) -> &O {
        &self.op
    }
}

impl<T: Payload, C: 'static, O: ProduceOp<T, C>> Step<T, C> for Producer<T, C, O> {
    fn input_count(&self) -> usize {
        0
    }

    fn output_count(&self) -> usize {
        1
    }

    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.inputs.port(index)
    }

    fn out_metadata(&self) -> Option<T::Meta> {
        self.meta.clone()
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        self.op.as_export()
    }

    fn compute(&self, ctx: &C, _index: usize, mode: EvalMode) -> anyhow::Result<T> {
        self.op.produce(ctx, mode)
    }
}

impl<T: Payload, C: 'static, O: ProduceOp<T, C> + StepExport> StepExport for Producer<T, C, O> {
    fn export_kind(&self) -> &'static str {
        self.op.export_kind()
    }

    fn export_params(&self) -> anyhow::Result<serde_json::Value> {
        self.op.export_params()
    }

    fn boundary_marker(&self) -> bool {
        self.op.boundary_marker()
    }
}

/// 1-in/1-out template.
pub struct Transformer<T: Payload, C: 'static, O> {
    op: O,
    meta: Option<T::Meta>,
    required: bool,
    slf: Weak<dyn Step<T, C>>,
    inputs: InPorts<T, C>,
    outputs: OutPorts<T, C>,
}

impl<T: Payload, C: 'static, O: TransformOp<T, C> + 'static> Transformer<T, C, O> {
    /// A transformer whose input must be connected.
    pub fn new(op: O) -> Rc<Self> {
        Self::build(op, None, true)
    }

    /// A transformer tolerating an unconnected input: the op receives
    /// [`Payload::absent`] instead.
    pub fn optional(op: O) -> Rc<Self> {
        Self::build(op, None, false)
    }

    /// A transformer declaring `meta` on its output instead of inheriting the
    /// upstream metadata.
    pub fn with_metadata(op: O, meta: T::Meta) -> Rc<Self> {
        Self::build(op, Some(meta), true)
    }

    fn build(op: O, meta: Option<T::Meta>, required: bool) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let slf: Weak<dyn Step<T, C>> = weak.clone();
            Self {
                op,
                meta,
                required,
                slf,
                inputs: InPorts::new(1),
                outputs: OutPorts::new(1),
            }
        })
    }

    /// The single output port.
    pub fn out(&self) -> ConnectionSource<T, C> {
        self.outputs.port(&self.slf, 0)
    }

    /// The wrapped op.
    pub fn op(&self) -> &O {
        &self.op
    }
}

impl<T: Payload, C: 'static, O: TransformOp<T, C>> Step<T, C> for Transformer<T, C, O> {
    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        1
    }

    fn all_inputs_required(&self) -> bool {
        self.required
    }

    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.inputs.port(index)
    }

    fn out_metadata(&self) -> Option<T::Meta> {
        self.meta.clone().or_else(|| self.inputs.metadata(0))
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        self.op.as_export()
    }

    fn compute(&self, ctx: &C, _index: usize, mode: EvalMode) -> anyhow::Result<T> {
        let input = self.inputs.pull_one(ctx, mode, self.required)?;
        self.op.transform(ctx, input, mode)
    }
}

impl<T: Payload, C: 'static, O: TransformOp<T, C> + StepExport> StepExport
    for Transformer<T, C, O>
{
    fn export_kind(&self) -> &'static str {
        self.op.export_kind()
    }

    fn export_params(&self) -> anyhow::Result<serde_json::Value> {
        self.op.export_params()
    }

    fn boundary_marker(&self) -> bool {
        self.op.boundary_marker()
    }
}

/// 1-in/m-out template.
///
/// Each output pull re-pulls the input: there is no caching across the
/// outputs of one splitter, consistent with the rest of the core.
pub struct Splitter<T: Payload, C: 'static, O> {
    op: O,
    meta: Option<T::Meta>,
    slf: Weak<dyn Step<T, C>>,
    inputs: InPorts<T, C>,
    outputs: OutPorts<T, C>,
}

impl<T: Payload, C: 'static, O: SplitOp<T, C> + 'static> Splitter<T, C, O> {
    /// A splitter with `outputs` output ports.
    pub fn new(op: O, outputs: usize) -> Rc<Self> {
        Self::build(op, outputs, None)
    }

    /// A splitter declaring `meta` on its outputs instead of inheriting the
    /// upstream metadata.
    pub fn with_metadata(op: O, outputs: usize, meta: T::Meta) -> Rc<Self> {
        Self::build(op, outputs, Some(meta))
    }

    fn build(op: O, outputs: usize, meta: Option<T::Meta>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let slf: Weak<dyn Step<T, C>> = weak.clone();
            Self {
                op,
                meta,
                slf,
                inputs: InPorts::new(1),
                outputs: OutPorts::new(outputs),
            }
        })
    }

    /// The output port at `index`.
    pub fn out(&self, index: usize) -> ConnectionSource<T, C> {
        self.outputs.port(&self.slf, index)
    }

    /// Bind output i to the i-th target, positionally.
    pub fn connect_outputs(&self, targets: &[&ConnectionTarget<T, C>]) {
        bind_each(
            (0..self.outputs.len()).map(|i| self.out(i)),
            targets.iter().copied(),
        );
    }

    /// The wrapped op.
    pub fn op(&self) -> &O {
        &self.op
    }
}

impl<T: Payload, C: 'static, O: SplitOp<T, C>> Step<T, C> for Splitter<T, C, O> {
    fn input_count(&self) -> usize {
        1
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.inputs.port(index)
    }

    fn out_metadata(&self) -> Option<T::Meta> {
        self.meta.clone().or_else(|| self.inputs.metadata(0))
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        self.op.as_export()
    }

    fn compute(&self, ctx: &C, index: usize, mode: EvalMode) -> anyhow::Result<T> {
        let input = self.inputs.pull_one(ctx, mode, true)?;
        self.op.split(ctx, input, index, mode)
    }
}

impl<T: Payload, C: 'static, O: SplitOp<T, C> + StepExport> StepExport for Splitter<T, C, O> {
    fn export_kind(&self) -> &'static str {
        self.op.export_kind()
    }

    fn export_params(&self) -> anyhow::Result<serde_json::Value> {
        self.op.export_params()
    }

    fn boundary_marker(&self) -> bool {
        self.op.boundary_marker()
    }
}

/// n-in/1-out template.
///
/// Before computing, the merged input metadata is cross-checked: connected
/// inputs that all report metadata must agree, else the pull fails with a
/// metadata mismatch.
pub struct Merger<T: Payload, C: 'static, O> {
    op: O,
    required: bool,
    slf: Weak<dyn Step<T, C>>,
    inputs: InPorts<T, C>,
    outputs: OutPorts<T, C>,
}

impl<T: Payload, C: 'static, O: MergeOp<T, C> + 'static> Merger<T, C, O> {
    /// A merger with `inputs` input ports, all required.
    pub fn new(op: O, inputs: usize) -> Rc<Self> {
        Self::build(op, inputs, true)
    }

    /// A merger tolerating unconnected inputs: those slots arrive as
    /// [`Payload::absent`].
    pub fn optional(op: O, inputs: usize) -> Rc<Self> {
        Self::build(op, inputs, false)
    }

    fn build(op: O, inputs: usize, required: bool) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let slf: Weak<dyn Step<T, C>> = weak.clone();
            Self {
                op,
                required,
                slf,
                inputs: InPorts::new(inputs),
                outputs: OutPorts::new(1),
            }
        })
    }

    /// The single output port.
    pub fn out(&self) -> ConnectionSource<T, C> {
        self.outputs.port(&self.slf, 0)
    }

    /// The wrapped op.
    pub fn op(&self) -> &O {
        &self.op
    }
}

impl<T: Payload, C: 'static, O: MergeOp<T, C>> Step<T, C> for Merger<T, C, O> {
    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn output_count(&self) -> usize {
        1
    }

    fn all_inputs_required(&self) -> bool {
        self.required
    }

    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.inputs.port(index)
    }

    fn out_metadata(&self) -> Option<T::Meta> {
        metadata::merged(&self.inputs).ok().flatten()
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        self.op.as_export()
    }

    fn compute(&self, ctx: &C, _index: usize, mode: EvalMode) -> anyhow::Result<T> {
        metadata::merged(&self.inputs)?;
        let inputs = self.inputs.pull_all(ctx, mode, self.required)?;
        self.op.merge(ctx, inputs, mode)
    }
}

impl<T: Payload, C: 'static, O: MergeOp<T, C> + StepExport> StepExport for Merger<T, C, O> {
    fn export_kind(&self) -> &'static str {
        self.op.export_kind()
    }

    fn export_params(&self) -> anyhow::Result<serde_json::Value> {
        self.op.export_params()
    }

    fn boundary_marker(&self) -> bool {
        self.op.boundary_marker()
    }
}

/// n-in/m-out template. Metadata is cross-checked like [`Merger`].
pub struct Module<T: Payload, C: 'static, O> {
    op: O,
    slf: Weak<dyn Step<T, C>>,
    inputs: InPorts<T, C>,
    outputs: OutPorts<T, C>,
}

impl<T: Payload, C: 'static, O: ModuleOp<T, C> + 'static> Module<T, C, O> {
    /// A module with `inputs` input ports and `outputs` output ports.
    pub fn new(op: O, inputs: usize, outputs: usize) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let slf: Weak<dyn Step<T, C>> = weak.clone();
            Self {
                op,
                slf,
                inputs: InPorts::new(inputs),
                outputs: OutPorts::new(outputs),
            }
        })
    }

    /// The output port at `index`.
    pub fn out(&self, index: usize) -> ConnectionSource<T, C> {
        self.outputs.port(&self.slf, index)
    }

    /// Bind output i to the i-th target, positionally.
    pub fn connect_outputs(&self, targets: &[&ConnectionTarget<T, C>]) {
        bind_each(
            (0..self.outputs.len()).map(|i| self.out(i)),
            targets.iter().copied(),
        );
    }

    /// The wrapped op.
    pub fn op(&self) -> &O {
        &self.op
    }
}

impl<T: Payload, C: 'static, O: ModuleOp<T, C> + StepExport> StepExport for Module<T, C, O> {
    fn export_kind(&self) -> &'static str {
        self.op.export_kind()
    }

    fn export_params(&self) -> anyhow::Result<serde_json::Value> {
        self.op.export_params()
    }

    fn boundary_marker(&self) -> bool {
        self.op.boundary_marker()
    }
}

impl<T: Payload, C: 'static, O: ModuleOp<T, C>> Step<T, C> for Module<T, C, O> {
    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn in_port(&self, index: usize) -> &ConnectionTarget<T, C> {
        self.inputs.port(index)
    }

    fn out_metadata(&self) -> Option<T::Meta> {
        metadata::merged(&self.inputs).ok().flatten()
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        self.op.as_export()
    }

    fn compute(&self, ctx: &C, index: usize, mode: EvalMode) -> anyhow::Result<T> {
        metadata::merged(&self.inputs)?;
        let inputs = self.inputs.pull_all(ctx, mode, true)?;
        self.op.run(ctx, inputs, index, mode)
    }
}
