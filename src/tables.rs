//! Table-batch instantiation of the step core.
//!
//! The payload is a [`TableBatch`] — a schema plus rows of JSON cells — and
//! the runtime context is a [`BatchContext`] carrying the engine that actually
//! executes filters, unions and writes. The steps here are deliberately thin:
//! each `compute` is a one-line delegation into the [`TableEngine`] seam, and
//! all the interesting behavior (lazy pulls, arity checks, error wrapping,
//! metadata checks) comes from the generic core.
//!
//! [`InMemoryEngine`] is the reference engine, good enough for tests and small
//! jobs; production deployments implement [`TableEngine`] over a real backend.

use crate::export::{ExportStep, StepExport, StepRegistry};
use crate::step::{EvalMode, Payload};
use crate::templates::{
    MergeOp, Merger, ProduceOp, Producer, SplitOp, Splitter, TransformOp, Transformer,
};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Column type of a table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Int,
    Float,
    Text,
    Bool,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// The schema of a table batch; doubles as the propagated metadata type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Index of the named column, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A batch of rows with a shared schema. Cells are JSON values; the engine,
/// not this crate, is responsible for honoring the declared column types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBatch {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Value>>,
}

impl TableBatch {
    pub fn new(schema: TableSchema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Payload for TableBatch {
    type Meta = TableSchema;

    fn absent() -> Self {
        Self::default()
    }
}

/// Row predicate evaluated by the engine during a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPredicate {
    /// Cell equals the given value.
    Eq { column: usize, value: Value },
    /// Cell, read as a float, is strictly greater.
    Gt { column: usize, value: f64 },
    /// Cell, read as an integer, is odd.
    Odd { column: usize },
    /// Cell is present and non-null.
    NotNull { column: usize },
}

impl RowPredicate {
    /// Evaluate against one row. Missing or mistyped cells never match.
    pub fn matches(&self, row: &[Value]) -> bool {
        match self {
            RowPredicate::Eq { column, value } => row.get(*column) == Some(value),
            RowPredicate::Gt { column, value } => row
                .get(*column)
                .and_then(Value::as_f64)
                .is_some_and(|v| v > *value),
            RowPredicate::Odd { column } => row
                .get(*column)
                .and_then(Value::as_i64)
                .is_some_and(|v| v % 2 != 0),
            RowPredicate::NotNull { column } => {
                row.get(*column).is_some_and(|v| !v.is_null())
            }
        }
    }
}

/// The external compute-engine seam. Steps never inspect table contents
/// themselves; they hand batches to whatever implements this.
pub trait TableEngine {
    /// Keep the rows matching `predicate`.
    fn filter(&self, table: TableBatch, predicate: &RowPredicate) -> anyhow::Result<TableBatch>;

    /// Concatenate batches; callers guarantee schema agreement upstream.
    fn union(&self, tables: Vec<TableBatch>) -> anyhow::Result<TableBatch>;

    /// Deterministic two-way split: part 0 is the first `fraction` of rows,
    /// part 1 the remainder.
    fn split(&self, table: TableBatch, fraction: f64, part: usize) -> anyhow::Result<TableBatch>;

    /// Truncate to at most `rows` rows.
    fn limit(&self, table: TableBatch, rows: usize) -> anyhow::Result<TableBatch>;

    /// Persist the batch under a named target (a collection, topic, path...).
    fn write(&self, table: &TableBatch, target: &str) -> anyhow::Result<()>;
}

/// Reference engine: everything in process, writes into a named in-memory sink.
#[derive(Default)]
pub struct InMemoryEngine {
    sink: RefCell<HashMap<String, TableBatch>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The batch last written under `target`, if any.
    pub fn written(&self, target: &str) -> Option<TableBatch> {
        self.sink.borrow().get(target).cloned()
    }
}

impl TableEngine for InMemoryEngine {
    fn filter(&self, mut table: TableBatch, predicate: &RowPredicate) -> anyhow::Result<TableBatch> {
        table.rows.retain(|row| predicate.matches(row));
        Ok(table)
    }

    fn union(&self, tables: Vec<TableBatch>) -> anyhow::Result<TableBatch> {
        let mut tables = tables.into_iter();
        let Some(mut first) = tables.next() else {
            bail!("union of zero tables");
        };
        for table in tables {
            first.rows.extend(table.rows);
        }
        Ok(first)
    }

    fn split(&self, mut table: TableBatch, fraction: f64, part: usize) -> anyhow::Result<TableBatch> {
        if !(0.0..=1.0).contains(&fraction) {
            bail!("split fraction {fraction} outside [0, 1]");
        }
        let cut = (table.rows.len() as f64 * fraction).round() as usize;
        match part {
            0 => {
                table.rows.truncate(cut);
                Ok(table)
            }
            1 => {
                table.rows.drain(..cut);
                Ok(table)
            }
            other => bail!("split part {other} out of range (expected 0 or 1)"),
        }
    }

    fn limit(&self, mut table: TableBatch, rows: usize) -> anyhow::Result<TableBatch> {
        table.rows.truncate(rows);
        Ok(table)
    }

    fn write(&self, table: &TableBatch, target: &str) -> anyhow::Result<()> {
        self.sink.borrow_mut().insert(target.to_string(), table.clone());
        Ok(())
    }
}

/// Runtime context for table steps: the engine plus the preview row cap.
pub struct BatchContext {
    pub engine: Rc<dyn TableEngine>,
    pub preview_rows: usize,
}

impl BatchContext {
    pub fn new(engine: Rc<dyn TableEngine>, preview_rows: usize) -> Self {
        Self {
            engine,
            preview_rows,
        }
    }
}

// ---- Concrete step ops ----

/// Produces a fixed table; preview pulls are capped at the context's row limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTable {
    pub table: TableBatch,
}

impl ProduceOp<TableBatch, BatchContext> for LoadTable {
    fn produce(&self, ctx: &BatchContext, mode: EvalMode) -> anyhow::Result<TableBatch> {
        if mode.is_preview() {
            ctx.engine.limit(self.table.clone(), ctx.preview_rows)
        } else {
            Ok(self.table.clone())
        }
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for LoadTable {
    fn export_kind(&self) -> &'static str {
        "load_table"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Keeps rows matching a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRows {
    pub predicate: RowPredicate,
}

impl TransformOp<TableBatch, BatchContext> for FilterRows {
    fn transform(
        &self,
        ctx: &BatchContext,
        input: TableBatch,
        _mode: EvalMode,
    ) -> anyhow::Result<TableBatch> {
        ctx.engine.filter(input, &self.predicate)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for FilterRows {
    fn export_kind(&self) -> &'static str {
        "filter_rows"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Concatenates its inputs. Schemas are cross-checked as metadata by the
/// merger shape before this op ever runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionTables {
    pub inputs: usize,
}

impl MergeOp<TableBatch, BatchContext> for UnionTables {
    fn merge(
        &self,
        ctx: &BatchContext,
        inputs: Vec<TableBatch>,
        _mode: EvalMode,
    ) -> anyhow::Result<TableBatch> {
        ctx.engine.union(inputs)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for UnionTables {
    fn export_kind(&self) -> &'static str {
        "union_tables"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Two-way deterministic split by fraction: output 0 is the head, output 1 the
/// remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRows {
    pub fraction: f64,
}

impl SplitOp<TableBatch, BatchContext> for SplitRows {
    fn split(
        &self,
        ctx: &BatchContext,
        input: TableBatch,
        out_index: usize,
        _mode: EvalMode,
    ) -> anyhow::Result<TableBatch> {
        ctx.engine.split(input, self.fraction, out_index)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for SplitRows {
    fn export_kind(&self) -> &'static str {
        "split_rows"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Writes the batch to a named target and passes it through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteTable {
    pub target: String,
}

impl TransformOp<TableBatch, BatchContext> for WriteTable {
    fn transform(
        &self,
        ctx: &BatchContext,
        input: TableBatch,
        _mode: EvalMode,
    ) -> anyhow::Result<TableBatch> {
        ctx.engine.write(&input, &self.target)?;
        Ok(input)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for WriteTable {
    fn export_kind(&self) -> &'static str {
        "write_table"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Boundary marker: the entry of an embedded subgraph. Produces whatever was
/// fed into it; the fed batch is runtime state and is never exported.
#[derive(Debug, Default)]
pub struct InnerInput {
    cell: RefCell<Option<TableBatch>>,
}

impl InnerInput {
    /// Feed the batch the next pull will return.
    pub fn feed(&self, table: TableBatch) {
        *self.cell.borrow_mut() = Some(table);
    }
}

impl ProduceOp<TableBatch, BatchContext> for InnerInput {
    fn produce(&self, _ctx: &BatchContext, _mode: EvalMode) -> anyhow::Result<TableBatch> {
        self.cell
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("inner input has not been fed"))
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for InnerInput {
    fn export_kind(&self) -> &'static str {
        "inner_input"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::json!({}))
    }

    fn boundary_marker(&self) -> bool {
        true
    }
}

/// Boundary marker: the exit of an embedded subgraph. Pass-through.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InnerOutput;

impl TransformOp<TableBatch, BatchContext> for InnerOutput {
    fn transform(
        &self,
        _ctx: &BatchContext,
        input: TableBatch,
        _mode: EvalMode,
    ) -> anyhow::Result<TableBatch> {
        Ok(input)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for InnerOutput {
    fn export_kind(&self) -> &'static str {
        "inner_output"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::json!({}))
    }

    fn boundary_marker(&self) -> bool {
        true
    }
}

// ---- Step constructors ----

/// A producer emitting `table`, with the table's schema as output metadata.
pub fn load_table(table: TableBatch) -> Rc<Producer<TableBatch, BatchContext, LoadTable>> {
    let meta = table.schema.clone();
    Producer::with_metadata(LoadTable { table }, meta)
}

/// A transformer keeping rows that match `predicate`.
pub fn filter_rows(
    predicate: RowPredicate,
) -> Rc<Transformer<TableBatch, BatchContext, FilterRows>> {
    Transformer::new(FilterRows { predicate })
}

/// A merger concatenating `inputs` tables.
pub fn union_tables(inputs: usize) -> Rc<Merger<TableBatch, BatchContext, UnionTables>> {
    Merger::new(UnionTables { inputs }, inputs)
}

/// A two-output splitter: head fraction and remainder.
pub fn split_rows(fraction: f64) -> Rc<Splitter<TableBatch, BatchContext, SplitRows>> {
    Splitter::new(SplitRows { fraction }, 2)
}

/// A pass-through transformer writing its input under `target`.
pub fn write_table(
    target: impl Into<String>,
) -> Rc<Transformer<TableBatch, BatchContext, WriteTable>> {
    Transformer::new(WriteTable {
        target: target.into(),
    })
}

/// An unfed boundary-marker producer.
pub fn inner_input() -> Rc<Producer<TableBatch, BatchContext, InnerInput>> {
    Producer::new(InnerInput::default())
}

/// A boundary-marker pass-through transformer.
pub fn inner_output() -> Rc<Transformer<TableBatch, BatchContext, InnerOutput>> {
    Transformer::new(InnerOutput)
}

/// A registry covering every step kind in this module.
pub fn registry() -> StepRegistry<TableBatch, BatchContext> {
    let mut r = StepRegistry::new();
    r.register("load_table", |params| {
        let op: LoadTable = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = load_table(op.table);
        Ok(step)
    });
    r.register("filter_rows", |params| {
        let op: FilterRows = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = Transformer::new(op);
        Ok(step)
    });
    r.register("union_tables", |params| {
        let op: UnionTables = serde_json::from_value(params.clone())?;
        let inputs = op.inputs;
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = Merger::new(op, inputs);
        Ok(step)
    });
    r.register("split_rows", |params| {
        let op: SplitRows = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = Splitter::new(op, 2);
        Ok(step)
    });
    r.register("write_table", |params| {
        let op: WriteTable = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = Transformer::new(op);
        Ok(step)
    });
    r.register("inner_input", |_params| {
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = inner_input();
        Ok(step)
    });
    r.register("inner_output", |_params| {
        let step: Rc<dyn ExportStep<TableBatch, BatchContext>> = inner_output();
        Ok(step)
    });
    r
}
