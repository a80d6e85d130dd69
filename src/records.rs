//! Record-stream instantiation of the step core.
//!
//! The second proof that the core is genuinely generic: here the payload is a
//! [`RecordStream`] of loose JSON records, the metadata is an ordered
//! field-name → type-name map, and the context is a bare [`StreamContext`]
//! with a preview cap. Same templates, same wiring, same error envelope.

use crate::export::{ExportStep, StepExport, StepRegistry};
use crate::step::{EvalMode, Payload};
use crate::templates::{MergeOp, Merger, ProduceOp, Producer, TransformOp, Transformer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// One loose record: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Propagated stream metadata: field name to type name, ordered.
pub type RecordSchema = BTreeMap<String, String>;

/// A batch-shaped stream of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStream {
    pub records: Vec<Record>,
}

impl RecordStream {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Payload for RecordStream {
    type Meta = RecordSchema;

    fn absent() -> Self {
        Self::default()
    }
}

/// Runtime context for record steps.
pub struct StreamContext {
    /// Record cap honored by preview pulls.
    pub preview_limit: usize,
}

impl StreamContext {
    pub fn new(preview_limit: usize) -> Self {
        Self { preview_limit }
    }
}

/// Field-level test applied by [`KeepWhere`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTest {
    /// Field, read as an integer, is odd.
    OddInt,
    /// Field equals the given value.
    Equals(Value),
    /// Field is present and non-null.
    Exists,
}

impl FieldTest {
    /// Evaluate against one record's `field`. Missing or mistyped fields
    /// never match.
    pub fn matches(&self, record: &Record, field: &str) -> bool {
        let value = record.get(field);
        match self {
            FieldTest::OddInt => value.and_then(Value::as_i64).is_some_and(|v| v % 2 != 0),
            FieldTest::Equals(expected) => value == Some(expected),
            FieldTest::Exists => value.is_some_and(|v| !v.is_null()),
        }
    }
}

// ---- Concrete step ops ----

/// Produces a fixed set of records; preview pulls are capped at the context's
/// record limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitRecords {
    pub records: Vec<Record>,
    pub schema: Option<RecordSchema>,
}

impl ProduceOp<RecordStream, StreamContext> for EmitRecords {
    fn produce(&self, ctx: &StreamContext, mode: EvalMode) -> anyhow::Result<RecordStream> {
        let mut records = self.records.clone();
        if mode.is_preview() {
            records.truncate(ctx.preview_limit);
        }
        Ok(RecordStream::new(records))
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for EmitRecords {
    fn export_kind(&self) -> &'static str {
        "emit_records"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Keeps records whose `field` passes `test`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepWhere {
    pub field: String,
    pub test: FieldTest,
}

impl TransformOp<RecordStream, StreamContext> for KeepWhere {
    fn transform(
        &self,
        _ctx: &StreamContext,
        mut input: RecordStream,
        _mode: EvalMode,
    ) -> anyhow::Result<RecordStream> {
        input
            .records
            .retain(|record| self.test.matches(record, &self.field));
        Ok(input)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for KeepWhere {
    fn export_kind(&self) -> &'static str {
        "keep_where"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Keeps the first `count` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Take {
    pub count: usize,
}

impl TransformOp<RecordStream, StreamContext> for Take {
    fn transform(
        &self,
        _ctx: &StreamContext,
        mut input: RecordStream,
        _mode: EvalMode,
    ) -> anyhow::Result<RecordStream> {
        input.records.truncate(self.count);
        Ok(input)
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for Take {
    fn export_kind(&self) -> &'static str {
        "take"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Concatenates its input streams in port order. Schemas are cross-checked as
/// metadata by the merger shape before this op ever runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStreams {
    pub inputs: usize,
}

impl MergeOp<RecordStream, StreamContext> for MergeStreams {
    fn merge(
        &self,
        _ctx: &StreamContext,
        inputs: Vec<RecordStream>,
        _mode: EvalMode,
    ) -> anyhow::Result<RecordStream> {
        let mut records = Vec::new();
        for stream in inputs {
            records.extend(stream.records);
        }
        Ok(RecordStream::new(records))
    }

    fn as_export(&self) -> Option<&dyn StepExport> {
        Some(self)
    }
}

impl StepExport for MergeStreams {
    fn export_kind(&self) -> &'static str {
        "merge_streams"
    }

    fn export_params(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---- Step constructors ----

/// A producer emitting `records`, declaring `schema` as output metadata when
/// given.
pub fn emit_records(
    records: Vec<Record>,
    schema: Option<RecordSchema>,
) -> Rc<Producer<RecordStream, StreamContext, EmitRecords>> {
    match schema {
        Some(meta) => Producer::with_metadata(
            EmitRecords {
                records,
                schema: Some(meta.clone()),
            },
            meta,
        ),
        None => Producer::new(EmitRecords {
            records,
            schema: None,
        }),
    }
}

/// A transformer keeping records whose `field` passes `test`.
pub fn keep_where(
    field: impl Into<String>,
    test: FieldTest,
) -> Rc<Transformer<RecordStream, StreamContext, KeepWhere>> {
    Transformer::new(KeepWhere {
        field: field.into(),
        test,
    })
}

/// A transformer keeping the first `count` records.
pub fn take(count: usize) -> Rc<Transformer<RecordStream, StreamContext, Take>> {
    Transformer::new(Take { count })
}

/// A merger concatenating `inputs` streams.
pub fn merge_streams(inputs: usize) -> Rc<Merger<RecordStream, StreamContext, MergeStreams>> {
    Merger::new(MergeStreams { inputs }, inputs)
}

/// A registry covering every step kind in this module.
pub fn registry() -> StepRegistry<RecordStream, StreamContext> {
    let mut r = StepRegistry::new();
    r.register("emit_records", |params| {
        let op: EmitRecords = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<RecordStream, StreamContext>> =
            emit_records(op.records, op.schema);
        Ok(step)
    });
    r.register("keep_where", |params| {
        let op: KeepWhere = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<RecordStream, StreamContext>> = Transformer::new(op);
        Ok(step)
    });
    r.register("take", |params| {
        let op: Take = serde_json::from_value(params.clone())?;
        let step: Rc<dyn ExportStep<RecordStream, StreamContext>> = Transformer::new(op);
        Ok(step)
    });
    r.register("merge_streams", |params| {
        let op: MergeStreams = serde_json::from_value(params.clone())?;
        let inputs = op.inputs;
        let step: Rc<dyn ExportStep<RecordStream, StreamContext>> = Merger::new(op, inputs);
        Ok(step)
    });
    r
}
