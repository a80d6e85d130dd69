#![cfg(feature = "tables")]

use std::rc::Rc;

use serde_json::json;
use stepflow::tables::{
    BatchContext, Column, DType, InMemoryEngine, RowPredicate, TableBatch, TableSchema,
    filter_rows, inner_input, inner_output, load_table, split_rows, union_tables, write_table,
};
use stepflow::{EvalMode, Step, StepError};

fn schema() -> TableSchema {
    TableSchema::new(vec![
        Column::new("name", DType::Text),
        Column::new("n", DType::Int),
    ])
}

fn batch(rows: Vec<Vec<serde_json::Value>>) -> TableBatch {
    TableBatch::new(schema(), rows)
}

fn four_rows() -> TableBatch {
    batch(vec![
        vec![json!("a"), json!(1)],
        vec![json!("b"), json!(2)],
        vec![json!("c"), json!(3)],
        vec![json!("d"), json!(4)],
    ])
}

#[test]
fn load_filter_write_chain() -> anyhow::Result<()> {
    let engine = Rc::new(InMemoryEngine::new());
    let ctx = BatchContext::new(Rc::clone(&engine) as Rc<dyn stepflow::tables::TableEngine>, 100);

    let load = load_table(four_rows());
    let filter = filter_rows(RowPredicate::Odd { column: 1 });
    let write = write_table("odd_rows");
    load.out().connect_to(filter.in_port(0));
    filter.out().connect_to(write.in_port(0));

    assert!(engine.written("odd_rows").is_none());

    let out = write.output(&ctx)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out.rows[0][0], json!("a"));
    assert_eq!(out.rows[1][0], json!("c"));

    // The write is a pass-through with a side effect into the sink.
    assert_eq!(engine.written("odd_rows"), Some(out));
    Ok(())
}

#[test]
fn preview_caps_loaded_rows() -> anyhow::Result<()> {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 2);
    let load = load_table(four_rows());

    assert_eq!(load.output(&ctx)?.len(), 4);
    assert_eq!(load.output_with(&ctx, EvalMode::Preview)?.len(), 2);
    Ok(())
}

#[test]
fn preview_flows_through_a_chain() -> anyhow::Result<()> {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 1);

    let load = load_table(batch(vec![
        vec![json!("a"), json!(1)],
        vec![json!("b"), json!(2)],
    ]));
    let filter = filter_rows(RowPredicate::Odd { column: 1 });
    load.out().connect_to(filter.in_port(0));

    let full = filter.output(&ctx)?;
    assert_eq!(full.rows, vec![vec![json!("a"), json!(1)]]);

    let preview = filter.output_with(&ctx, EvalMode::Preview)?;
    assert!(preview.len() <= 1);
    assert_eq!(preview, full);
    Ok(())
}

#[test]
fn schema_propagates_as_metadata() {
    let load = load_table(four_rows());
    let filter = filter_rows(RowPredicate::NotNull { column: 0 });
    load.out().connect_to(filter.in_port(0));

    assert_eq!(filter.out_metadata(), Some(schema()));
}

#[test]
fn union_concatenates_in_port_order() -> anyhow::Result<()> {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 100);

    let left = load_table(batch(vec![vec![json!("a"), json!(1)]]));
    let right = load_table(batch(vec![vec![json!("b"), json!(2)]]));
    let union = union_tables(2);
    left.out().connect_to(union.in_port(0));
    right.out().connect_to(union.in_port(1));

    let out = union.output(&ctx)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out.rows[0][0], json!("a"));
    assert_eq!(out.rows[1][0], json!("b"));
    Ok(())
}

#[test]
fn union_rejects_disagreeing_schemas() {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 100);

    let other_schema = TableSchema::new(vec![Column::new("x", DType::Float)]);
    let left = load_table(four_rows());
    let right = load_table(TableBatch::new(other_schema, vec![vec![json!(1.5)]]));
    let union = union_tables(2);
    left.out().connect_to(union.in_port(0));
    right.out().connect_to(union.in_port(1));

    let err = union.output(&ctx).unwrap_err();
    assert!(matches!(err, StepError::MetadataMismatch { .. }));
}

#[test]
fn split_rows_head_and_remainder() -> anyhow::Result<()> {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 100);

    let load = load_table(four_rows());
    let split = split_rows(0.5);
    load.out().connect_to(split.in_port(0));

    let head = split.output_at(&ctx, 0, EvalMode::Full)?;
    let tail = split.output_at(&ctx, 1, EvalMode::Full)?;
    assert_eq!(head.len(), 2);
    assert_eq!(tail.len(), 2);
    assert_eq!(head.rows[0][0], json!("a"));
    assert_eq!(tail.rows[0][0], json!("c"));
    Ok(())
}

#[test]
fn split_fraction_validated_by_engine() {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 100);

    let load = load_table(four_rows());
    let split = split_rows(1.5);
    load.out().connect_to(split.in_port(0));

    let err = split.output(&ctx).unwrap_err();
    assert!(matches!(err, StepError::Execution(_)));
    assert!(err.to_string().contains("fraction"));
}

#[test]
fn predicate_matching() {
    let row = vec![json!("a"), json!(3), json!(null)];

    assert!(RowPredicate::Eq { column: 0, value: json!("a") }.matches(&row));
    assert!(!RowPredicate::Eq { column: 0, value: json!("b") }.matches(&row));
    assert!(RowPredicate::Gt { column: 1, value: 2.5 }.matches(&row));
    assert!(!RowPredicate::Gt { column: 1, value: 3.0 }.matches(&row));
    assert!(RowPredicate::Odd { column: 1 }.matches(&row));
    assert!(!RowPredicate::NotNull { column: 2 }.matches(&row));
    // Out-of-range and mistyped cells never match.
    assert!(!RowPredicate::Odd { column: 0 }.matches(&row));
    assert!(!RowPredicate::NotNull { column: 9 }.matches(&row));
}

#[test]
fn inner_boundary_embeds_a_subgraph() -> anyhow::Result<()> {
    let ctx = BatchContext::new(Rc::new(InMemoryEngine::new()), 100);

    // entry -> filter -> exit, driven by feeding the entry by hand.
    let entry = inner_input();
    let filter = filter_rows(RowPredicate::Odd { column: 1 });
    let exit = inner_output();
    entry.out().connect_to(filter.in_port(0));
    filter.out().connect_to(exit.in_port(0));

    // Unfed, the boundary refuses to produce.
    let err = exit.output(&ctx).unwrap_err();
    assert!(matches!(err, StepError::Execution(_)));

    entry.op().feed(four_rows());
    assert_eq!(exit.output(&ctx)?.len(), 2);
    Ok(())
}
