//! End-to-end table pipeline walkthrough.
//!
//! Builds a small load → filter → split graph, pulls it in full and in
//! preview mode, then exports the wiring to JSON and revives it through the
//! registry.
//!
//! Run with: cargo run --example table_pipeline

use std::rc::Rc;

use anyhow::Result;
use serde_json::json;
use stepflow::tables::*;
use stepflow::{EvalMode, ExportPolicy, Step, export_tree};

fn main() -> Result<()> {
    let engine = Rc::new(InMemoryEngine::new());
    let ctx = BatchContext::new(Rc::clone(&engine) as Rc<dyn TableEngine>, 2);

    let schema = TableSchema::new(vec![
        Column::new("city", DType::Text),
        Column::new("population", DType::Int),
    ]);
    let cities = TableBatch::new(
        schema,
        vec![
            vec![json!("Reykjavik"), json!(139_875)],
            vec![json!("Valletta"), json!(5_157)],
            vec![json!("Vaduz"), json!(5_696)],
            vec![json!("Luxembourg"), json!(132_780)],
        ],
    );

    // load -> filter (population > 100k) -> split 50/50 -> write both halves
    let load = load_table(cities);
    let big = filter_rows(RowPredicate::Gt {
        column: 1,
        value: 100_000.0,
    });
    let split = split_rows(0.5);
    let head = write_table("head");
    let tail = write_table("tail");

    load.out().connect_to(big.in_port(0));
    big.out().connect_to(split.in_port(0));
    split.out(0).connect_to(head.in_port(0));
    split.out(1).connect_to(tail.in_port(0));

    // Nothing has run yet. Preview the load without touching the sinks.
    let sample = load.output_with(&ctx, EvalMode::Preview)?;
    println!("preview of the source ({} rows):", sample.len());
    for row in &sample.rows {
        println!("  {row:?}");
    }

    // Pull both terminal steps; each pull re-evaluates its chain.
    let first = head.output(&ctx)?;
    let rest = tail.output(&ctx)?;
    println!("head half: {} rows, tail half: {} rows", first.len(), rest.len());
    println!("sink now holds: {:?}", engine.written("head").map(|t| t.len()));

    // Persist the wiring and bring it back through the registry.
    let tree = export_tree(head.as_ref(), ExportPolicy::default())?;
    let serialized = serde_json::to_string_pretty(&tree)?;
    println!("exported pipeline:\n{serialized}");

    let revived = registry().revive_tree(&tree)?;
    let replayed = revived.output(&ctx)?;
    println!("revived pipeline produced {} rows", replayed.len());

    Ok(())
}
