#![cfg(feature = "tables")]

use std::fs::File;
use std::rc::Rc;

use serde_json::json;
use stepflow::tables::{
    BatchContext, Column, DType, InMemoryEngine, RowPredicate, TableBatch, TableSchema,
    filter_rows, inner_input, inner_output, load_table, registry, split_rows, union_tables,
    write_table,
};
use stepflow::{
    ExportPolicy, ProduceFn, Producer, Step, StepError, export_tree, export_value,
};

fn sample_schema() -> TableSchema {
    TableSchema::new(vec![
        Column::new("name", DType::Text),
        Column::new("n", DType::Int),
    ])
}

fn sample_batch() -> TableBatch {
    TableBatch::new(
        sample_schema(),
        vec![
            vec![json!("a"), json!(1)],
            vec![json!("b"), json!(2)],
            vec![json!("c"), json!(3)],
        ],
    )
}

fn ctx() -> BatchContext {
    BatchContext::new(Rc::new(InMemoryEngine::new()), 100)
}

#[test]
fn value_export_has_kind_and_params() -> anyhow::Result<()> {
    let step = filter_rows(RowPredicate::Odd { column: 1 });
    let export = export_value(step.as_ref(), ExportPolicy::default())?;

    assert_eq!(export["kind"], "filter_rows");
    assert_eq!(export["params"]["predicate"]["odd"]["column"], 1);
    Ok(())
}

#[test]
fn value_export_revives_every_table_kind() -> anyhow::Result<()> {
    let registry = registry();
    let steps: Vec<Rc<dyn stepflow::ExportStep<TableBatch, BatchContext>>> = vec![
        load_table(sample_batch()),
        filter_rows(RowPredicate::Gt {
            column: 1,
            value: 1.5,
        }),
        union_tables(3),
        split_rows(0.5),
        write_table("out"),
        // Boundary markers are ordinary kinds under the default policy.
        inner_input(),
        inner_output(),
    ];

    for step in steps {
        let export = export_value(step.as_ref(), ExportPolicy::default())?;
        let revived = registry.revive(&export)?;
        // Round-trip is structural: the revived step exports identically.
        let again = export_value(revived.as_ref(), ExportPolicy::default())?;
        assert_eq!(export, again);
    }
    Ok(())
}

#[test]
fn revived_merger_keeps_its_arity() -> anyhow::Result<()> {
    let export = export_value(union_tables(4).as_ref(), ExportPolicy::default())?;
    let revived = registry().revive(&export)?;
    assert_eq!(revived.input_count(), 4);
    Ok(())
}

#[test]
fn unknown_kind_is_rejected() {
    let err = registry()
        .revive(&json!({ "kind": "no_such_step", "params": {} }))
        .unwrap_err();
    assert!(err.to_string().contains("no_such_step"));
}

#[test]
fn boundary_markers_export_by_default() -> anyhow::Result<()> {
    let step = inner_input();
    let export = export_value(step.as_ref(), ExportPolicy::default())?;
    assert_eq!(export["kind"], "inner_input");
    Ok(())
}

#[test]
fn policy_can_reject_boundary_markers() {
    let step = inner_input();
    let err = export_value(step.as_ref(), ExportPolicy::reject_boundary()).unwrap_err();
    assert!(matches!(
        err,
        StepError::SerializationDisabled { ref kind } if kind == "inner_input"
    ));

    // Ordinary steps are unaffected by the stricter policy.
    let ok = export_value(
        filter_rows(RowPredicate::NotNull { column: 0 }).as_ref(),
        ExportPolicy::reject_boundary(),
    );
    assert!(ok.is_ok());
}

#[test]
fn tree_export_records_wiring() -> anyhow::Result<()> {
    let load = load_table(sample_batch());
    let filter = filter_rows(RowPredicate::Odd { column: 1 });
    let write = write_table("odd");
    load.out().connect_to(filter.in_port(0));
    filter.out().connect_to(write.in_port(0));

    let tree = export_tree(write.as_ref(), ExportPolicy::default())?;
    assert_eq!(tree.kind, "write_table");
    assert_eq!(tree.inputs.len(), 1);
    assert_eq!(tree.inputs[0].port, 0);
    assert_eq!(tree.inputs[0].source_port, 0);
    assert_eq!(tree.inputs[0].node.kind, "filter_rows");
    assert_eq!(tree.inputs[0].node.inputs[0].node.kind, "load_table");
    Ok(())
}

#[test]
fn tree_export_records_splitter_output_ports() -> anyhow::Result<()> {
    let load = load_table(sample_batch());
    let split = split_rows(0.5);
    let head = write_table("head");
    let tail = write_table("tail");
    load.out().connect_to(split.in_port(0));
    split.out(0).connect_to(head.in_port(0));
    split.out(1).connect_to(tail.in_port(0));

    let tree = export_tree(tail.as_ref(), ExportPolicy::default())?;
    assert_eq!(tree.inputs[0].source_port, 1);
    Ok(())
}

#[test]
fn tree_round_trips_through_a_file_and_reevaluates() -> anyhow::Result<()> {
    let load = load_table(sample_batch());
    let filter = filter_rows(RowPredicate::Odd { column: 1 });
    load.out().connect_to(filter.in_port(0));
    let expected = filter.output(&ctx())?;

    let tree = export_tree(filter.as_ref(), ExportPolicy::default())?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pipeline.json");
    serde_json::to_writer_pretty(File::create(&path)?, &tree)?;

    let loaded: stepflow::ExportNode = serde_json::from_reader(File::open(&path)?)?;
    assert_eq!(loaded, tree);

    let revived = registry().revive_tree(&loaded)?;
    assert_eq!(revived.output(&ctx())?, expected);
    assert_eq!(expected.len(), 2);
    Ok(())
}

#[test]
fn closure_steps_are_not_exportable() {
    let step: Rc<Producer<TableBatch, BatchContext, _>> =
        Producer::new(ProduceFn(|_: &BatchContext, _| -> anyhow::Result<TableBatch> {
            Ok(TableBatch::default())
        }));

    let err = export_tree(step.as_ref(), ExportPolicy::default()).unwrap_err();
    assert!(matches!(err, StepError::Execution(_)));
    assert!(err.to_string().contains("not exportable"));
}
