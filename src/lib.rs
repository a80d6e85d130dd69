//! # Stepflow
//!
//! A **typed step/port/connection graph core** for building lazily evaluated
//! data pipelines in Rust. Stepflow gives heterogeneous processing nodes a
//! uniform shape — fixed arity, addressable ports, pull-based evaluation,
//! one error envelope — while staying completely agnostic about what flows on
//! the wires and what engine does the actual work.
//!
//! ## Key Features
//!
//! - **Generic over payload and context** - one core, instantiated for table
//!   batches, record streams, or anything else you define
//! - **Pull-based lazy evaluation** - nothing runs until a downstream step
//!   asks for output; upstream pulls happen recursively on the same stack
//! - **Typed wiring** - connecting a source to a target of a different
//!   payload type is a compile error, not a runtime surprise
//! - **Topology templates** - Producer, Transformer, Splitter, Merger and
//!   Module shapes narrow the generic `compute` to a natural signature
//! - **Uniform error envelope** - every uncategorized compute failure is
//!   wrapped exactly once into an execution-failure kind, never nested
//! - **Metadata propagation** - optional schema descriptors travel along the
//!   wiring without evaluating anything, and merge points cross-check them
//! - **Structured export** - every concrete step serializes its configuration
//!   to a value or tree form and revives through a registry
//!
//! ## Quick Start
//!
//! ```ignore
//! use stepflow::tables::*;
//! use stepflow::{EvalMode, Step};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = Rc::new(InMemoryEngine::new());
//! let ctx = BatchContext::new(engine, 100);
//!
//! // Wire: load -> filter odd -> write
//! let schema = TableSchema::new(vec![
//!     Column::new("name", DType::Text),
//!     Column::new("n", DType::Int),
//! ]);
//! let load = load_table(TableBatch::new(schema, vec![
//!     vec![json!("a"), json!(1)],
//!     vec![json!("b"), json!(2)],
//! ]));
//! let filter = filter_rows(RowPredicate::Odd { column: 1 });
//! let write = write_table("odd_rows");
//!
//! load.out().connect_to(filter.in_port(0));
//! filter.out().connect_to(write.in_port(0));
//!
//! // Nothing has run yet. Pulling the terminal step evaluates the chain.
//! let result = write.output(&ctx)?;
//! assert_eq!(result.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Step
//!
//! A [`Step`] is a node with a fixed number of input and output ports,
//! parameterized over the payload type `T` flowing on wires and the runtime
//! context `C` needed to evaluate it. Concrete steps implement
//! [`compute`](Step::compute); callers use [`output`](Step::output) and
//! friends, which validate the output index and wrap failures uniformly.
//!
//! ### Ports and connections
//!
//! A [`ConnectionSource`] is an output port, a [`ConnectionTarget`] an input
//! port. A target holds at most one inbound edge, and binding it again
//! silently replaces the previous edge — last bind wins. A source may fan out
//! to any number of targets. Port objects are lazily built and memoized
//! ([`LazySlots`]), so `step.in_port(0)` is the same object on every call.
//!
//! ### Evaluation model
//!
//! Evaluation is synchronous, single-threaded and pull-based. There is no
//! caching of compute results across pulls: a step feeding two consumers runs
//! twice. That is a deliberate statelessness choice, not an oversight — the
//! core stays free of hidden state, and callers who need sharing cache
//! externally. Do not "fix" it by memoizing outputs.
//!
//! Preview pulls ([`EvalMode::Preview`]) advise steps to produce a bounded
//! sample instead of the full result; a step may ignore the flag but must
//! never return more than the full result.
//!
//! ### Metadata
//!
//! Steps may attach a schema-like descriptor to their output
//! ([`Payload::Meta`]). Descriptors propagate along the wiring without
//! evaluating data. Merge-shaped steps cross-check them: all present and
//! equal yields the common value, any absent yields none, and a disagreement
//! fails the pull with a metadata mismatch.
//!
//! ### Export
//!
//! Every concrete step renders its construction parameters into a value
//! export or a tree export of its upstream chain, and a [`StepRegistry`]
//! revives both. A policy flag passed into every export entry point (never
//! ambient process state) can refuse to serialize graph-boundary markers.
//!
//! ## Instantiations
//!
//! The core is instantiated twice in this crate, which is the point — it is a
//! generic abstraction, not a single hardwired pipeline:
//!
//! - [`tables`] (feature `tables`): batches of schema'd rows, evaluated
//!   through a pluggable [`tables::TableEngine`]
//! - [`records`] (feature `records`): streams of loose JSON records
//!
//! Both features are on by default.
//!
//! ## Error Handling
//!
//! [`StepError`] enumerates the failure kinds: arity errors, unconnected
//! required inputs, metadata mismatches, policy-rejected serialization, and
//! the catch-all execution failure carrying the original cause. Nothing is
//! retried inside the crate; errors propagate to whoever pulled.
//!
//! ## Threading
//!
//! None. Graphs are built and evaluated on one thread (`Rc`, `RefCell`,
//! `OnceCell` throughout). Parallelism belongs to the engine a context
//! carries, behind the `compute` seam.

pub mod arity;
pub mod error;
pub mod export;
pub mod lazy_slots;
pub mod metadata;
pub mod ports;
pub mod step;
pub mod templates;
pub mod testing;

#[cfg(feature = "records")]
pub mod records;
#[cfg(feature = "tables")]
pub mod tables;

// General re-exports
pub use arity::{InPorts, OutPorts};
pub use error::{Result, StepError};
pub use export::{
    BoundaryPolicy, ExportEdge, ExportNode, ExportPolicy, ExportStep, StepExport, StepRegistry,
    export_tree, export_value,
};
pub use lazy_slots::LazySlots;
pub use metadata::{inherited, merged};
pub use ports::{ConnectionSource, ConnectionTarget, bind_each};
pub use step::{EvalMode, Payload, Step};
pub use templates::{
    MergeFn, MergeOp, Merger, Module, ModuleFn, ModuleOp, ProduceFn, ProduceOp, Producer,
    SplitFn, SplitOp, Splitter, TransformFn, TransformOp, Transformer,
};
