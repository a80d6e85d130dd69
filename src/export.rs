//! Structured export and revival of steps.
//!
//! Every concrete step type can render its construction parameters (not its
//! runtime state) into two forms:
//!
//! - a **generic structured value** ([`export_value`]): a JSON object with a
//!   `kind` discriminator and a `params` payload, and
//! - a **tree export** ([`export_tree`]): the step plus its wired upstream
//!   subtree, each edge recording the target input port and the source output
//!   port.
//!
//! A [`StepRegistry`] holds builders keyed by discriminator and reverses both
//! forms: [`revive`](StepRegistry::revive) reconstructs a single step from a
//! value export, [`revive_tree`](StepRegistry::revive_tree) reconstructs and
//! rewires a whole upstream tree. Round-trip holds under structural equality
//! of configuration; wiring identity is not part of it.
//!
//! Serializability is governed by an [`ExportPolicy`] passed into every entry
//! point rather than by ambient process state. Step kinds acting purely as
//! graph boundary markers set [`StepExport::boundary_marker`]; exporting one
//! while the policy rejects boundary steps fails with
//! [`StepError::SerializationDisabled`].
//!
//! Tree exports duplicate shared upstreams: a diamond graph serializes as two
//! copies of the common ancestor. The tree is a persistence format for pull
//! chains, not a general graph model.

use crate::error::{Result, StepError};
use crate::ports::ConnectionSource;
use crate::step::{Payload, Step};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::rc::Rc;

/// Export capability of a concrete step (or of the op inside a template).
pub trait StepExport {
    /// Type discriminator, unique per concrete step kind within a registry.
    fn export_kind(&self) -> &'static str;

    /// Construction parameters as a JSON value. Must capture enough to
    /// reconstruct an equivalent step; runtime state stays out.
    fn export_params(&self) -> anyhow::Result<Value>;

    /// True for step kinds used only as graph boundary markers, which an
    /// [`ExportPolicy`] may refuse to serialize.
    fn boundary_marker(&self) -> bool {
        false
    }
}

/// What to do when a boundary-marker step is exported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Export boundary markers like any other step.
    #[default]
    Allow,
    /// Fail with [`StepError::SerializationDisabled`].
    Reject,
}

/// Serializability policy threaded into every export entry point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportPolicy {
    /// Treatment of boundary-marker steps.
    pub boundary: BoundaryPolicy,
}

impl ExportPolicy {
    /// The policy rejecting boundary-marker steps.
    pub fn reject_boundary() -> Self {
        Self {
            boundary: BoundaryPolicy::Reject,
        }
    }
}

fn check_policy(step: &dyn StepExport, policy: ExportPolicy) -> Result<()> {
    if step.boundary_marker() && policy.boundary == BoundaryPolicy::Reject {
        return Err(StepError::SerializationDisabled {
            kind: step.export_kind().to_string(),
        });
    }
    Ok(())
}

/// Render a step's configuration as `{"kind": ..., "params": ...}`.
pub fn export_value(step: &dyn StepExport, policy: ExportPolicy) -> Result<Value> {
    check_policy(step, policy)?;
    let params = step.export_params().map_err(StepError::wrap)?;
    Ok(json!({ "kind": step.export_kind(), "params": params }))
}

/// One node of a tree export: a step and its wired upstream subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    /// Type discriminator of the step.
    pub kind: String,
    /// The step's construction parameters.
    pub params: Value,
    /// Inbound edges, one per connected input port.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ExportEdge>,
}

/// An inbound edge of an [`ExportNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    /// Input port index on the downstream step.
    pub port: usize,
    /// Output port index on the upstream step.
    pub source_port: usize,
    /// The upstream step's subtree.
    pub node: ExportNode,
}

/// Render a step and its connected upstream chain as a tree.
///
/// Unconnected input ports are simply omitted; whether that is legal is the
/// step's own `all_inputs_required` business at evaluation time, not ours.
pub fn export_tree<T: Payload, C: 'static>(
    step: &dyn Step<T, C>,
    policy: ExportPolicy,
) -> Result<ExportNode> {
    let export = step
        .as_export()
        .ok_or_else(|| StepError::wrap(anyhow!("step kind is not exportable")))?;
    check_policy(export, policy)?;
    let params = export.export_params().map_err(StepError::wrap)?;

    let mut inputs = Vec::new();
    for port in 0..step.input_count() {
        if let Some(source) = step.in_port(port).source() {
            let node = export_tree(source.step().as_ref(), policy)?;
            inputs.push(ExportEdge {
                port,
                source_port: source.index(),
                node,
            });
        }
    }
    tracing::debug!(kind = export.export_kind(), edges = inputs.len(), "exported step tree node");

    Ok(ExportNode {
        kind: export.export_kind().to_string(),
        params,
        inputs,
    })
}

/// A step that can be both evaluated and exported. Blanket-implemented.
pub trait ExportStep<T: Payload, C: 'static>: Step<T, C> + StepExport {}

impl<T: Payload, C: 'static, S: Step<T, C> + StepExport> ExportStep<T, C> for S {}

impl<T: Payload, C: 'static> std::fmt::Debug for dyn ExportStep<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportStep")
            .field("kind", &self.export_kind())
            .finish()
    }
}

type BuildFn<T, C> = Box<dyn Fn(&Value) -> anyhow::Result<Rc<dyn ExportStep<T, C>>>>;

/// The from-export factory: builders keyed by type discriminator.
///
/// Instantiation modules ship a ready-made registry covering their step kinds
/// (see `tables::registry` / `records::registry`); custom kinds register on
/// top.
pub struct StepRegistry<T: Payload, C: 'static> {
    builders: HashMap<&'static str, BuildFn<T, C>>,
}

impl<T: Payload, C: 'static> StepRegistry<T, C> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register a builder for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: &'static str, build: F)
    where
        F: Fn(&Value) -> anyhow::Result<Rc<dyn ExportStep<T, C>>> + 'static,
    {
        self.builders.insert(kind, Box::new(build));
    }

    /// The registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }

    fn build(&self, kind: &str, params: &Value) -> anyhow::Result<Rc<dyn ExportStep<T, C>>> {
        let Some(build) = self.builders.get(kind) else {
            bail!("unknown step kind '{kind}'");
        };
        tracing::debug!(kind, "reviving step");
        build(params)
    }

    /// Reconstruct a step from a value export (`{"kind": ..., "params": ...}`).
    pub fn revive(&self, export: &Value) -> anyhow::Result<Rc<dyn ExportStep<T, C>>> {
        let Some(kind) = export.get("kind").and_then(Value::as_str) else {
            bail!("export is missing a 'kind' discriminator");
        };
        let params = export.get("params").cloned().unwrap_or(Value::Null);
        self.build(kind, &params)
    }

    /// Reconstruct a whole tree export, rebinding every recorded edge.
    pub fn revive_tree(&self, node: &ExportNode) -> anyhow::Result<Rc<dyn ExportStep<T, C>>> {
        let step = self.build(&node.kind, &node.params)?;
        for edge in &node.inputs {
            let upstream: Rc<dyn Step<T, C>> = self.revive_tree(&edge.node)?;
            step.in_port(edge.port)
                .bind_from(ConnectionSource::new(upstream, edge.source_port));
        }
        Ok(step)
    }
}

impl<T: Payload, C: 'static> Default for StepRegistry<T, C> {
    fn default() -> Self {
        Self::new()
    }
}
