//! Metadata propagation between wired steps.
//!
//! Metadata is a schema-like descriptor a step may attach to its output
//! (see [`Payload::Meta`](crate::step::Payload::Meta)). It travels downstream
//! without evaluating anything: reading it walks the wiring, not the data.

use crate::arity::InPorts;
use crate::error::{Result, StepError};
use crate::ports::ConnectionTarget;
use crate::step::Payload;

/// Metadata inherited through a single input port.
///
/// `None` when the port is unconnected or the upstream step reports none.
pub fn inherited<T: Payload, C: 'static>(port: &ConnectionTarget<T, C>) -> Option<T::Meta> {
    port.source().and_then(|source| source.metadata())
}

/// Metadata merged across every input port of a multi-input step.
///
/// If any port is unconnected or reports no metadata, the combined result is
/// `Ok(None)` — undefined, not an error, until metadata becomes available.
/// Otherwise all reported values must be equal; a disagreement fails with
/// [`StepError::MetadataMismatch`], and agreement yields the common value.
pub fn merged<T: Payload, C: 'static>(inputs: &InPorts<T, C>) -> Result<Option<T::Meta>> {
    let mut common: Option<T::Meta> = None;
    for index in 0..inputs.len() {
        let Some(meta) = inputs.metadata(index) else {
            return Ok(None);
        };
        match &common {
            None => common = Some(meta),
            Some(seen) if *seen == meta => {}
            Some(seen) => {
                return Err(StepError::MetadataMismatch {
                    left: format!("{seen:?}"),
                    right: format!("{meta:?}"),
                });
            }
        }
    }
    Ok(common)
}
