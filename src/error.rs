//! Error kinds surfaced by step evaluation and export.

/// Crate-wide result alias; defaults to [`StepError`] on the error side.
pub type Result<T, E = StepError> = std::result::Result<T, E>;

/// Errors raised while evaluating or exporting a step.
///
/// None of these are caught or retried inside the crate: a failing node fails
/// the whole pull chain above it.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Output index outside the step's declared arity. A wiring bug, never retried.
    #[error("output index {index} out of range for step with {outputs} outputs")]
    OutputOutOfRange {
        /// The requested output index.
        index: usize,
        /// The step's declared output count.
        outputs: usize,
    },

    /// A required input port had no inbound connection at evaluation time.
    #[error("required input port {index} has no inbound connection")]
    UnconnectedInput {
        /// The offending input index.
        index: usize,
    },

    /// Merge inputs disagree on propagated metadata.
    #[error("inputs disagree on propagated metadata: {left} != {right}")]
    MetadataMismatch {
        /// Debug rendering of the first metadata value seen.
        left: String,
        /// Debug rendering of the disagreeing value.
        right: String,
    },

    /// Any other failure raised while computing a step's output, carrying the
    /// original cause. All uncategorized errors are wrapped into this kind at
    /// the `output` boundary.
    #[error("step execution failed: {0}")]
    Execution(anyhow::Error),

    /// A boundary-marker step was serialized while the export policy rejects it.
    #[error("serialization is disabled for step kind '{kind}'")]
    SerializationDisabled {
        /// The export discriminator of the rejected step.
        kind: String,
    },
}

impl StepError {
    /// Wrap an arbitrary compute failure into [`StepError::Execution`].
    ///
    /// Idempotent: an error that already is a `StepError` (for example an
    /// [`StepError::UnconnectedInput`] raised while pulling an upstream port)
    /// passes through unchanged instead of being nested.
    pub fn wrap(err: anyhow::Error) -> Self {
        match err.downcast::<StepError>() {
            Ok(already) => already,
            Err(other) => StepError::Execution(other),
        }
    }
}
