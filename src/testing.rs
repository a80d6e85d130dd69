//! Testing utilities for step graphs.
//!
//! Reusable step doubles for writing pipeline tests:
//!
//! - [`CountingSource`]: a producer that counts how often it is pulled, for
//!   pinning down the no-caching-across-pulls contract
//! - [`FailingOp`]: a transformer op that always fails, for observing the
//!   uniform error wrapping
//! - [`PassThrough`]: a transformer op that returns its input unchanged
//!
//! ```
//! use stepflow::testing::CountingSource;
//! use stepflow::{Producer, Step};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Nums(Vec<i64>);
//! impl stepflow::Payload for Nums {
//!     type Meta = String;
//!     fn absent() -> Self {
//!         Nums(Vec::new())
//!     }
//! }
//!
//! let source = Producer::new(CountingSource::of(Nums(vec![1, 2])));
//! source.output(&()).unwrap();
//! source.output(&()).unwrap();
//! assert_eq!(source.op().pulls(), 2);
//! ```

use crate::step::{EvalMode, Payload};
use crate::templates::{ProduceOp, TransformOp};
use anyhow::bail;
use std::cell::Cell;

/// A producer op that returns a fixed value and counts its pulls.
pub struct CountingSource<T> {
    value: T,
    pulls: Cell<usize>,
}

impl<T> CountingSource<T> {
    /// A source producing `value` on every pull.
    pub fn of(value: T) -> Self {
        Self {
            value,
            pulls: Cell::new(0),
        }
    }

    /// How many times this source has been pulled so far.
    pub fn pulls(&self) -> usize {
        self.pulls.get()
    }
}

impl<T: Payload, C: 'static> ProduceOp<T, C> for CountingSource<T> {
    fn produce(&self, _ctx: &C, _mode: EvalMode) -> anyhow::Result<T> {
        self.pulls.set(self.pulls.get() + 1);
        Ok(self.value.clone())
    }
}

/// A transformer op that always fails with the configured message.
pub struct FailingOp {
    message: String,
}

impl FailingOp {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<T: Payload, C: 'static> TransformOp<T, C> for FailingOp {
    fn transform(&self, _ctx: &C, _input: T, _mode: EvalMode) -> anyhow::Result<T> {
        bail!("{}", self.message)
    }
}

/// A transformer op that returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<T: Payload, C: 'static> TransformOp<T, C> for PassThrough {
    fn transform(&self, _ctx: &C, input: T, _mode: EvalMode) -> anyhow::Result<T> {
        Ok(input)
    }
}
