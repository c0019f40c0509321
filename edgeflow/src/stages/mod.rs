//! Transform stage contract and built-in stages.
//!
//! Stages are the units of the pipeline's ordered sequence: each consumes
//! the previous stage's output and decides whether the run continues.

mod compression;
mod conversion;
mod filter;

pub use compression::{GzipCompressor, ZlibCompressor};
pub use conversion::{JsonTransform, XmlTransform};
pub use filter::{DeviceNameFilter, ValueDescriptorFilter};

use crate::context::ExecutionContext;
use crate::core::{StageOutcome, StageValue};
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline transform stages.
#[async_trait]
pub trait TransformStage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage against one arrival.
    ///
    /// `input` is the previous stage's output (the decoded event for the
    /// first stage); it is absent when the previous stage continued without
    /// a value.
    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome;
}

/// A function-based stage, for custom terminal stages and tests.
pub struct FnStage<F>
where
    F: Fn(&ExecutionContext, Option<StageValue>) -> StageOutcome + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&ExecutionContext, Option<StageValue>) -> StageOutcome + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&ExecutionContext, Option<StageValue>) -> StageOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> TransformStage for FnStage<F>
where
    F: Fn(&ExecutionContext, Option<StageValue>) -> StageOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        (self.func)(ctx, input)
    }
}
