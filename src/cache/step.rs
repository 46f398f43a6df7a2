//! Per-step failure policy
//!
//! Each step of the restore and snapshot pipelines is declared with its
//! policy next to the other steps of the same pipeline, so what may fail
//! without aborting is visible in one place.

use crate::error::WarmvolResult;
use std::future::Future;
use tracing::{info, warn};

/// What a step failure means for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure aborts the pipeline
    Required,
    /// Failure is logged as a warning and the pipeline continues
    BestEffort,
}

/// A named pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub policy: StepPolicy,
}

impl Step {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            policy: StepPolicy::Required,
        }
    }

    pub const fn best_effort(name: &'static str) -> Self {
        Self {
            name,
            policy: StepPolicy::BestEffort,
        }
    }

    /// Run `action` under this step's policy.
    ///
    /// Returns `Ok(None)` when a best-effort step failed.
    pub async fn run<T, Fut>(&self, action: Fut) -> WarmvolResult<Option<T>>
    where
        Fut: Future<Output = WarmvolResult<T>>,
    {
        info!(step = self.name, "Running step");
        match action.await {
            Ok(value) => Ok(Some(value)),
            Err(e) => match self.policy {
                StepPolicy::Required => Err(e),
                StepPolicy::BestEffort => {
                    warn!(step = self.name, "Step failed, continuing: {}", e);
                    Ok(None)
                }
            },
        }
    }

    /// Run a required step whose output the pipeline goes on with
    pub async fn output<T, Fut>(&self, action: Fut) -> WarmvolResult<T>
    where
        Fut: Future<Output = WarmvolResult<T>>,
    {
        debug_assert_eq!(self.policy, StepPolicy::Required, "{}", self.name);
        info!(step = self.name, "Running step");
        action.await
    }
}
