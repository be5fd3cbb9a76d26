//! Core analyzer traits.

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::errors::AnalyzerResult;

/// Core trait for analyzers that compute metrics from a registered table.
///
/// Analyzers split their work in two: an async pass over the data that
/// extracts an intermediate [`AnalyzerState`], and a pure transformation
/// of that state into the final metric. States can be merged, so a metric
/// can be assembled from states computed over separate partitions.
///
/// # Example
///
/// ```rust,ignore
/// use plantstat::analyzers::{Analyzer, mean::MeanAnalyzer};
/// use datafusion::prelude::*;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = SessionContext::new();
/// // register the cleaned table as "data"
///
/// let analyzer = MeanAnalyzer::new("flowrate");
/// let state = analyzer.compute_state_from_data(&ctx).await?;
/// let mean = analyzer.compute_metric_from_state(&state)?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Analyzer: Send + Sync + Debug {
    /// The state type for incremental computation.
    type State: AnalyzerState;

    /// The metric type produced by this analyzer.
    type Metric: Send + Sync + Debug;

    /// Computes the state from the data registered with `ctx`.
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State>;

    /// Computes the final metric from the accumulated state.
    ///
    /// This transformation is pure: it never touches the data again, so
    /// degenerate inputs (empty table, zero variance) must already be
    /// representable in the state.
    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric>;

    /// Merges multiple states into a single state.
    fn merge_states(&self, states: Vec<Self::State>) -> AnalyzerResult<Self::State> {
        Self::State::merge(states)
    }

    /// Returns the name of this analyzer.
    fn name(&self) -> &str;

    /// Returns a description of what this analyzer computes.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the column(s) this analyzer operates on, if any.
    fn columns(&self) -> Vec<&str> {
        vec![]
    }
}

/// Trait for analyzer state that supports incremental computation.
///
/// States are serializable so intermediate results can be cached or moved
/// between processes.
pub trait AnalyzerState:
    Clone + Send + Sync + Debug + Serialize + for<'de> Deserialize<'de>
{
    /// Merges multiple states into a single state.
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self>
    where
        Self: Sized;

    /// Returns whether this state represents an empty computation.
    fn is_empty(&self) -> bool {
        false
    }
}
