use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::runtime::context::ContextKey;

/// Every way a pipeline run can terminate unsuccessfully.
///
/// A run reports exactly one of these; outputs computed before the failure
/// are discarded.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Unknown node type, malformed params or an inconsistent plan, detected
    /// while building plan nodes and before any operator runs.
    #[error("invalid configuration for node '{node}': {message}")]
    Configuration { node: String, message: String },

    #[error("plan has no root node named '{0}'")]
    MissingRoot(String),

    /// An input edge names an output that never materialized.
    #[error("node '{node}' is missing context key {key}")]
    MissingDependency { node: String, key: ContextKey },

    #[error("cyclic plan: node '{node}' re-entered via {}", .path.join(" -> "))]
    CyclicPlan { node: String, path: Vec<String> },

    /// The node's operator failed while executing.
    #[error("operator for node '{node}' failed: {source}")]
    Computation {
        node: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    #[error("invalid detection interval: start {start} is after end {end}")]
    InvalidInterval { start: i64, end: i64 },

    #[error("pipeline run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// A worker task for the node was cancelled or panicked.
    #[error("execution of node '{node}' aborted: {message}")]
    Aborted { node: String, message: String },
}

impl PipelineError {
    pub fn configuration(node: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn computation(node: impl Into<String>, source: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = source.into();
        PipelineError::Computation {
            node: node.into(),
            source: Arc::from(boxed),
        }
    }

    /// Name of the node the failure is attributed to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            PipelineError::Configuration { node, .. }
            | PipelineError::MissingDependency { node, .. }
            | PipelineError::CyclicPlan { node, .. }
            | PipelineError::Computation { node, .. }
            | PipelineError::Aborted { node, .. } => Some(node),
            PipelineError::MissingRoot(name) => Some(name),
            PipelineError::InvalidInterval { .. } | PipelineError::DeadlineExceeded(_) => None,
        }
    }
}
