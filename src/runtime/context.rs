use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::runtime::result::DetectionResult;

/// Address of one result: the producing node and the name of its output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey {
    pub node_name: String,
    pub key: String,
}

impl ContextKey {
    pub fn new(node_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node_name, self.key)
    }
}

/// Run-scoped store of every output computed so far.
///
/// Entries are only ever added; a key that is already present keeps its
/// first value for the rest of the run.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    results: HashMap<ContextKey, Arc<DetectionResult>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.results.contains_key(key)
    }

    pub fn get(&self, key: &ContextKey) -> Option<&Arc<DetectionResult>> {
        self.results.get(key)
    }

    pub fn insert(&mut self, key: ContextKey, result: Arc<DetectionResult>) {
        match self.results.entry(key) {
            Entry::Occupied(e) => {
                warn!(key = %e.key(), "context key already populated, keeping first value");
            }
            Entry::Vacant(e) => {
                e.insert(result);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.results.keys()
    }

    /// All outputs produced by `node_name`, keyed by output name.
    pub fn outputs_of(&self, node_name: &str) -> HashMap<String, Arc<DetectionResult>> {
        get_output(self, node_name)
    }
}

impl FromIterator<(ContextKey, Arc<DetectionResult>)> for ExecutionContext {
    fn from_iter<I: IntoIterator<Item = (ContextKey, Arc<DetectionResult>)>>(iter: I) -> Self {
        let mut context = ExecutionContext::new();
        for (key, result) in iter {
            context.insert(key, result);
        }
        context
    }
}

/// Extracts the outputs whose producer is `node_name`.
pub fn get_output(
    context: &ExecutionContext,
    node_name: &str,
) -> HashMap<String, Arc<DetectionResult>> {
    context
        .results
        .iter()
        .filter(|(key, _)| key.node_name == node_name)
        .map(|(key, result)| (key.key.clone(), result.clone()))
        .collect()
}
