pub mod builder;
pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::runtime::config::ExecutorConfig;
use crate::runtime::interval::DetectionInterval;

/// A persisted plan as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DetectionInterval>,
    #[serde(default)]
    pub executor: ExecutorConfig,
    pub nodes: Vec<PlanNodeBean>,
}

/// Persisted definition of one node in a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanNodeBean {
    /// Unique within a plan.
    pub name: String,
    /// Selects the plan node variant in the factory registry.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Opaque to the engine; decoded by the node variant.
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub inputs: Vec<InputBean>,
}

impl PlanNodeBean {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            params: Map::new(),
            inputs: Vec::new(),
        }
    }
}

/// Edge from a producer's named output to a property of the consuming node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct InputBean {
    #[serde(alias = "sourceNodeName")]
    pub source_plan_node: String,
    #[serde(alias = "sourceOutputName")]
    pub source_property: String,
    #[serde(alias = "targetPropertyName")]
    pub target_property: String,
}

impl InputBean {
    pub fn new(
        source_plan_node: impl Into<String>,
        source_property: impl Into<String>,
        target_property: impl Into<String>,
    ) -> Self {
        Self {
            source_plan_node: source_plan_node.into(),
            source_property: source_property.into(),
            target_property: target_property.into(),
        }
    }
}
