use serde_json::{Map, Value};

use crate::plan::{InputBean, PlanNodeBean};

/// Fluent construction of node definitions, mostly for tests and embedding.
#[derive(Default)]
pub struct PlanBuilder {
    pub nodes: Vec<PlanNodeBean>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(self, name: &str, node_type: &str) -> NodeBuilder {
        NodeBuilder {
            plan_builder: self,
            name: name.to_string(),
            node_type: node_type.to_string(),
            params: Map::new(),
            inputs: Vec::new(),
        }
    }

    pub fn build(self) -> Vec<PlanNodeBean> {
        self.nodes
    }
}

pub struct NodeBuilder {
    plan_builder: PlanBuilder,
    name: String,
    node_type: String,
    params: Map<String, Value>,
    inputs: Vec<InputBean>,
}

impl NodeBuilder {
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Wires `source.output` into this node's `target` property.
    pub fn input(mut self, source: &str, output: &str, target: &str) -> Self {
        self.inputs.push(InputBean::new(source, output, target));
        self
    }

    pub fn build(mut self) -> PlanBuilder {
        self.plan_builder.nodes.push(PlanNodeBean {
            name: self.name,
            node_type: self.node_type,
            params: self.params,
            inputs: self.inputs,
        });
        self.plan_builder
    }
}
