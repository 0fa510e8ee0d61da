use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use tracing::debug;

use crate::plan::{InputBean, PlanNodeBean};
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::operator::{Operator, OperatorContext};
use crate::runtime::result::DetectionResult;

pub type PlanNodeMap = HashMap<String, Box<dyn PlanNode>>;

/// Runtime node: a definition plus the upstream results supplied so far.
pub trait PlanNode: Send {
    fn name(&self) -> &str;

    fn plan_node_inputs(&self) -> &[InputBean];

    /// Records one resolved upstream value. The property name is not checked.
    fn set_input(&mut self, target_property: &str, result: Arc<DetectionResult>);

    /// Materializes the operator. Executors call this at most once per run.
    fn build_operator(&mut self) -> Result<Box<dyn Operator>, PipelineError>;
}

/// Constructor for one node type, registered in a [`PlanNodeFactory`].
pub trait PlanNodeDefinition: Send + Sync {
    fn type_name(&self) -> &str;

    /// Builds the plan node. `siblings` holds the nodes declared earlier in
    /// the same plan.
    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError>;
}

/// Registry from node `type` to its definition.
#[derive(Default)]
pub struct PlanNodeFactory {
    registry: HashMap<String, Box<dyn PlanNodeDefinition>>,
}

impl PlanNodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Box<dyn PlanNodeDefinition>) {
        self.registry
            .insert(definition.type_name().to_string(), definition);
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.registry.contains_key(node_type)
    }

    pub fn build(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let definition = self.registry.get(&bean.node_type).ok_or_else(|| {
            PipelineError::configuration(
                &bean.name,
                format!("unknown node type '{}'", bean.node_type),
            )
        })?;
        debug!(node = %bean.name, node_type = %bean.node_type, "building plan node");
        definition.prepare(bean, interval, siblings)
    }
}

/// Typed, already validated configuration of one operator kind.
pub trait OperatorSpec: Send + 'static {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator>;
}

/// Plan node shared by all variants: stores inputs as they arrive and hands
/// them, with the spec, to a fresh operator.
pub struct DefaultPlanNode<S> {
    bean: PlanNodeBean,
    interval: DetectionInterval,
    inputs: HashMap<String, Arc<DetectionResult>>,
    spec: Option<S>,
}

impl<S: OperatorSpec> DefaultPlanNode<S> {
    pub fn new(bean: PlanNodeBean, interval: DetectionInterval, spec: S) -> Self {
        Self {
            bean,
            interval,
            inputs: HashMap::new(),
            spec: Some(spec),
        }
    }

    pub fn boxed(bean: PlanNodeBean, interval: DetectionInterval, spec: S) -> Box<dyn PlanNode> {
        Box::new(Self::new(bean, interval, spec))
    }
}

impl<S: OperatorSpec> PlanNode for DefaultPlanNode<S> {
    fn name(&self) -> &str {
        &self.bean.name
    }

    fn plan_node_inputs(&self) -> &[InputBean] {
        &self.bean.inputs
    }

    fn set_input(&mut self, target_property: &str, result: Arc<DetectionResult>) {
        self.inputs.insert(target_property.to_string(), result);
    }

    fn build_operator(&mut self) -> Result<Box<dyn Operator>, PipelineError> {
        let spec = self.spec.take().ok_or_else(|| {
            PipelineError::configuration(&self.bean.name, "operator already built in this run")
        })?;
        let ctx = OperatorContext {
            node_name: self.bean.name.clone(),
            interval: self.interval,
            inputs: mem::take(&mut self.inputs),
        };
        Ok(spec.into_operator(ctx))
    }
}

/// Decodes a node's params into its typed spec.
pub fn parse_params<T: DeserializeOwned>(bean: &PlanNodeBean) -> Result<T, PipelineError> {
    serde_json::from_value(Value::Object(bean.params.clone()))
        .map_err(|e| PipelineError::configuration(&bean.name, format!("malformed params: {}", e)))
}
