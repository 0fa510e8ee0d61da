use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::plan::PlanNodeBean;
use crate::runtime::config::ExecutorConfig;
use crate::runtime::context::{ContextKey, ExecutionContext, get_output};
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{PlanNodeFactory, PlanNodeMap};
use crate::runtime::result::DetectionResult;

/// Name of the node every run starts from.
pub const ROOT_NODE_NAME: &str = "root";

/// Sequential, depth-first executor. Resolution order is discovered from the
/// declared edges, so the definition list need not be topologically sorted.
pub struct PlanExecutor {
    factory: Arc<PlanNodeFactory>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    pub fn new(factory: Arc<PlanNodeFactory>) -> Self {
        Self::with_config(factory, ExecutorConfig::default())
    }

    pub fn with_config(factory: Arc<PlanNodeFactory>, config: ExecutorConfig) -> Self {
        Self { factory, config }
    }

    /// Runs the plan and returns the root node's outputs.
    pub fn run_pipeline(
        &self,
        plan_node_beans: &[PlanNodeBean],
        detection_interval: DetectionInterval,
    ) -> Result<HashMap<String, Arc<DetectionResult>>, PipelineError> {
        let context = self.run_pipeline_with_context(plan_node_beans, detection_interval)?;
        Ok(get_output(&context, ROOT_NODE_NAME))
    }

    /// Runs the plan and returns every output computed along the way.
    pub fn run_pipeline_with_context(
        &self,
        plan_node_beans: &[PlanNodeBean],
        detection_interval: DetectionInterval,
    ) -> Result<ExecutionContext, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, nodes = plan_node_beans.len(), interval = %detection_interval, "pipeline_started");

        let mut nodes = build_plan_node_map(&self.factory, plan_node_beans, detection_interval)?;
        if !nodes.contains_key(ROOT_NODE_NAME) {
            error!(%run_id, "plan has no root node");
            return Err(PipelineError::MissingRoot(ROOT_NODE_NAME.to_string()));
        }

        let mut resolver = Resolver {
            nodes: &mut nodes,
            context: ExecutionContext::new(),
            completed: HashSet::new(),
            in_progress: Vec::new(),
            max_depth: self.config.max_depth,
        };

        match resolver.execute_node(ROOT_NODE_NAME) {
            Ok(()) => {
                info!(%run_id, results = resolver.context.len(), "pipeline_completed");
                Ok(resolver.context)
            }
            Err(e) => {
                error!(%run_id, error = %e, "pipeline_failed");
                Err(e)
            }
        }
    }
}

/// Builds every node shell in declaration order. Operators are not built.
pub fn build_plan_node_map(
    factory: &PlanNodeFactory,
    plan_node_beans: &[PlanNodeBean],
    detection_interval: DetectionInterval,
) -> Result<PlanNodeMap, PipelineError> {
    let mut nodes = PlanNodeMap::new();
    for bean in plan_node_beans {
        if nodes.contains_key(&bean.name) {
            return Err(PipelineError::configuration(
                &bean.name,
                "duplicate node name in plan",
            ));
        }
        let node = factory.build(bean, detection_interval, &nodes)?;
        nodes.insert(bean.name.clone(), node);
    }
    Ok(nodes)
}

struct Resolver<'a> {
    nodes: &'a mut PlanNodeMap,
    context: ExecutionContext,
    completed: HashSet<String>,
    // Nodes whose resolution is on the current call stack.
    in_progress: Vec<String>,
    max_depth: usize,
}

impl Resolver<'_> {
    fn execute_node(&mut self, name: &str) -> Result<(), PipelineError> {
        if self.in_progress.iter().any(|n| n == name) || self.in_progress.len() >= self.max_depth {
            let mut path = self.in_progress.clone();
            path.push(name.to_string());
            return Err(PipelineError::CyclicPlan {
                node: name.to_string(),
                path,
            });
        }

        let inputs = match self.nodes.get(name) {
            Some(node) => node.plan_node_inputs().to_vec(),
            None => return Err(PipelineError::MissingRoot(name.to_string())),
        };

        self.in_progress.push(name.to_string());
        for input in &inputs {
            let key = ContextKey::new(&input.source_plan_node, &input.source_property);
            if !self.context.contains(&key)
                && !self.completed.contains(&input.source_plan_node)
                && self.nodes.contains_key(&input.source_plan_node)
            {
                self.execute_node(&input.source_plan_node)?;
            }
            let result = self
                .context
                .get(&key)
                .cloned()
                .ok_or_else(|| PipelineError::MissingDependency {
                    node: name.to_string(),
                    key: key.clone(),
                })?;
            if let Some(node) = self.nodes.get_mut(name) {
                node.set_input(&input.target_property, result);
            }
        }
        self.in_progress.pop();

        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| PipelineError::MissingRoot(name.to_string()))?;
        let mut operator = node.build_operator()?;
        debug!(node = %name, "executing operator");
        operator
            .execute()
            .map_err(|e| PipelineError::computation(name, e))?;

        let outputs = operator.outputs();
        for (output_name, result) in outputs {
            self.context
                .insert(ContextKey::new(name, output_name), result.clone());
        }
        self.completed.insert(name.to_string());
        debug!(node = %name, outputs = outputs.len(), "node completed");
        Ok(())
    }
}
