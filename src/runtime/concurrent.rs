use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::plan::PlanNodeBean;
use crate::runtime::config::ExecutorConfig;
use crate::runtime::context::{ContextKey, ExecutionContext, get_output};
use crate::runtime::error::PipelineError;
use crate::runtime::executor::{ROOT_NODE_NAME, build_plan_node_map};
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{PlanNode, PlanNodeFactory, PlanNodeMap};
use crate::runtime::result::DetectionResult;

type NodeOutcome = Result<(), PipelineError>;
type ResolveFuture = Pin<Box<dyn Future<Output = NodeOutcome> + Send>>;

/// Executor that resolves independent inputs of a node in parallel.
///
/// Produces the same outputs as [`crate::runtime::executor::PlanExecutor`];
/// each node still builds and runs its operator at most once per run.
pub struct ConcurrentPlanExecutor {
    factory: Arc<PlanNodeFactory>,
    config: ExecutorConfig,
}

struct RunState {
    run_id: Uuid,
    nodes: HashMap<String, Mutex<Box<dyn PlanNode>>>,
    context: DashMap<ContextKey, Arc<DetectionResult>>,
    guards: DashMap<String, Arc<OnceCell<NodeOutcome>>>,
    max_depth: usize,
}

impl ConcurrentPlanExecutor {
    pub fn new(factory: Arc<PlanNodeFactory>) -> Self {
        Self::with_config(factory, ExecutorConfig::default())
    }

    pub fn with_config(factory: Arc<PlanNodeFactory>, config: ExecutorConfig) -> Self {
        Self { factory, config }
    }

    pub async fn run_pipeline(
        &self,
        plan_node_beans: &[PlanNodeBean],
        detection_interval: DetectionInterval,
    ) -> Result<HashMap<String, Arc<DetectionResult>>, PipelineError> {
        let context = self
            .run_pipeline_with_context(plan_node_beans, detection_interval)
            .await?;
        Ok(get_output(&context, ROOT_NODE_NAME))
    }

    pub async fn run_pipeline_with_context(
        &self,
        plan_node_beans: &[PlanNodeBean],
        detection_interval: DetectionInterval,
    ) -> Result<ExecutionContext, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, nodes = plan_node_beans.len(), interval = %detection_interval, "pipeline_started");

        let nodes = build_plan_node_map(&self.factory, plan_node_beans, detection_interval)?;
        if !nodes.contains_key(ROOT_NODE_NAME) {
            error!(%run_id, "plan has no root node");
            return Err(PipelineError::MissingRoot(ROOT_NODE_NAME.to_string()));
        }
        detect_cycle(&nodes, ROOT_NODE_NAME, self.config.max_depth)?;

        let state = Arc::new(RunState {
            run_id,
            nodes: nodes
                .into_iter()
                .map(|(name, node)| (name, Mutex::new(node)))
                .collect(),
            context: DashMap::new(),
            guards: DashMap::new(),
            max_depth: self.config.max_depth,
        });

        let run = resolve(state.clone(), ROOT_NODE_NAME.to_string(), Vec::new());
        let outcome = match self.config.timeout() {
            Some(deadline) => timeout(deadline, run)
                .await
                .unwrap_or(Err(PipelineError::DeadlineExceeded(deadline))),
            None => run.await,
        };

        match outcome {
            Ok(()) => {
                let context: ExecutionContext = state
                    .context
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                info!(%run_id, results = context.len(), "pipeline_completed");
                Ok(context)
            }
            Err(e) => {
                error!(%run_id, error = %e, "pipeline_failed");
                Err(e)
            }
        }
    }
}

fn resolve(state: Arc<RunState>, name: String, path: Vec<String>) -> ResolveFuture {
    Box::pin(async move {
        if path.len() >= state.max_depth || path.contains(&name) {
            let mut path = path;
            path.push(name.clone());
            return Err(PipelineError::CyclicPlan { node: name, path });
        }

        let guard = state.guards.entry(name.clone()).or_default().clone();
        guard
            .get_or_init(|| execute_node(state.clone(), name, path))
            .await
            .clone()
    })
}

async fn execute_node(state: Arc<RunState>, name: String, mut path: Vec<String>) -> NodeOutcome {
    let slot = state
        .nodes
        .get(&name)
        .ok_or_else(|| PipelineError::MissingRoot(name.clone()))?;
    let inputs = {
        let node = slot.lock().unwrap_or_else(|e| e.into_inner());
        node.plan_node_inputs().to_vec()
    };

    path.push(name.clone());
    let mut pending = JoinSet::new();
    let mut scheduled = HashSet::new();
    for input in &inputs {
        let key = ContextKey::new(&input.source_plan_node, &input.source_property);
        if state.context.contains_key(&key)
            || !state.nodes.contains_key(&input.source_plan_node)
            || !scheduled.insert(input.source_plan_node.clone())
        {
            continue;
        }
        pending.spawn(resolve(
            state.clone(),
            input.source_plan_node.clone(),
            path.clone(),
        ));
    }
    while let Some(joined) = pending.join_next().await {
        joined.map_err(|e| PipelineError::Aborted {
            node: name.clone(),
            message: e.to_string(),
        })??;
    }

    let operator = {
        let mut node = slot.lock().unwrap_or_else(|e| e.into_inner());
        for input in &inputs {
            let key = ContextKey::new(&input.source_plan_node, &input.source_property);
            let result = state
                .context
                .get(&key)
                .map(|r| r.value().clone())
                .ok_or_else(|| PipelineError::MissingDependency {
                    node: name.clone(),
                    key: key.clone(),
                })?;
            node.set_input(&input.target_property, result);
        }
        node.build_operator()?
    };

    debug!(run_id = %state.run_id, node = %name, "executing operator");
    let node_name = name.clone();
    let outputs = tokio::task::spawn_blocking(move || {
        let mut operator = operator;
        operator.execute().map(|()| operator.outputs().clone())
    })
    .await
    .map_err(|e| PipelineError::Aborted {
        node: name.clone(),
        message: e.to_string(),
    })?
    .map_err(|e| PipelineError::computation(node_name, e))?;

    debug!(run_id = %state.run_id, node = %name, outputs = outputs.len(), "node completed");
    for (output_name, result) in outputs {
        state
            .context
            .entry(ContextKey::new(&name, output_name))
            .or_insert(result);
    }
    Ok(())
}

/// Depth-first search for a cycle among the nodes reachable from `root`.
///
/// Walks with an explicit stack; a path deeper than `max_depth` is reported as
/// a cycle, the same way the resolvers bound their recursion.
pub fn detect_cycle(
    nodes: &PlanNodeMap,
    root: &str,
    max_depth: usize,
) -> Result<(), PipelineError> {
    if !nodes.contains_key(root) {
        return Ok(());
    }

    let mut done: HashSet<&str> = HashSet::new();
    // (node, index of its next input to visit)
    let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
    while let Some(&(name, next)) = stack.last() {
        let input = nodes
            .get(name)
            .and_then(|node| node.plan_node_inputs().get(next));
        let Some(input) = input else {
            stack.pop();
            done.insert(name);
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }

        let source = input.source_plan_node.as_str();
        if done.contains(source) || !nodes.contains_key(source) {
            continue;
        }
        if stack.len() >= max_depth || stack.iter().any(|(n, _)| *n == source) {
            let mut path: Vec<String> = stack.iter().map(|(n, _)| n.to_string()).collect();
            path.push(source.to_string());
            return Err(PipelineError::CyclicPlan {
                node: source.to_string(),
                path,
            });
        }
        stack.push((source, 0));
    }
    Ok(())
}
