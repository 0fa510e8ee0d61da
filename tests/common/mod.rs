#![allow(dead_code)]

use anyhow::{Result, bail};
use detection_pipeline::nodes::register_standard_nodes;
use detection_pipeline::plan::PlanNodeBean;
use detection_pipeline::runtime::error::PipelineError;
use detection_pipeline::runtime::interval::DetectionInterval;
use detection_pipeline::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeFactory, PlanNodeMap,
    parse_params,
};
use detection_pipeline::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use detection_pipeline::runtime::result::DetectionResult;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Test node that records every execution in a shared log.
///
/// Publishes `value` (or a JSON summary of its inputs) under each name in
/// `outputs` (default `["default"]`).
pub struct ProbeDefinition {
    pub log: ExecutionLog,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeParams {
    #[serde(default)]
    fail: bool,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    outputs: Option<Vec<String>>,
    #[serde(default)]
    sleep_ms: u64,
}

struct ProbeSpec {
    params: ProbeParams,
    log: ExecutionLog,
}

impl PlanNodeDefinition for ProbeDefinition {
    fn type_name(&self) -> &str {
        "Probe"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let params: ProbeParams = parse_params(bean)?;
        Ok(DefaultPlanNode::boxed(
            bean.clone(),
            interval,
            ProbeSpec {
                params,
                log: self.log.clone(),
            },
        ))
    }
}

impl OperatorSpec for ProbeSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(ProbeOperator {
            params: self.params,
            log: self.log,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

struct ProbeOperator {
    params: ProbeParams,
    log: ExecutionLog,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl std::fmt::Debug for ProbeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeOperator")
            .field("node", &self.ctx.node_name)
            .finish()
    }
}

impl Operator for ProbeOperator {
    fn execute(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(self.ctx.node_name.clone());
        if self.params.sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.params.sleep_ms));
        }
        if self.params.fail {
            bail!("probe '{}' failed on purpose", self.ctx.node_name);
        }

        let value = match &self.params.value {
            Some(v) => v.clone(),
            None => {
                let mut inputs = Map::new();
                for (property, result) in &self.ctx.inputs {
                    let v = result.as_value().cloned().unwrap_or(Value::Null);
                    inputs.insert(property.clone(), v);
                }
                json!({ "node": self.ctx.node_name, "inputs": inputs })
            }
        };

        let names = self
            .params
            .outputs
            .clone()
            .unwrap_or_else(|| vec!["default".to_string()]);
        let result = Arc::new(DetectionResult::Value(value));
        self.outputs = names.into_iter().map(|n| (n, result.clone())).collect();
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}

pub fn new_log() -> ExecutionLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn executed(log: &ExecutionLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn count(log: &ExecutionLog, node: &str) -> usize {
    log.lock().unwrap().iter().filter(|n| *n == node).count()
}

/// Standard node types plus `Probe`.
pub fn test_factory(log: &ExecutionLog) -> Arc<PlanNodeFactory> {
    let mut factory = PlanNodeFactory::new();
    register_standard_nodes(&mut factory);
    factory.register(Box::new(ProbeDefinition { log: log.clone() }));
    Arc::new(factory)
}

pub fn interval() -> DetectionInterval {
    DetectionInterval::new(1_000, 5_000).unwrap()
}
