use anyhow::{Result, anyhow};
use evalexpr::{
    ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node as EvalNode,
    build_operator_tree,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::nodes::ANOMALIES_OUTPUT;
use crate::plan::PlanNodeBean;
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::{Anomaly, DetectionResult};

#[derive(Debug, Clone, Deserialize)]
struct AnomalyFilterParams {
    condition: String,
}

/// Filter condition compiled once when the plan is built.
#[derive(Debug, Clone)]
pub struct AnomalyFilterSpec {
    pub condition: String,
    tree: EvalNode<DefaultNumericTypes>,
}

/// Keeps the anomalies for which `condition` evaluates to true. Variables:
/// `startTime`, `endTime`, `duration`, `avgCurrentVal`, `avgBaselineVal`,
/// `deviation`.
pub struct AnomalyFilterDefinition;

impl PlanNodeDefinition for AnomalyFilterDefinition {
    fn type_name(&self) -> &str {
        "AnomalyFilter"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let params: AnomalyFilterParams = parse_params(bean)?;
        let tree = compile(&params.condition)
            .map_err(|e| PipelineError::configuration(&bean.name, e.to_string()))?;
        let spec = AnomalyFilterSpec {
            condition: params.condition,
            tree,
        };
        Ok(DefaultPlanNode::boxed(bean.clone(), interval, spec))
    }
}

fn compile(condition: &str) -> Result<EvalNode<DefaultNumericTypes>> {
    build_operator_tree::<DefaultNumericTypes>(condition)
        .map_err(|e| anyhow!("invalid condition '{}': {}", condition, e))
}

fn anomaly_variables(anomaly: &Anomaly) -> Result<HashMapContext<DefaultNumericTypes>> {
    let mut vars = HashMapContext::<DefaultNumericTypes>::new();
    let values: [(&str, evalexpr::Value<DefaultNumericTypes>); 6] = [
        ("startTime", evalexpr::Value::Int(anomaly.start_time)),
        ("endTime", evalexpr::Value::Int(anomaly.end_time)),
        ("duration", evalexpr::Value::Int(anomaly.duration_millis())),
        ("avgCurrentVal", evalexpr::Value::Float(anomaly.avg_current_val)),
        ("avgBaselineVal", evalexpr::Value::Float(anomaly.avg_baseline_val)),
        ("deviation", evalexpr::Value::Float(anomaly.deviation())),
    ];
    for (name, value) in values {
        vars.set_value(name.to_string(), value)
            .map_err(|e| anyhow!("failed to bind '{}': {}", name, e))?;
    }
    Ok(vars)
}

impl OperatorSpec for AnomalyFilterSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(AnomalyFilterOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct AnomalyFilterOperator {
    spec: AnomalyFilterSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl Operator for AnomalyFilterOperator {
    fn execute(&mut self) -> Result<()> {
        let mut kept = Vec::new();
        for anomaly in self.ctx.anomalies("anomalies")? {
            let vars = anomaly_variables(anomaly)?;
            let keep = self
                .spec
                .tree
                .eval_boolean_with_context(&vars)
                .map_err(|e| anyhow!("condition '{}' failed: {}", self.spec.condition, e))?;
            if keep {
                kept.push(anomaly.clone());
            }
        }

        let mut outputs = OperatorOutputs::new();
        outputs.insert(
            ANOMALIES_OUTPUT.to_string(),
            Arc::new(DetectionResult::Anomalies(kept)),
        );
        self.outputs = outputs;
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}
