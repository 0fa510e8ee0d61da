use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::nodes::ECHO_OUTPUT;
use crate::plan::PlanNodeBean;
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::DetectionResult;

/// Passes every input through under its property name and, when configured,
/// publishes `params.echo` as `output`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EchoSpec {
    #[serde(default)]
    pub echo: Option<Value>,
}

pub struct EchoDefinition;

impl PlanNodeDefinition for EchoDefinition {
    fn type_name(&self) -> &str {
        "Echo"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let spec: EchoSpec = parse_params(bean)?;
        Ok(DefaultPlanNode::boxed(bean.clone(), interval, spec))
    }
}

impl OperatorSpec for EchoSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(EchoOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct EchoOperator {
    spec: EchoSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl Operator for EchoOperator {
    fn execute(&mut self) -> Result<()> {
        let mut outputs: OperatorOutputs = self
            .ctx
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(echo) = &self.spec.echo {
            outputs.insert(
                ECHO_OUTPUT.to_string(),
                Arc::new(DetectionResult::Value(echo.clone())),
            );
        }
        self.outputs = outputs;
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}
