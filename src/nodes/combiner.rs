use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::sync::Arc;

use crate::nodes::ANOMALIES_OUTPUT;
use crate::plan::{InputBean, PlanNodeBean};
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::DetectionResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CombinerSpec {
    /// Sibling nodes whose `anomalies` output is combined, in addition to
    /// the declared inputs.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Concatenates every anomalies input, ordered by start time.
pub struct CombinerDefinition;

impl PlanNodeDefinition for CombinerDefinition {
    fn type_name(&self) -> &str {
        "Combiner"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let spec: CombinerSpec = parse_params(bean)?;
        let mut bean = bean.clone();
        for source in &spec.sources {
            if !siblings.contains_key(source) {
                return Err(PipelineError::configuration(
                    &bean.name,
                    format!("source '{}' must be declared before the combiner", source),
                ));
            }
            let edge = InputBean::new(source, ANOMALIES_OUTPUT, source);
            if !bean.inputs.contains(&edge) {
                bean.inputs.push(edge);
            }
        }
        Ok(DefaultPlanNode::boxed(bean, interval, spec))
    }
}

impl OperatorSpec for CombinerSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(CombinerOperator {
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct CombinerOperator {
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl Operator for CombinerOperator {
    fn execute(&mut self) -> Result<()> {
        let mut properties: Vec<&String> = self.ctx.inputs.keys().collect();
        properties.sort();

        let mut combined = Vec::new();
        for property in properties {
            let anomalies = self.ctx.inputs[property].as_anomalies().ok_or_else(|| {
                anyhow!("combiner input '{}' does not hold anomalies", property)
            })?;
            combined.extend_from_slice(anomalies);
        }
        combined.sort_by_key(|a| (a.start_time, a.end_time));

        let mut outputs = OperatorOutputs::new();
        outputs.insert(
            ANOMALIES_OUTPUT.to_string(),
            Arc::new(DetectionResult::Anomalies(combined)),
        );
        self.outputs = outputs;
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}
