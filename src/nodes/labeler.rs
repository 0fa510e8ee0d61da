use anyhow::Result;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, warn};

use crate::nodes::ANOMALIES_OUTPUT;
use crate::plan::PlanNodeBean;
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::{AnomalySeverity, DetectionResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub change: f64,
    pub duration: i64,
}

#[derive(Debug, Deserialize)]
struct RawThreshold {
    change: Option<f64>,
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawLabelerParams {
    #[serde(default)]
    severity: HashMap<String, RawThreshold>,
}

/// Severity thresholds, iterated from the highest priority down.
#[derive(Debug, Clone)]
pub struct LabelerSpec {
    pub thresholds: BTreeMap<AnomalySeverity, Threshold>,
}

pub struct ThresholdSeverityLabelerDefinition;

impl PlanNodeDefinition for ThresholdSeverityLabelerDefinition {
    fn type_name(&self) -> &str {
        "ThresholdSeverityLabeler"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let raw: RawLabelerParams = parse_params(bean)?;
        let mut thresholds = BTreeMap::new();
        for (name, threshold) in raw.severity {
            match name.parse::<AnomalySeverity>() {
                Ok(severity) => {
                    thresholds.insert(
                        severity,
                        Threshold {
                            change: threshold.change.unwrap_or(f64::MAX),
                            duration: threshold.duration.unwrap_or(i64::MAX),
                        },
                    );
                }
                Err(e) => error!(node = %bean.name, error = %e, "ignoring invalid severity"),
            }
        }
        Ok(DefaultPlanNode::boxed(
            bean.clone(),
            interval,
            LabelerSpec { thresholds },
        ))
    }
}

impl OperatorSpec for LabelerSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(LabelerOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct LabelerOperator {
    spec: LabelerSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl LabelerOperator {
    fn label(&self, deviation: f64, duration: i64) -> Option<AnomalySeverity> {
        self.spec
            .thresholds
            .iter()
            .find(|(_, t)| deviation >= t.change || duration >= t.duration)
            .map(|(severity, _)| *severity)
    }
}

impl Operator for LabelerOperator {
    fn execute(&mut self) -> Result<()> {
        let mut labeled = self.ctx.anomalies("anomalies")?.to_vec();
        for anomaly in &mut labeled {
            if anomaly.avg_current_val.is_nan() || anomaly.avg_baseline_val.is_nan() {
                warn!(
                    node = %self.ctx.node_name,
                    start = anomaly.start_time,
                    end = anomaly.end_time,
                    "unable to label anomaly, skipping"
                );
                continue;
            }
            if let Some(severity) = self.label(anomaly.deviation(), anomaly.duration_millis()) {
                anomaly.severity = Some(severity);
            }
        }

        let mut outputs = OperatorOutputs::new();
        outputs.insert(
            ANOMALIES_OUTPUT.to_string(),
            Arc::new(DetectionResult::Anomalies(labeled)),
        );
        self.outputs = outputs;
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}
