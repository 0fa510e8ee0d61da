use anyhow::{Result, bail};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::nodes::{ANOMALIES_OUTPUT, default_metric_column, default_timestamp_column};
use crate::plan::PlanNodeBean;
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::{Anomaly, DetectionResult};

/// Direction of change a percentage rule reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    Up,
    Down,
    #[default]
    UpOrDown,
}

impl Pattern {
    fn matches(self, change: f64, threshold: f64) -> bool {
        match self {
            Pattern::Up => change >= threshold,
            Pattern::Down => change <= -threshold,
            Pattern::UpOrDown => change.abs() >= threshold,
        }
    }
}

// --- PERCENTAGE CHANGE ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageChangeSpec {
    pub percentage_change: f64,
    #[serde(default)]
    pub pattern: Pattern,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default = "default_metric_column")]
    pub metric: String,
}

/// Flags points whose relative change against the baseline crosses
/// `percentageChange`. Inputs `current` and `baseline` are aligned by row.
pub struct PercentageChangeDetectorDefinition;

impl PlanNodeDefinition for PercentageChangeDetectorDefinition {
    fn type_name(&self) -> &str {
        "PercentageChangeDetector"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let spec: PercentageChangeSpec = parse_params(bean)?;
        if !spec.percentage_change.is_finite() || spec.percentage_change < 0.0 {
            return Err(PipelineError::configuration(
                &bean.name,
                format!(
                    "percentageChange must be a non-negative number, got {}",
                    spec.percentage_change
                ),
            ));
        }
        Ok(DefaultPlanNode::boxed(bean.clone(), interval, spec))
    }
}

impl OperatorSpec for PercentageChangeSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(PercentageChangeOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct PercentageChangeOperator {
    spec: PercentageChangeSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl Operator for PercentageChangeOperator {
    fn execute(&mut self) -> Result<()> {
        let current = self.ctx.table("current")?;
        let baseline = self.ctx.table("baseline")?;
        if current.len() != baseline.len() {
            bail!(
                "current has {} rows but baseline has {}",
                current.len(),
                baseline.len()
            );
        }

        let timestamps = current.longs(&self.spec.timestamp)?;
        let current_values = current.doubles(&self.spec.metric)?;
        let baseline_values = baseline.doubles(&self.spec.metric)?;

        let flags: Vec<bool> = current_values
            .iter()
            .zip(&baseline_values)
            .map(|(&cur, &base)| {
                if base == 0.0 || base.is_nan() || cur.is_nan() {
                    return false;
                }
                self.spec
                    .pattern
                    .matches((cur - base) / base, self.spec.percentage_change)
            })
            .collect();

        let anomalies = merge_anomalous_points(
            &timestamps,
            &current_values,
            &baseline_values,
            &flags,
            self.ctx.interval.end(),
        );
        debug!(node = %self.ctx.node_name, anomalies = anomalies.len(), "percentage change detection done");
        self.outputs = anomalies_output(anomalies);
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}

// --- THRESHOLD ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSpec {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default = "default_metric_column")]
    pub metric: String,
}

/// Flags points of input `current` outside `[min, max]`.
pub struct ThresholdDetectorDefinition;

impl PlanNodeDefinition for ThresholdDetectorDefinition {
    fn type_name(&self) -> &str {
        "ThresholdDetector"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let spec: ThresholdSpec = parse_params(bean)?;
        match (spec.min, spec.max) {
            (None, None) => {
                return Err(PipelineError::configuration(
                    &bean.name,
                    "at least one of min or max is required",
                ));
            }
            (Some(min), Some(max)) if min > max => {
                return Err(PipelineError::configuration(
                    &bean.name,
                    format!("min {} is greater than max {}", min, max),
                ));
            }
            _ => {}
        }
        Ok(DefaultPlanNode::boxed(bean.clone(), interval, spec))
    }
}

impl OperatorSpec for ThresholdSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(ThresholdOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct ThresholdOperator {
    spec: ThresholdSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl ThresholdOperator {
    /// The bound `value` violates, if any.
    fn violated_bound(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        match (self.spec.min, self.spec.max) {
            (Some(min), _) if value < min => Some(min),
            (_, Some(max)) if value > max => Some(max),
            _ => None,
        }
    }
}

impl Operator for ThresholdOperator {
    fn execute(&mut self) -> Result<()> {
        let current = self.ctx.table("current")?;
        let timestamps = current.longs(&self.spec.timestamp)?;
        let values = current.doubles(&self.spec.metric)?;

        let bounds: Vec<Option<f64>> = values.iter().map(|&v| self.violated_bound(v)).collect();
        let flags: Vec<bool> = bounds.iter().map(Option::is_some).collect();
        let baselines: Vec<f64> = bounds.iter().map(|b| b.unwrap_or(f64::NAN)).collect();

        let anomalies = merge_anomalous_points(
            &timestamps,
            &values,
            &baselines,
            &flags,
            self.ctx.interval.end(),
        );
        debug!(node = %self.ctx.node_name, anomalies = anomalies.len(), "threshold detection done");
        self.outputs = anomalies_output(anomalies);
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}

fn anomalies_output(anomalies: Vec<Anomaly>) -> OperatorOutputs {
    let mut outputs = OperatorOutputs::new();
    outputs.insert(
        ANOMALIES_OUTPUT.to_string(),
        Arc::new(DetectionResult::Anomalies(anomalies)),
    );
    outputs
}

/// Turns runs of consecutive flagged points into anomalies. A run ends at the
/// timestamp of the next point, or at `interval_end` for the last point.
pub fn merge_anomalous_points(
    timestamps: &[i64],
    current: &[f64],
    baseline: &[f64],
    flags: &[bool],
    interval_end: i64,
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let mut i = 0;
    while i < flags.len() {
        if !flags[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < flags.len() && flags[i] {
            i += 1;
        }
        let end_time = match timestamps.get(i) {
            Some(&next) => next,
            None => interval_end.max(timestamps[i - 1]),
        };
        anomalies.push(Anomaly {
            start_time: timestamps[start],
            end_time,
            avg_current_val: mean(&current[start..i]),
            avg_baseline_val: mean(&baseline[start..i]),
            severity: None,
        });
    }
    anomalies
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
