use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::nodes::{CURRENT_DATA_OUTPUT, default_timestamp_column};
use crate::plan::PlanNodeBean;
use crate::runtime::error::PipelineError;
use crate::runtime::interval::DetectionInterval;
use crate::runtime::node::{
    DefaultPlanNode, OperatorSpec, PlanNode, PlanNodeDefinition, PlanNodeMap, parse_params,
};
use crate::runtime::operator::{Operator, OperatorContext, OperatorOutputs};
use crate::runtime::result::{DataTable, DetectionResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetcherSpec {
    pub table: DataTable,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default = "default_filter")]
    pub filter_by_interval: bool,
}

fn default_filter() -> bool {
    true
}

/// Leaf node serving an inline table, optionally restricted to the
/// detection interval.
pub struct DataFetcherDefinition;

impl PlanNodeDefinition for DataFetcherDefinition {
    fn type_name(&self) -> &str {
        "DataFetcher"
    }

    fn prepare(
        &self,
        bean: &PlanNodeBean,
        interval: DetectionInterval,
        _siblings: &PlanNodeMap,
    ) -> Result<Box<dyn PlanNode>, PipelineError> {
        let spec: DataFetcherSpec = parse_params(bean)?;
        if spec.filter_by_interval && spec.table.column_index(&spec.timestamp).is_none() {
            return Err(PipelineError::configuration(
                &bean.name,
                format!("timestamp column '{}' not in table", spec.timestamp),
            ));
        }
        if let Some(row) = spec
            .table
            .rows
            .iter()
            .position(|r| r.len() != spec.table.columns.len())
        {
            return Err(PipelineError::configuration(
                &bean.name,
                format!("row {} does not match the column count", row),
            ));
        }
        Ok(DefaultPlanNode::boxed(bean.clone(), interval, spec))
    }
}

impl OperatorSpec for DataFetcherSpec {
    fn into_operator(self, ctx: OperatorContext) -> Box<dyn Operator> {
        Box::new(DataFetcherOperator {
            spec: self,
            ctx,
            outputs: OperatorOutputs::new(),
        })
    }
}

#[derive(Debug)]
pub struct DataFetcherOperator {
    spec: DataFetcherSpec,
    ctx: OperatorContext,
    outputs: OperatorOutputs,
}

impl Operator for DataFetcherOperator {
    fn execute(&mut self) -> Result<()> {
        let table = if self.spec.filter_by_interval {
            let idx = self
                .spec
                .table
                .column_index(&self.spec.timestamp)
                .ok_or_else(|| anyhow!("timestamp column '{}' not found", self.spec.timestamp))?;
            // reject bad timestamps instead of silently dropping rows
            self.spec.table.longs(&self.spec.timestamp)?;
            let interval = self.ctx.interval;
            self.spec.table.retain_rows(|row| {
                row.get(idx)
                    .and_then(|v| v.as_i64())
                    .is_some_and(|ts| interval.contains(ts))
            })
        } else {
            self.spec.table.clone()
        };

        debug!(node = %self.ctx.node_name, rows = table.len(), "fetched data");
        let mut outputs = OperatorOutputs::new();
        outputs.insert(
            CURRENT_DATA_OUTPUT.to_string(),
            Arc::new(DetectionResult::Table(table)),
        );
        self.outputs = outputs;
        Ok(())
    }

    fn outputs(&self) -> &OperatorOutputs {
        &self.outputs
    }
}
