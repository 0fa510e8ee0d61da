use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::runtime::interval::DetectionInterval;
use crate::runtime::result::{Anomaly, DataTable, DetectionResult};

pub type OperatorOutputs = HashMap<String, Arc<DetectionResult>>;

/// Executable behavior bound to one plan node for one run.
pub trait Operator: Send + Debug {
    /// Runs the unit of work. On error no outputs may be published.
    fn execute(&mut self) -> Result<()>;

    /// Outputs by name. Only meaningful after a successful `execute`.
    fn outputs(&self) -> &OperatorOutputs;
}

/// What an operator is built from: its node's name, the detection interval
/// and the inputs resolved for it.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub node_name: String,
    pub interval: DetectionInterval,
    pub inputs: HashMap<String, Arc<DetectionResult>>,
}

impl OperatorContext {
    pub fn input(&self, property: &str) -> Result<&Arc<DetectionResult>> {
        self.inputs
            .get(property)
            .ok_or_else(|| anyhow!("node '{}' has no input '{}'", self.node_name, property))
    }

    pub fn table(&self, property: &str) -> Result<&DataTable> {
        let input = self.input(property)?;
        input.as_table().ok_or_else(|| {
            anyhow!(
                "input '{}' of node '{}' is {}, expected table",
                property,
                self.node_name,
                input.kind()
            )
        })
    }

    pub fn anomalies(&self, property: &str) -> Result<&[Anomaly]> {
        let input = self.input(property)?;
        input.as_anomalies().ok_or_else(|| {
            anyhow!(
                "input '{}' of node '{}' is {}, expected anomalies",
                property,
                self.node_name,
                input.kind()
            )
        })
    }
}
