//! Built-in plan node variants.

pub mod combiner;
pub mod common;
pub mod data;
pub mod detector;
pub mod filter;
pub mod labeler;

use crate::runtime::node::PlanNodeFactory;

pub const ANOMALIES_OUTPUT: &str = "anomalies";
pub const CURRENT_DATA_OUTPUT: &str = "currentData";
pub const ECHO_OUTPUT: &str = "output";

pub(crate) fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

pub(crate) fn default_metric_column() -> String {
    "value".to_string()
}

pub fn register_standard_nodes(factory: &mut PlanNodeFactory) {
    factory.register(Box::new(common::EchoDefinition));
    factory.register(Box::new(data::DataFetcherDefinition));
    factory.register(Box::new(detector::PercentageChangeDetectorDefinition));
    factory.register(Box::new(detector::ThresholdDetectorDefinition));
    factory.register(Box::new(labeler::ThresholdSeverityLabelerDefinition));
    factory.register(Box::new(combiner::CombinerDefinition));
    factory.register(Box::new(filter::AnomalyFilterDefinition));
}

/// A factory with every built-in node type registered.
pub fn standard_factory() -> PlanNodeFactory {
    let mut factory = PlanNodeFactory::new();
    register_standard_nodes(&mut factory);
    factory
}
