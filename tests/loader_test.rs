use detection_pipeline::nodes::standard_factory;
use detection_pipeline::plan::builder::PlanBuilder;
use detection_pipeline::plan::loader::load_plan;
use detection_pipeline::runtime::config::ExecutorConfig;
use detection_pipeline::runtime::executor::PlanExecutor;
use detection_pipeline::runtime::interval::DetectionInterval;
use detection_pipeline::runtime::result::AnomalySeverity;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[test]
fn test_load_yaml_plan() {
    let yaml_content = r#"
name: "yaml-plan"
nodes:
  - name: "a"
    type: "Echo"
    params:
      echo: "hi"
  - name: "root"
    type: "Echo"
    inputs:
      - sourcePlanNode: "a"
        sourceProperty: "output"
        targetProperty: "greeting"
"#;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("plan.yaml");
    fs::write(&file_path, yaml_content).expect("Failed to write temp file");

    let plan = load_plan(&file_path).expect("Failed to load plan from YAML");

    let expected = PlanBuilder::new()
        .node("a", "Echo").param("echo", "hi").build()
        .node("root", "Echo").input("a", "output", "greeting").build()
        .build();
    assert_eq!(plan.name, "yaml-plan");
    assert_eq!(plan.nodes, expected);
    assert_eq!(plan.interval, None);
    assert_eq!(plan.executor, ExecutorConfig::default());
}

#[test]
fn test_load_json_plan_with_edge_aliases() {
    let json_content = r#"{
  "name": "json-plan",
  "interval": {"start": 10, "end": 20},
  "executor": {"timeoutMs": 1500},
  "nodes": [
    {"name": "root", "type": "Echo", "inputs": [
      {"sourceNodeName": "a", "sourceOutputName": "output", "targetPropertyName": "x"}
    ]},
    {"name": "a", "type": "Echo", "params": {"echo": 1}}
  ]
}"#;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("plan.json");
    fs::write(&file_path, json_content).expect("Failed to write temp file");

    let plan = load_plan(&file_path).expect("Failed to load plan from JSON");

    assert_eq!(plan.interval, Some(DetectionInterval::new(10, 20).unwrap()));
    assert_eq!(plan.executor.timeout_ms, Some(1500));
    assert_eq!(plan.nodes[0].inputs[0].source_plan_node, "a");
    assert_eq!(plan.nodes[0].inputs[0].source_property, "output");
    assert_eq!(plan.nodes[0].inputs[0].target_property, "x");
}

#[test]
fn test_reject_inverted_interval() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("plan.yaml");
    fs::write(
        &file_path,
        "name: bad\ninterval: {start: 20, end: 10}\nnodes: []\n",
    )
    .expect("Failed to write temp file");

    assert!(load_plan(&file_path).is_err());
}

#[test]
fn test_missing_file() {
    let err = load_plan("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read plan file"));
}

#[test]
fn test_demo_plan_runs() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/percentage_change.yaml");
    let plan = load_plan(&path).expect("Failed to load demo plan");
    let interval = plan.interval.expect("demo plan defines an interval");

    let executor = PlanExecutor::with_config(Arc::new(standard_factory()), plan.executor.clone());
    let outputs = executor.run_pipeline(&plan.nodes, interval).expect("demo plan failed");

    let anomalies = outputs["anomalies"].as_anomalies().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].start_time, 2000);
    assert_eq!(anomalies[0].severity, Some(AnomalySeverity::High));
}
