mod common;

use common::{count, executed, interval, new_log, test_factory};
use detection_pipeline::plan::PlanNodeBean;
use detection_pipeline::plan::builder::PlanBuilder;
use detection_pipeline::runtime::concurrent::ConcurrentPlanExecutor;
use detection_pipeline::runtime::config::ExecutorConfig;
use detection_pipeline::runtime::context::ContextKey;
use detection_pipeline::runtime::error::PipelineError;
use detection_pipeline::runtime::executor::PlanExecutor;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_matches_sequential() {
    let plan = PlanBuilder::new()
        .node("A", "Probe").build()
        .node("B", "Probe").input("A", "default", "a").build()
        .node("C", "Probe").input("A", "default", "a").build()
        .node("root", "Probe")
            .input("B", "default", "b")
            .input("C", "default", "c")
            .input("A", "default", "a")
            .build()
        .build();

    let log = new_log();
    let concurrent = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .expect("concurrent run failed");

    assert_eq!(count(&log, "A"), 1, "shared node must run once");
    assert_eq!(executed(&log).len(), 4);

    let sequential_log = new_log();
    let sequential = PlanExecutor::new(test_factory(&sequential_log))
        .run_pipeline(&plan, interval())
        .expect("sequential run failed");
    assert_eq!(concurrent, sequential);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_inputs_run_in_parallel() {
    let plan = PlanBuilder::new()
        .node("slow1", "Probe").param("sleepMs", 200).build()
        .node("slow2", "Probe").param("sleepMs", 200).build()
        .node("slow3", "Probe").param("sleepMs", 200).build()
        .node("root", "Probe")
            .input("slow1", "default", "x")
            .input("slow2", "default", "y")
            .input("slow3", "default", "z")
            .build()
        .build();

    let log = new_log();
    let started = Instant::now();
    ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .expect("run failed");

    assert!(
        started.elapsed() < Duration::from_millis(550),
        "siblings should overlap, took {:?}",
        started.elapsed()
    );
    assert_eq!(executed(&log).last().map(String::as_str), Some("root"));
}

#[tokio::test]
async fn test_failure_is_reported_from_failing_node() {
    let plan = PlanBuilder::new()
        .node("A", "Probe").build()
        .node("C", "Probe").param("fail", true).input("A", "default", "a").build()
        .node("root", "Probe").input("C", "default", "c").build()
        .build();

    let log = new_log();
    let err = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Computation { ref node, .. } if node == "C"));
    assert_eq!(count(&log, "root"), 0);
}

#[tokio::test]
async fn test_cycle_rejected_before_execution() {
    let plan = PlanBuilder::new()
        .node("leaf", "Probe").build()
        .node("a", "Probe").input("leaf", "default", "l").input("b", "default", "b").build()
        .node("b", "Probe").input("a", "default", "a").build()
        .node("root", "Probe").input("a", "default", "a").build()
        .build();

    let log = new_log();
    let err = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();

    match err {
        PipelineError::CyclicPlan { node, path } => {
            assert_eq!(node, "a");
            assert_eq!(path, vec!["root", "a", "b", "a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(executed(&log).is_empty());
}

#[tokio::test]
async fn test_missing_dependency() {
    let plan = PlanBuilder::new()
        .node("root", "Probe").input("ghost", "out", "x").build()
        .build();

    let log = new_log();
    let err = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();

    match err {
        PipelineError::MissingDependency { node, key } => {
            assert_eq!(node, "root");
            assert_eq!(key, ContextKey::new("ghost", "out"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_root() {
    let plan = PlanBuilder::new().node("A", "Probe").build().build();

    let log = new_log();
    let err = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingRoot(_)));
    assert!(executed(&log).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_exceeded() {
    let plan = PlanBuilder::new()
        .node("slow", "Probe").param("sleepMs", 300).build()
        .node("root", "Probe").input("slow", "default", "x").build()
        .build();
    let config = ExecutorConfig {
        timeout_ms: Some(50),
        ..ExecutorConfig::default()
    };

    let log = new_log();
    let err = ConcurrentPlanExecutor::with_config(test_factory(&log), config)
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DeadlineExceeded(d) if d == Duration::from_millis(50)));
    assert_eq!(count(&log, "root"), 0);
}

/// `root <- n1 <- n2 <- ... <- n{len}`
fn chain(len: usize) -> Vec<PlanNodeBean> {
    let mut builder = PlanBuilder::new().node(&format!("n{len}"), "Probe").build();
    for i in (1..len).rev() {
        builder = builder
            .node(&format!("n{i}"), "Probe")
            .input(&format!("n{}", i + 1), "default", "x")
            .build();
    }
    builder
        .node("root", "Probe")
        .input("n1", "default", "x")
        .build()
        .build()
}

#[tokio::test]
async fn test_chain_deeper_than_max_depth_is_rejected() {
    let config = ExecutorConfig {
        max_depth: 8,
        ..ExecutorConfig::default()
    };

    let log = new_log();
    let err = ConcurrentPlanExecutor::with_config(test_factory(&log), config)
        .run_pipeline(&chain(20), interval())
        .await
        .unwrap_err();

    match err {
        PipelineError::CyclicPlan { node, path } => {
            assert_eq!(node, "n8");
            assert_eq!(path.len(), 9);
            assert_eq!(path.first().map(String::as_str), Some("root"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(executed(&log).is_empty());
}

#[tokio::test]
async fn test_very_long_chain_reports_instead_of_overflowing() {
    let plan = chain(100_000);

    let log = new_log();
    let err = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&plan, interval())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CyclicPlan { .. }));
    assert!(executed(&log).is_empty());

    let sequential = PlanExecutor::new(test_factory(&log)).run_pipeline(&plan, interval());
    assert!(matches!(sequential, Err(PipelineError::CyclicPlan { .. })));
}

#[tokio::test]
async fn test_chain_within_max_depth_runs() {
    let log = new_log();
    let outputs = ConcurrentPlanExecutor::new(test_factory(&log))
        .run_pipeline(&chain(50), interval())
        .await
        .expect("run failed");

    assert!(outputs.contains_key("default"));
    assert_eq!(executed(&log).len(), 51);
    assert_eq!(executed(&log).first().map(String::as_str), Some("n50"));
}
