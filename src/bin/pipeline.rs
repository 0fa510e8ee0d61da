use anyhow::{Context as AnyhowContext, Result, anyhow};
use clap::{Parser, Subcommand};
use detection_pipeline::nodes::standard_factory;
use detection_pipeline::plan::Plan;
use detection_pipeline::plan::loader::load_plan;
use detection_pipeline::runtime::concurrent::ConcurrentPlanExecutor;
use detection_pipeline::runtime::context::get_output;
use detection_pipeline::runtime::executor::{PlanExecutor, ROOT_NODE_NAME, build_plan_node_map};
use detection_pipeline::runtime::interval::DetectionInterval;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan and print the outputs of its root node as JSON
    Run {
        /// Path to the plan file (YAML or JSON)
        #[arg(long, short)]
        file: PathBuf,

        /// Interval start in epoch millis (overrides the plan file)
        #[arg(long)]
        start: Option<i64>,

        /// Interval end in epoch millis, exclusive (overrides the plan file)
        #[arg(long)]
        end: Option<i64>,

        /// Resolve independent inputs in parallel
        #[arg(long)]
        concurrent: bool,

        /// Print this node's outputs instead of the root's
        #[arg(long)]
        node: Option<String>,
    },

    /// Build every node of a plan without running any operator
    Validate {
        /// Path to the plan file (YAML or JSON)
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn resolve_interval(plan: &Plan, start: Option<i64>, end: Option<i64>) -> Result<DetectionInterval> {
    let start = start
        .or(plan.interval.map(|i| i.start()))
        .ok_or_else(|| anyhow!("no interval start given and plan '{}' defines none", plan.name))?;
    let end = end
        .or(plan.interval.map(|i| i.end()))
        .ok_or_else(|| anyhow!("no interval end given and plan '{}' defines none", plan.name))?;
    Ok(DetectionInterval::new(start, end)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let factory = Arc::new(standard_factory());

    match cli.command {
        Commands::Run {
            file,
            start,
            end,
            concurrent,
            node,
        } => {
            let plan = load_plan(&file)?;
            let interval = resolve_interval(&plan, start, end)?;
            info!(plan = %plan.name, %interval, concurrent, "Running plan");

            let context = if concurrent {
                ConcurrentPlanExecutor::with_config(factory, plan.executor.clone())
                    .run_pipeline_with_context(&plan.nodes, interval)
                    .await?
            } else {
                PlanExecutor::with_config(factory, plan.executor.clone())
                    .run_pipeline_with_context(&plan.nodes, interval)?
            };

            let node_name = node.as_deref().unwrap_or(ROOT_NODE_NAME);
            let outputs = get_output(&context, node_name);
            let printable: BTreeMap<_, _> = outputs.iter().map(|(k, v)| (k, v.as_ref())).collect();
            let json = serde_json::to_string_pretty(&printable)
                .context("Failed to serialize outputs")?;
            println!("{}", json);
        }

        Commands::Validate { file } => {
            let plan = load_plan(&file)?;
            let interval = match plan.interval {
                Some(interval) => interval,
                None => DetectionInterval::new(0, 0)?,
            };
            let nodes = build_plan_node_map(&factory, &plan.nodes, interval)?;
            if !nodes.contains_key(ROOT_NODE_NAME) {
                return Err(anyhow!("plan '{}' has no '{}' node", plan.name, ROOT_NODE_NAME));
            }
            println!("Plan '{}' is valid ({} nodes).", plan.name, nodes.len());
        }
    }

    Ok(())
}
