//! Lazy, memoized execution of detection plans.
//!
//! A plan is a list of [`plan::PlanNodeBean`]s. The [`runtime::executor::PlanExecutor`]
//! turns them into plan nodes through a [`runtime::node::PlanNodeFactory`] and resolves
//! the DAG on demand starting at the node named [`runtime::executor::ROOT_NODE_NAME`].

pub mod nodes;
pub mod plan;
pub mod runtime;
