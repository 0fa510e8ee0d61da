pub mod concurrent;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod interval;
pub mod node;
pub mod operator;
pub mod result;
