use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::path::Path;

use crate::plan::Plan;

/// Reads a plan file. `.json` files are parsed as JSON, anything else as YAML.
pub fn load_plan(file_path: impl AsRef<Path>) -> Result<Plan> {
    let path = file_path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file from {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let plan: Plan = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to deserialize JSON plan from {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to deserialize YAML plan from {}", path.display()))?
    };

    Ok(plan)
}
