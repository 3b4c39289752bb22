//! CSV dataset loading
//!
//! Expected layout: a header row `id,timestamp,<feature...>,target` followed by
//! one instance per line. Integer feature cells are numeric, other non-empty
//! cells categorical, and empty cells missing.

use grove_core::{FeatureValue, Features, Instance};
use std::path::Path;
use tracing::debug;

use crate::errors::{Result, TrainerError};

/// Per-column presence counts of a loaded dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStats {
    pub name: String,
    pub numeric: usize,
    pub categorical: usize,
    pub missing: usize,
}

/// Load instances, parsing the target column with `parse_target`.
pub fn load_csv<T, P, F>(path: P, parse_target: F) -> Result<Vec<Instance<T>>>
where
    P: AsRef<Path>,
    F: Fn(&str) -> std::result::Result<T, String>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| TrainerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv(&content, parse_target)
}

/// Parse CSV text; see [`load_csv`].
pub fn parse_csv<T, F>(content: &str, parse_target: F) -> Result<Vec<Instance<T>>>
where
    F: Fn(&str) -> std::result::Result<T, String>,
{
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(line_idx, line)| (line_idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((header_line, header)) = lines.next() else {
        return Err(TrainerError::Dataset("dataset is empty".to_string()));
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if columns.len() < 3 || columns[0] != "id" || columns[1] != "timestamp" {
        return Err(TrainerError::Dataset(format!(
            "Line {header_line}: header must be id,timestamp,<features...>,target"
        )));
    }
    let feature_names = &columns[2..columns.len() - 1];

    let mut instances = Vec::new();
    for (line_no, line) in lines {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != columns.len() {
            return Err(TrainerError::Dataset(format!(
                "Line {line_no}: expected {} columns, got {}",
                columns.len(),
                parts.len()
            )));
        }
        if parts[0].is_empty() {
            return Err(TrainerError::Dataset(format!("Line {line_no}, column 1: empty id")));
        }
        let timestamp = parts[1].parse::<i64>().map_err(|_| {
            TrainerError::Dataset(format!("Line {line_no}, column 2: invalid timestamp"))
        })?;

        let mut features = Features::new();
        for (name, cell) in feature_names.iter().zip(&parts[2..parts.len() - 1]) {
            if !cell.is_empty() {
                features.insert(name.to_string(), FeatureValue::parse(cell));
            }
        }

        let target_column = parts.len();
        let target = parse_target(parts[target_column - 1]).map_err(|reason| {
            TrainerError::Dataset(format!(
                "Line {line_no}, column {target_column}: invalid target: {reason}"
            ))
        })?;

        instances.push(Instance::new(parts[0], timestamp, features, target));
    }

    if instances.is_empty() {
        return Err(TrainerError::Dataset("dataset has no rows".to_string()));
    }
    debug!(rows = instances.len(), features = feature_names.len(), "parsed dataset");
    Ok(instances)
}

/// Column-wise value kinds, in feature name order.
pub fn feature_stats<T>(instances: &[Instance<T>], names: &[String]) -> Vec<FeatureStats> {
    names
        .iter()
        .map(|name| {
            let mut stats = FeatureStats {
                name: name.clone(),
                numeric: 0,
                categorical: 0,
                missing: 0,
            };
            for instance in instances {
                match instance.features.get(name) {
                    Some(FeatureValue::Numeric(_)) => stats.numeric += 1,
                    Some(FeatureValue::Categorical(_)) => stats.categorical += 1,
                    None => stats.missing += 1,
                }
            }
            stats
        })
        .collect()
}

/// Sorted union of feature names over all instances.
pub fn feature_names<T>(instances: &[Instance<T>]) -> Vec<String> {
    let mut names: Vec<String> = instances
        .iter()
        .flat_map(|instance| instance.features.keys().cloned())
        .collect();
    names.sort();
    names.dedup();
    names
}
