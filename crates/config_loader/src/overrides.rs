//! 覆盖项 (`section.key=value`)
//!
//! Values are parsed as JSON when possible (`7`, `0.3`, `true`, `{"a":1}`),
//! otherwise taken as plain strings (`data_split,download`).

use std::str::FromStr;

use contracts::ContractError;
use serde_json::{Map, Value};

/// One dotted-path override
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    path: Vec<String>,
    value: Value,
}

impl Override {
    pub fn new(path: &str, value: Value) -> Result<Self, ContractError> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ContractError::config_parse(format!(
                "invalid override path '{path}'"
            )));
        }
        Ok(Self {
            path: segments,
            value,
        })
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl FromStr for Override {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, raw) = s.split_once('=').ok_or_else(|| {
            ContractError::config_parse(format!("override '{s}' must look like key.path=value"))
        })?;
        let raw = raw.trim();
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Self::new(path.trim(), value)
    }
}

/// Apply overrides in order; later ones win
pub fn apply_overrides(tree: &mut Value, overrides: &[Override]) -> Result<(), ContractError> {
    for ov in overrides {
        apply_one(tree, ov)?;
    }
    Ok(())
}

fn apply_one(tree: &mut Value, ov: &Override) -> Result<(), ContractError> {
    let (last, parents) = match ov.path.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };

    let mut node = tree;
    for segment in parents {
        let table = as_table(node, &ov.path())?;
        node = table
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    as_table(node, &ov.path())?.insert(last.clone(), ov.value.clone());
    Ok(())
}

fn as_table<'a>(node: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, ContractError> {
    node.as_object_mut().ok_or_else(|| {
        ContractError::config_validation(path, "override path goes through a non-table value")
    })
}
