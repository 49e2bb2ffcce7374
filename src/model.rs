use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type StepEntry = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub author: String,
    pub status: String,
    #[serde(rename = "testid")]
    pub test_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
}

/// Persisted fetch progress. `index` counts identifiers of `cells` already
/// resolved; `items` holds every record fetched up to that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub filename: String,
    pub hash: String,
    pub index: usize,
    pub cells: Vec<String>,
    pub items: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub row: u32,
    pub identifier: String,
}

pub fn identifiers(rows: &[InventoryRow]) -> Vec<String> {
    rows.iter().map(|row| row.identifier.clone()).collect()
}
