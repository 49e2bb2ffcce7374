use std::collections::HashMap;

use serde::Serialize;

use super::{IdMatchValidator, ParameterExtractor, ValidationOutcome, Verdict};
use crate::model::{InventoryRow, Record};

#[derive(Debug, Clone)]
pub struct Classified {
    pub row: InventoryRow,
    pub record: Option<Record>,
    pub outcome: ValidationOutcome,
}

impl Classified {
    pub fn is_ready(&self) -> bool {
        self.outcome.verdict == Verdict::Valid && self.outcome.parameters.is_empty()
    }

    pub fn display_title(&self) -> String {
        match &self.record {
            Some(record) => format!("{} {}", record.id, record.title),
            None => self.row.identifier.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Ready { title: String, id: String },
    Flagged(FlaggedEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedEntry {
    pub title: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub author: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub id: String,
    pub params: Vec<String>,
}

pub fn classify_rows(
    rows: &[InventoryRow],
    records: &[Record],
    validator: &IdMatchValidator,
    extractor: &ParameterExtractor,
) -> Vec<Classified> {
    let mut by_id: HashMap<&str, &Record> = HashMap::with_capacity(records.len());
    for record in records {
        by_id.entry(record.id.as_str()).or_insert(record);
    }

    rows.iter()
        .map(|row| {
            let Some(record) = by_id.get(row.identifier.as_str()).copied() else {
                return Classified {
                    row: row.clone(),
                    record: None,
                    outcome: ValidationOutcome::not_found(),
                };
            };

            let mut outcome = validator.validate(record, &row.identifier);
            if outcome.verdict == Verdict::Valid {
                outcome = outcome.with_parameters(extractor.extract(&record.steps));
            }

            Classified {
                row: row.clone(),
                record: Some(record.clone()),
                outcome,
            }
        })
        .collect()
}

pub fn build_report(classified: &[Classified]) -> Vec<ReportEntry> {
    let ready = classified
        .iter()
        .filter(|entry| entry.is_ready())
        .map(|entry| ReportEntry::Ready {
            title: entry.display_title(),
            id: entry.outcome.resolved_id.clone(),
        });

    let flagged = classified
        .iter()
        .filter(|entry| !entry.is_ready())
        .map(|entry| {
            let (type_tag, author, status) = entry
                .record
                .as_ref()
                .map(|record| {
                    (
                        record.type_tag.clone(),
                        record.author.clone(),
                        record.status.clone(),
                    )
                })
                .unwrap_or_default();
            ReportEntry::Flagged(FlaggedEntry {
                title: entry.display_title(),
                type_tag,
                author,
                status,
                comment: entry.outcome.verdict.reason().map(ToOwned::to_owned),
                id: entry.outcome.resolved_id.clone(),
                params: entry.outcome.parameters.iter().cloned().collect(),
            })
        });

    ready.chain(flagged).collect()
}
