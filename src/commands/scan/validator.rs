use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::model::Record;

pub const TESTCASE_TYPE: &str = "testcase";

const SCANNED_TICKET_IDS: usize = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Valid,
    NotTestcase,
    NoTestId,
    IdMismatch,
    HasParameters,
    NotFound,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::NotTestcase => "invalid-not-testcase",
            Self::NoTestId => "invalid-no-test-id",
            Self::IdMismatch => "invalid-id-mismatch",
            Self::HasParameters => "invalid-has-parameters",
            Self::NotFound => "invalid-not-found",
        }
    }

    pub fn reason(self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::NotTestcase => Some("Ticket is not a testcase."),
            Self::NoTestId => Some("Ticket does not have a testCaseID."),
            Self::IdMismatch => Some("Ticket contains invalid testCaseID"),
            Self::HasParameters => Some("Ticket contains test parameters"),
            Self::NotFound => Some("Ticket was not found in the tracker."),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationOutcome {
    pub verdict: Verdict,
    pub resolved_id: String,
    pub parameters: BTreeSet<String>,
}

impl ValidationOutcome {
    fn new(verdict: Verdict, resolved_id: impl Into<String>) -> Self {
        Self {
            verdict,
            resolved_id: resolved_id.into(),
            parameters: BTreeSet::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(Verdict::NotFound, "")
    }

    pub fn with_parameters(mut self, parameters: BTreeSet<String>) -> Self {
        if self.verdict == Verdict::Valid && !parameters.is_empty() {
            self.verdict = Verdict::HasParameters;
            self.parameters = parameters;
        }
        self
    }
}

pub struct IdMatchValidator {
    ticket_id: Regex,
}

impl IdMatchValidator {
    pub fn new() -> Result<Self> {
        let ticket_id =
            Regex::new(r"[A-Za-z]+[-_]\d+").context("failed to compile ticket id regex")?;
        Ok(Self { ticket_id })
    }

    pub fn validate(&self, record: &Record, own_identifier: &str) -> ValidationOutcome {
        if record.type_tag != TESTCASE_TYPE {
            return ValidationOutcome::new(Verdict::NotTestcase, "");
        }
        let Some(test_id) = record.test_id.as_deref() else {
            return ValidationOutcome::new(Verdict::NoTestId, "");
        };

        let prefix_match = self
            .ticket_id
            .find_iter(test_id)
            .take(SCANNED_TICKET_IDS)
            .any(|found| found.as_str() == own_identifier);

        // The canonical shape decides; the prefix scan only feeds diagnostics.
        let shape_match = canonical_shapes(own_identifier, &record.title)
            .iter()
            .any(|shape| shape == test_id);
        if prefix_match != shape_match {
            debug!(
                id = %own_identifier,
                test_id = %test_id,
                prefix_match,
                shape_match,
                "prefix scan disagrees with canonical shape"
            );
        }

        let quoted_title = record.title.contains('"');
        if shape_match && !quoted_title {
            ValidationOutcome::new(Verdict::Valid, test_id)
        } else {
            ValidationOutcome::new(Verdict::IdMismatch, test_id)
        }
    }
}

fn canonical_shapes(id: &str, title: &str) -> [String; 2] {
    [format!("{id}.{id} - {title}"), format!("{id}.{id}")]
}
