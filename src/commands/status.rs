use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::scan::read_checkpoint;
use crate::model::{Checkpoint, identifiers};
use crate::util::fingerprint;
use crate::workbook::{XlsxWorkbook, read_inventory};

pub fn run(args: StatusArgs) -> Result<()> {
    let path = &args.checkpoint_path;
    info!(path = %path.display(), "status requested");

    if !path.exists() {
        warn!(path = %path.display(), "no checkpoint, the next scan starts from zero");
        return Ok(());
    }

    let checkpoint = read_checkpoint(path)?;
    info!(
        spreadsheet = %checkpoint.filename,
        cursor = checkpoint.index,
        total = checkpoint.cells.len(),
        records = checkpoint.items.len(),
        saved_at = %checkpoint.saved_at.clone().unwrap_or_default(),
        "loaded checkpoint"
    );

    if let Some(spreadsheet) = &args.spreadsheet {
        let workbook = XlsxWorkbook::open(spreadsheet)?;
        let current = identifiers(&read_inventory(&workbook)?);
        let source = spreadsheet.display().to_string();

        match staleness(&checkpoint, &source, &current) {
            None => info!(
                remaining = current.len().saturating_sub(checkpoint.index),
                "checkpoint matches the spreadsheet and will be resumed"
            ),
            Some(reason) => warn!(reason, "checkpoint will be discarded by the next scan"),
        }
    }

    Ok(())
}

fn staleness(checkpoint: &Checkpoint, source: &str, current: &[String]) -> Option<&'static str> {
    if checkpoint.filename != source {
        Some("saved for another spreadsheet")
    } else if checkpoint.hash != fingerprint(current) {
        Some("identifier list changed")
    } else if checkpoint.index > current.len() {
        Some("cursor past the identifier list")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(cells: &[&str], index: usize) -> Checkpoint {
        let cells = cells.iter().map(|cell| cell.to_string()).collect::<Vec<_>>();
        Checkpoint {
            filename: "inventory.xlsx".to_string(),
            hash: fingerprint(&cells),
            index,
            cells,
            items: Vec::new(),
            saved_at: None,
        }
    }

    #[test]
    fn staleness_reports_why_a_checkpoint_would_be_dropped() {
        let current = vec!["AP-1".to_string(), "AP-2".to_string()];

        assert_eq!(staleness(&checkpoint(&["AP-1", "AP-2"], 1), "inventory.xlsx", &current), None);
        assert_eq!(
            staleness(&checkpoint(&["AP-1", "AP-2"], 1), "other.xlsx", &current),
            Some("saved for another spreadsheet")
        );
        assert_eq!(
            staleness(&checkpoint(&["AP-1"], 1), "inventory.xlsx", &current),
            Some("identifier list changed")
        );
        assert_eq!(
            staleness(&checkpoint(&["AP-1", "AP-2"], 3), "inventory.xlsx", &current),
            Some("cursor past the identifier list")
        );
    }
}
