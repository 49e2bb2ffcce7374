use anyhow::Result;
use tracing::{debug, info, warn};

use super::{
    CheckpointStore, Classified, IdMatchValidator, ParameterExtractor, ReportEntry, Retrieval,
    build_report, classify_rows,
};
use crate::cli::ScanArgs;
use crate::interrupt::{CancellationToken, Interrupted};
use crate::model::{Record, identifiers};
use crate::tracker::{PolarionClient, WorkItemSource, parse_credentials};
use crate::util::write_json_pretty;
use crate::workbook::{InventorySheet, XlsxWorkbook, annotate_row, read_inventory};

#[derive(Debug)]
pub struct Audit {
    pub identifiers: Vec<String>,
    pub records: Vec<Record>,
    pub classified: Vec<Classified>,
    pub report: Vec<ReportEntry>,
}

impl Audit {
    pub fn flagged_count(&self) -> usize {
        self.classified.iter().filter(|entry| !entry.is_ready()).count()
    }
}

pub fn run(args: ScanArgs) -> Result<()> {
    let credentials = parse_credentials(&args.credentials)?;
    let mut workbook = XlsxWorkbook::open(&args.spreadsheet)?;
    if !args.dry_run {
        workbook.ensure_writable()?;
    }

    let store = CheckpointStore::new(args.checkpoint_path.clone(), &args.spreadsheet);
    let cancel = CancellationToken::new();
    cancel.install_ctrlc_handler()?;

    let mut client =
        PolarionClient::new(&args.server_url, &args.project, &credentials, args.insecure)?;

    info!(
        spreadsheet = %args.spreadsheet.display(),
        server = %args.server_url,
        project = %args.project,
        user = %credentials.username,
        chunk_size = args.chunk_size.get(),
        "starting scan"
    );

    let audit = audit_inventory(
        &mut workbook,
        &mut client,
        &store,
        &cancel,
        args.chunk_size.get(),
    )?;

    let audit = persist_sheet(&mut workbook, audit, &store, &cancel, args.dry_run)?;
    if args.dry_run {
        info!(flagged = audit.flagged_count(), "dry-run: spreadsheet left untouched");
    } else {
        info!(
            path = %args.spreadsheet.display(),
            flagged = audit.flagged_count(),
            "annotated spreadsheet"
        );
    }

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &audit.report)?;
        info!(path = %report_path.display(), entries = audit.report.len(), "wrote report");
    }

    store.clear()?;

    info!(
        rows = audit.classified.len(),
        ready = audit.classified.len() - audit.flagged_count(),
        flagged = audit.flagged_count(),
        "scan completed"
    );
    Ok(())
}

pub fn persist_sheet<W: InventorySheet>(
    sheet: &mut W,
    audit: Audit,
    store: &CheckpointStore,
    cancel: &CancellationToken,
    dry_run: bool,
) -> Result<Audit> {
    let section = cancel.critical_section();
    if !dry_run {
        sheet.persist()?;
    }
    if !section.finish() {
        return Ok(audit);
    }

    // Everything is fetched; a rerun resumes with nothing left to query.
    let total = audit.identifiers.len();
    let checkpoint = store.snapshot(&audit.identifiers, total, audit.records);
    let section = cancel.critical_section();
    store.save(&checkpoint)?;
    let _ = section.finish();
    Err(Interrupted {
        checkpoint_path: store.path().to_path_buf(),
        cursor: total,
        total,
    }
    .into())
}

pub fn audit_inventory<W: InventorySheet, S: WorkItemSource>(
    sheet: &mut W,
    source: &mut S,
    store: &CheckpointStore,
    cancel: &CancellationToken,
    chunk_size: usize,
) -> Result<Audit> {
    let rows = read_inventory(sheet)?;
    let identifiers = identifiers(&rows);
    if identifiers.is_empty() {
        warn!("inventory lists no identifiers");
    }

    let validator = IdMatchValidator::new()?;
    let extractor = ParameterExtractor::new()?;

    let resume = store.load(&identifiers);
    let records = Retrieval::new(source, store, cancel, chunk_size).fetch(&identifiers, resume)?;

    let classified = classify_rows(&rows, &records, &validator, &extractor);
    for (idx, entry) in classified.iter().enumerate() {
        match entry.outcome.verdict.reason() {
            Some(reason) if !entry.is_ready() => {
                info!(
                    n = idx,
                    row = entry.row.row,
                    ticket = %entry.display_title(),
                    verdict = entry.outcome.verdict.as_str(),
                    test_id = %entry.outcome.resolved_id,
                    params = %entry.outcome.parameters.iter().cloned().collect::<Vec<_>>().join(","),
                    "flagged"
                );
                annotate_row(sheet, entry.row.row, reason);
            }
            _ => debug!(
                n = idx,
                row = entry.row.row,
                ticket = %entry.display_title(),
                test_id = %entry.outcome.resolved_id,
                "ready"
            ),
        }
    }

    let report = build_report(&classified);
    Ok(Audit {
        identifiers,
        records,
        classified,
        report,
    })
}
