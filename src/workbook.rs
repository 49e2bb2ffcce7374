use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;
use umya_spreadsheet::{Comment, Spreadsheet};

use crate::model::InventoryRow;

pub const ID_COLUMN: u32 = 1;
pub const NAME_COLUMN: u32 = 2;
pub const ID_HEADER: &str = "Polarion ID";
pub const NAME_HEADER: &str = "Test case name";
pub const HIGHLIGHT_ARGB: &str = "FFFF7D7D";
pub const NOTE_AUTHOR: &str = "Test Automation";

const HEADER_ROW: u32 = 1;

pub trait InventorySheet {
    fn cell_text(&self, column: u32, row: u32) -> Option<String>;
    fn highest_row(&self) -> u32;
    fn highlight(&mut self, column: u32, row: u32);
    fn attach_note(&mut self, column: u32, row: u32, text: &str);
    fn persist(&mut self) -> Result<()>;
}

pub fn read_inventory(sheet: &impl InventorySheet) -> Result<Vec<InventoryRow>> {
    verify_header(sheet, ID_COLUMN, ID_HEADER)?;
    verify_header(sheet, NAME_COLUMN, NAME_HEADER)?;

    let rows = (HEADER_ROW + 1..=sheet.highest_row())
        .filter_map(|row| {
            let identifier = sheet.cell_text(ID_COLUMN, row)?;
            let identifier = identifier.trim();
            (!identifier.is_empty()).then(|| InventoryRow {
                row,
                identifier: identifier.to_string(),
            })
        })
        .collect::<Vec<_>>();

    debug!(rows = rows.len(), "read inventory identifiers");
    Ok(rows)
}

fn verify_header(sheet: &impl InventorySheet, column: u32, expected: &str) -> Result<()> {
    let found = sheet.cell_text(column, HEADER_ROW).unwrap_or_default();
    if found != expected {
        bail!(
            "unexpected header in {}: expected {expected:?}, found {found:?}",
            coordinate(column, HEADER_ROW)
        );
    }
    Ok(())
}

pub fn annotate_row(sheet: &mut impl InventorySheet, row: u32, reason: &str) {
    sheet.highlight(ID_COLUMN, row);
    sheet.highlight(NAME_COLUMN, row);
    sheet.attach_note(NAME_COLUMN, row, reason);
}

pub fn coordinate(column: u32, row: u32) -> String {
    let mut letters = Vec::new();
    let mut remaining = column;
    while remaining > 0 {
        let offset = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &row.to_string()
}

pub struct XlsxWorkbook {
    path: PathBuf,
    book: Spreadsheet,
}

impl XlsxWorkbook {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("{} was not found or is a directory", path.display());
        }

        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
            .unwrap_or(false);
        if !is_xlsx {
            bail!("{} is not an .xlsx workbook", path.display());
        }

        let book = umya_spreadsheet::reader::xlsx::read(path)
            .map_err(|err| anyhow!("failed to read workbook {}: {err}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            book,
        })
    }

    pub fn ensure_writable(&self) -> Result<()> {
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("spreadsheet is not writable: {}", self.path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path)
            .map_err(|err| anyhow!("failed to write workbook {}: {err}", self.path.display()))
    }
}

impl InventorySheet for XlsxWorkbook {
    fn cell_text(&self, column: u32, row: u32) -> Option<String> {
        self.book
            .get_active_sheet()
            .get_cell((column, row))
            .map(|cell| cell.get_value().to_string())
    }

    fn highest_row(&self) -> u32 {
        self.book.get_active_sheet().get_highest_row()
    }

    fn highlight(&mut self, column: u32, row: u32) {
        self.book
            .get_active_sheet_mut()
            .get_style_mut((column, row))
            .set_background_color(HIGHLIGHT_ARGB);
    }

    fn attach_note(&mut self, column: u32, row: u32, text: &str) {
        let address = coordinate(column, row);
        let sheet = self.book.get_active_sheet_mut();
        // Re-running over an annotated sheet replaces the note instead of stacking one.
        sheet
            .get_comments_mut()
            .retain(|existing| existing.get_coordinate().get_coordinate() != address);

        let mut comment = Comment::default();
        comment.get_coordinate_mut().set_coordinate(&address);
        comment.set_author(NOTE_AUTHOR);
        comment.get_text_mut().set_text(text);
        sheet.add_comments(comment);
    }

    fn persist(&mut self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::BTreeMap;

    use anyhow::Result;

    use super::InventorySheet;

    #[derive(Debug, Default)]
    pub(crate) struct MemorySheet {
        pub cells: BTreeMap<(u32, u32), String>,
        pub highlighted: Vec<(u32, u32)>,
        pub notes: BTreeMap<(u32, u32), String>,
        pub saves: usize,
    }

    impl MemorySheet {
        pub(crate) fn with_rows(rows: &[(&str, &str)]) -> Self {
            let mut sheet = Self::default();
            for (idx, (id, name)) in rows.iter().enumerate() {
                let row = idx as u32 + 1;
                if !id.is_empty() {
                    sheet.cells.insert((1, row), id.to_string());
                }
                if !name.is_empty() {
                    sheet.cells.insert((2, row), name.to_string());
                }
            }
            sheet
        }
    }

    impl InventorySheet for MemorySheet {
        fn cell_text(&self, column: u32, row: u32) -> Option<String> {
            self.cells.get(&(column, row)).cloned()
        }

        fn highest_row(&self) -> u32 {
            self.cells.keys().map(|(_, row)| *row).max().unwrap_or(0)
        }

        fn highlight(&mut self, column: u32, row: u32) {
            self.highlighted.push((column, row));
        }

        fn attach_note(&mut self, column: u32, row: u32, text: &str) {
            self.notes.insert((column, row), text.to_string());
        }

        fn persist(&mut self) -> Result<()> {
            self.saves += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySheet;
    use super::*;

    #[test]
    fn read_inventory_skips_empty_cells_but_keeps_row_numbers() {
        let sheet = MemorySheet::with_rows(&[
            ("Polarion ID", "Test case name"),
            ("AP-1", "first"),
            ("", "spacer"),
            (" AP-3 ", "third"),
        ]);

        let rows = read_inventory(&sheet).expect("valid inventory");
        assert_eq!(
            rows,
            vec![
                InventoryRow {
                    row: 2,
                    identifier: "AP-1".to_string()
                },
                InventoryRow {
                    row: 4,
                    identifier: "AP-3".to_string()
                },
            ]
        );
    }

    #[test]
    fn read_inventory_rejects_header_mismatch() {
        let sheet = MemorySheet::with_rows(&[("Ticket", "Test case name"), ("AP-1", "x")]);
        let err = read_inventory(&sheet).expect_err("header must be verified");
        assert!(err.to_string().contains("Polarion ID"));

        let sheet = MemorySheet::with_rows(&[("Polarion ID", "Name"), ("AP-1", "x")]);
        assert!(read_inventory(&sheet).is_err());
    }

    #[test]
    fn annotate_row_marks_both_columns_and_notes_the_name_cell() {
        let mut sheet = MemorySheet::with_rows(&[("Polarion ID", "Test case name")]);
        annotate_row(&mut sheet, 5, "Ticket is not a testcase.");
        assert_eq!(sheet.highlighted, vec![(1, 5), (2, 5)]);
        assert_eq!(
            sheet.notes.get(&(2, 5)).map(String::as_str),
            Some("Ticket is not a testcase.")
        );
    }

    #[test]
    fn coordinate_renders_spreadsheet_addresses() {
        assert_eq!(coordinate(1, 1), "A1");
        assert_eq!(coordinate(2, 17), "B17");
        assert_eq!(coordinate(27, 3), "AA3");
    }

    #[test]
    fn annotations_survive_a_save_and_replace_earlier_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inventory.xlsx");

        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_active_sheet_mut();
        sheet.get_cell_mut((1, 1)).set_value(ID_HEADER);
        sheet.get_cell_mut((2, 1)).set_value(NAME_HEADER);
        sheet.get_cell_mut((1, 2)).set_value("AP-1");
        sheet.get_cell_mut((2, 2)).set_value("first");
        umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write fixture");

        let mut workbook = XlsxWorkbook::open(&path).expect("open fixture");
        let rows = read_inventory(&workbook).expect("inventory");
        assert_eq!(rows.len(), 1);
        annotate_row(&mut workbook, 2, "Ticket does not have a testCaseID.");
        annotate_row(&mut workbook, 2, "Ticket is not a testcase.");
        workbook.persist().expect("save annotated workbook");

        let reopened = umya_spreadsheet::reader::xlsx::read(&path).expect("reopen");
        let comments = reopened.get_active_sheet().get_comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].get_coordinate().get_coordinate(), "B2");
        assert_eq!(
            comments[0].get_text().get_text().to_string(),
            "Ticket is not a testcase."
        );
    }

    #[test]
    fn open_rejects_missing_and_non_xlsx_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(XlsxWorkbook::open(&dir.path().join("absent.xlsx")).is_err());

        let csv = dir.path().join("inventory.csv");
        std::fs::write(&csv, "Polarion ID,Test case name\n").expect("write csv");
        assert!(XlsxWorkbook::open(&csv).is_err());
    }
}
