//! Bulk import of event rows from spreadsheet or CSV files.
//!
//! Input files use the Events headers. A file lacking a header or containing
//! any empty cell is skipped as a whole so it can be fixed and imported
//! again. The remaining files are validated row by row.

use calamine::Data;
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::event::{EVENT_HEADERS, EventRecord};
use crate::workbook::{SheetTable, cell_text, read_first_sheet};

lazy_static! {
    static ref DIGITS: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref WHOLE_NUMBER: Regex = Regex::new(r"^([0-9]+)\.0+$").unwrap();
}

const POSTAL_CODE_WIDTH: usize = 5;

/// A row that was not imported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub file: PathBuf,
    /// 1-based line in the input file.
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    pub accepted: Vec<EventRecord>,
    pub rejected: Vec<Rejection>,
    /// Files that were not read at all, with the reason.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Files whose every row was accepted.
    pub completed_files: Vec<PathBuf>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.skipped_files.is_empty()
    }
}

/// Read and validate every file.
///
/// # Arguments
/// * `files` - Input files (`.xlsx`, `.xls`, `.ods` or `.csv`)
///
/// # Returns
/// * `ImportReport` - Accepted events in file order, plus everything that
///   was left out and why
pub fn import_files(files: &[PathBuf]) -> ImportReport {
    let mut report = ImportReport::default();

    for file in files {
        let sheet = match read_input(file) {
            Ok(sheet) => sheet,
            Err(e) => {
                warn!("skipping {}: {}", file.display(), e);
                report.skipped_files.push((file.clone(), e.to_string()));
                continue;
            }
        };

        if let Err(e) = EVENT_HEADERS.iter().try_for_each(|h| sheet.column(h).map(|_| ())) {
            warn!("skipping {}: {}", file.display(), e);
            report.skipped_files.push((file.clone(), e.to_string()));
            continue;
        }

        if let Some(line) = first_incomplete_line(&sheet) {
            let reason = format!("contains rows with empty fields (line {})", line);
            warn!("skipping {}: {}", file.display(), reason);
            report.skipped_files.push((file.clone(), reason));
            continue;
        }

        let before = report.rejected.len();
        for (index, row) in sheet.data_rows() {
            match validate_row(&sheet, row) {
                Ok(event) => report.accepted.push(event),
                Err(reason) => report.rejected.push(Rejection {
                    file: file.clone(),
                    line: sheet.line(index),
                    reason,
                }),
            }
        }
        if report.rejected.len() == before {
            report.completed_files.push(file.clone());
        }
    }

    info!(
        "import: {} accepted, {} rejected, {} files skipped",
        report.accepted.len(),
        report.rejected.len(),
        report.skipped_files.len()
    );
    report
}

/// Delete input files that were imported without any rejection.
pub fn remove_imported(report: &ImportReport) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for file in &report.completed_files {
        if file.exists() {
            fs::remove_file(file)?;
            removed.push(file.clone());
        }
    }
    Ok(removed)
}

fn read_input(path: &Path) -> Result<SheetTable> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => read_csv(path),
        Some("xlsx") | Some("xls") | Some("xlsm") | Some("ods") => read_first_sheet(path),
        _ => Err(Error::UnsupportedFile(path.to_path_buf())),
    }
}

fn read_csv(path: &Path) -> Result<SheetTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Data::Empty
                    } else {
                        Data::String(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(SheetTable::from_rows("csv", rows, 1))
}

/// Line of the first data row with an empty cell under any Events header.
fn first_incomplete_line(sheet: &SheetTable) -> Option<usize> {
    let cols: Vec<usize> = EVENT_HEADERS
        .iter()
        .filter_map(|h| sheet.column(h).ok())
        .collect();
    sheet
        .data_rows()
        .find(|(_, row)| {
            cols.iter()
                .any(|&c| cell_text(sheet.cell(row, c)).trim().is_empty())
        })
        .map(|(index, _)| sheet.line(index))
}

fn validate_row(sheet: &SheetTable, row: &[Data]) -> std::result::Result<EventRecord, String> {
    let text = |header: &str| -> String {
        sheet
            .column(header)
            .map(|c| cell_text(sheet.cell(row, c)))
            .unwrap_or_default()
    };

    let postal_code = normalize_postal_code(sheet, row)?;
    let table_count = parse_count(&text("Tische")).ok_or("Invalid table or participant values.")?;
    let participant_count =
        parse_count(&text("Teilnehmer")).ok_or("Invalid table or participant values.")?;

    Ok(EventRecord {
        date: text("Datum"),
        institution_name: text("Hochschule"),
        address: text("Adresse"),
        city: text("Stadt"),
        state: text("Bundesland"),
        postal_code,
        table_count,
        participant_count,
    })
}

/// Postal codes typed as text keep their digits; numeric cells have lost
/// their leading zeros and are padded back to five digits.
fn normalize_postal_code(sheet: &SheetTable, row: &[Data]) -> std::result::Result<String, String> {
    let col = sheet.column("PLZ").map_err(|e| e.to_string())?;
    let cell = sheet.cell(row, col);
    let padded = |digits: &str| format!("{:0>width$}", digits, width = POSTAL_CODE_WIDTH);
    match cell {
        Data::Int(i) if *i >= 0 => Ok(padded(&i.to_string())),
        Data::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Ok(padded(&format!("{}", *f as u64))),
        _ => {
            let value = cell_text(cell);
            let value = value.trim();
            if DIGITS.is_match(value) {
                Ok(value.to_string())
            } else if let Some(caps) = WHOLE_NUMBER.captures(value) {
                Ok(caps[1].to_string())
            } else {
                Err("Invalid PLZ value.".to_string())
            }
        }
    }
}

fn parse_count(value: &str) -> Option<u32> {
    let value = value.trim();
    if DIGITS.is_match(value) {
        value.parse().ok()
    } else {
        WHOLE_NUMBER
            .captures(value)
            .and_then(|caps| caps[1].parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> SheetTable {
        let rows = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|v| {
                        if v.is_empty() {
                            Data::Empty
                        } else {
                            Data::String(v.to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        SheetTable::from_rows("test", rows, 1)
    }

    const HEADER: &[&str] = &[
        "Datum", "Hochschule", "Adresse", "Stadt", "Bundesland", "PLZ", "Tische", "Teilnehmer",
    ];

    #[test]
    fn counts_accept_whole_floats_only() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" 7.0 "), Some(7));
        assert_eq!(parse_count("7.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("drei"), None);
    }

    #[test]
    fn numeric_postal_codes_are_padded() {
        let s = SheetTable::from_rows(
            "test",
            vec![
                vec![Data::String("PLZ".to_string())],
                vec![Data::Float(1067.0)],
                vec![Data::String("01067".to_string())],
                vec![Data::String("D-1067".to_string())],
            ],
            1,
        );
        assert_eq!(normalize_postal_code(&s, &s.rows[0]), Ok("01067".to_string()));
        assert_eq!(normalize_postal_code(&s, &s.rows[1]), Ok("01067".to_string()));
        assert!(normalize_postal_code(&s, &s.rows[2]).is_err());
    }

    #[test]
    fn row_with_bad_count_is_rejected() {
        let s = sheet(&[HEADER, &["12.05.2025", "Uni A", "Weg 1", "Berlin", "Berlin", "10115", "1", "zwei"]]);
        let err = validate_row(&s, &s.rows[0]).unwrap_err();
        assert_eq!(err, "Invalid table or participant values.");
    }

    #[test]
    fn valid_row_keeps_its_fields() {
        let s = sheet(&[
            HEADER,
            &["03.04.2025", "TU Berlin", "Str. 17", "Berlin", "Berlin", "10623", "3", "40"],
        ]);
        let event = validate_row(&s, &s.rows[0]).unwrap();
        assert_eq!(event.date, "03.04.2025");
        assert_eq!(event.table_count, 3);
        assert_eq!(event.participant_count, 40);
        assert_eq!(event.postal_code, "10623");
    }

    #[test]
    fn empty_date_marks_the_file_incomplete() {
        let s = sheet(&[
            HEADER,
            &["03.04.2025", "TU Berlin", "Str. 17", "Berlin", "Berlin", "10623", "3", "40"],
            &["", "FU Berlin", "Str. 1", "Berlin", "Berlin", "14195", "1", "4"],
        ]);
        assert_eq!(first_incomplete_line(&s), Some(3));
    }
}
