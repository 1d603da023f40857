//! Excel workbook persistence.
//!
//! The workbook holds two sheets, `Events` and `Stats`, with the headers in
//! [`EVENT_HEADERS`] and [`STAT_HEADERS`]. Reading goes through calamine,
//! writing through rust_xlsxwriter. Columns are located by header name, so
//! workbooks edited by hand may reorder them.

use calamine::{Data, DataType, Reader, Sheets, open_workbook_auto};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::event::{EVENT_HEADERS, EventRecord};
use crate::stats::{STAT_HEADERS, StatRecord, StatTable};
use crate::store::{EventStore, StoredTables, write_atomic};

pub const EVENTS_SHEET: &str = "Events";
pub const STATS_SHEET: &str = "Stats";

static EMPTY: Data = Data::Empty;

/// [`EventStore`] backed by an `.xlsx` workbook.
#[derive(Clone, Debug)]
pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XlsxStore { path: path.into() }
    }
}

impl EventStore for XlsxStore {
    fn load(&self) -> Result<Option<StoredTables>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut workbook = open_workbook_auto(&self.path)?;

        let events = match read_sheet(&mut workbook, EVENTS_SHEET)? {
            Some(sheet) => Some(parse_events(&sheet)?),
            None => None,
        };
        let stats = match read_sheet(&mut workbook, STATS_SHEET)? {
            Some(sheet) => Some(parse_stats(&sheet)?),
            None => None,
        };
        Ok(Some(StoredTables { events, stats }))
    }

    fn save(&self, events: &[EventRecord], stats: &StatTable) -> Result<()> {
        let bytes = workbook_bytes(events, stats)?;
        write_atomic(&self.path, &bytes)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Render both tables into an in-memory `.xlsx` file.
pub fn workbook_bytes(events: &[EventRecord], stats: &StatTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let mut events_sheet = Worksheet::new();
    events_sheet.set_name(EVENTS_SHEET)?;
    write_headers(&mut events_sheet, &EVENT_HEADERS)?;
    for (i, event) in events.iter().enumerate() {
        let row = (i + 1) as u32;
        events_sheet.write_string(row, 0, &event.date)?;
        events_sheet.write_string(row, 1, &event.institution_name)?;
        events_sheet.write_string(row, 2, &event.address)?;
        events_sheet.write_string(row, 3, &event.city)?;
        events_sheet.write_string(row, 4, &event.state)?;
        events_sheet.write_string(row, 5, &event.postal_code)?;
        events_sheet.write_number(row, 6, f64::from(event.table_count))?;
        events_sheet.write_number(row, 7, f64::from(event.participant_count))?;
    }
    workbook.push_worksheet(events_sheet);

    let mut stats_sheet = Worksheet::new();
    stats_sheet.set_name(STATS_SHEET)?;
    write_headers(&mut stats_sheet, &STAT_HEADERS)?;
    for (i, record) in stats.iter().enumerate() {
        let row = (i + 1) as u32;
        stats_sheet.write_string(row, 0, &record.institution_name)?;
        stats_sheet.write_string(row, 1, &record.city)?;
        stats_sheet.write_string(row, 2, &record.postal_code)?;
        if let Some(latitude) = record.latitude {
            stats_sheet.write_number(row, 3, latitude)?;
        }
        if let Some(longitude) = record.longitude {
            stats_sheet.write_number(row, 4, longitude)?;
        }
        stats_sheet.write_number(row, 5, record.event_count as f64)?;
        stats_sheet.write_number(row, 6, record.city_event_total as f64)?;
        stats_sheet.write_number(row, 7, record.total_tables as f64)?;
        stats_sheet.write_number(row, 8, record.total_participants as f64)?;
        stats_sheet.write_number(row, 9, record.city_participants_total as f64)?;
    }
    workbook.push_worksheet(stats_sheet);

    Ok(workbook.save_to_buffer()?)
}

pub(crate) fn write_headers(sheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    Ok(())
}

/// A sheet read into memory, first row taken as headers.
pub(crate) struct SheetTable {
    pub name: String,
    columns: HashMap<String, usize>,
    pub rows: Vec<Vec<Data>>,
    /// 1-based spreadsheet line of the first data row.
    first_line: usize,
}

impl SheetTable {
    pub fn from_rows(name: &str, mut rows: Vec<Vec<Data>>, header_line: usize) -> Self {
        let header = if rows.is_empty() {
            Vec::new()
        } else {
            rows.remove(0)
        };
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell_text(cell).trim().to_string(), i))
            .collect();
        SheetTable {
            name: name.to_string(),
            columns,
            rows,
            first_line: header_line + 1,
        }
    }

    pub fn column(&self, column: &str) -> Result<usize> {
        self.columns
            .get(column)
            .copied()
            .ok_or_else(|| Error::MissingColumn {
                sheet: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn cell<'a>(&self, row: &'a [Data], col: usize) -> &'a Data {
        row.get(col).unwrap_or(&EMPTY)
    }

    pub fn line(&self, index: usize) -> usize {
        self.first_line + index
    }

    pub fn invalid(&self, index: usize, message: impl Into<String>) -> Error {
        Error::InvalidRow {
            sheet: self.name.clone(),
            line: self.line(index),
            message: message.into(),
        }
    }

    /// Rows that contain at least one non-empty cell.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Vec<Data>)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !matches!(cell, Data::Empty)))
    }
}

/// Read one sheet, or `None` if the workbook has no sheet of that name.
pub(crate) fn read_sheet<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    name: &str,
) -> Result<Option<SheetTable>> {
    if !workbook.sheet_names().iter().any(|n| n == name) {
        return Ok(None);
    }
    let range = workbook.worksheet_range(name)?;
    Ok(Some(range_table(name, &range)))
}

/// Read the first sheet of a workbook.
pub(crate) fn read_first_sheet(path: &Path) -> Result<SheetTable> {
    let mut workbook = open_workbook_auto(path)?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Validation(format!("{} has no sheets", path.display())))?;
    let range = workbook.worksheet_range(&name)?;
    Ok(range_table(&name, &range))
}

fn range_table(name: &str, range: &calamine::Range<Data>) -> SheetTable {
    let header_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let rows = range.rows().map(|row| row.to_vec()).collect();
    SheetTable::from_rows(name, rows, header_line)
}

/// Text of a cell as a user would read it.
///
/// Whole numbers lose their `.0` so a postal code typed as a number comes
/// back as `"76139"`; strings are returned untouched.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_date()
            .map(|d| d.format("%d.%m.%Y").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::Error(e) => e.to_string(),
    }
}

pub(crate) fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// A non-negative whole number, accepting `5`, `5.0` and `"5"`.
pub(crate) fn cell_count(cell: &Data) -> Option<u64> {
    match cell {
        Data::Int(i) => u64::try_from(*i).ok(),
        Data::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        Data::Float(f) => whole(*f),
        _ => None,
    }
}

fn whole(f: f64) -> Option<u64> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

fn parse_events(sheet: &SheetTable) -> Result<Vec<EventRecord>> {
    let cols: Vec<usize> = EVENT_HEADERS
        .iter()
        .map(|h| sheet.column(h))
        .collect::<Result<_>>()?;

    let mut events = Vec::with_capacity(sheet.rows.len());
    for (index, row) in sheet.data_rows() {
        let text = |i: usize| cell_text(sheet.cell(row, cols[i]));
        let count = |i: usize| -> Result<u32> {
            cell_count(sheet.cell(row, cols[i]))
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    sheet.invalid(
                        index,
                        format!("{} is not a non-negative integer: {:?}", EVENT_HEADERS[i], text(i)),
                    )
                })
        };
        events.push(EventRecord {
            date: text(0),
            institution_name: text(1),
            address: text(2),
            city: text(3),
            state: text(4),
            postal_code: text(5),
            table_count: count(6)?,
            participant_count: count(7)?,
        });
    }
    Ok(events)
}

fn parse_stats(sheet: &SheetTable) -> Result<StatTable> {
    let cols: Vec<usize> = STAT_HEADERS
        .iter()
        .map(|h| sheet.column(h))
        .collect::<Result<_>>()?;

    let mut records = Vec::with_capacity(sheet.rows.len());
    for (index, row) in sheet.data_rows() {
        let cell = |i: usize| sheet.cell(row, cols[i]);
        let count = |i: usize| -> Result<u64> {
            cell_count(cell(i)).ok_or_else(|| {
                sheet.invalid(
                    index,
                    format!("{} is not a non-negative integer", STAT_HEADERS[i]),
                )
            })
        };
        records.push(StatRecord {
            institution_name: cell_text(cell(0)),
            city: cell_text(cell(1)),
            postal_code: cell_text(cell(2)),
            latitude: cell_number(cell(3)),
            longitude: cell_number(cell(4)),
            event_count: count(5)?,
            city_event_total: count(6)?,
            total_tables: count(7)?,
            total_participants: count(8)?,
            city_participants_total: count(9)?,
        });
    }
    Ok(StatTable::from(records))
}
