use crate::error::Result;
use crate::stats::{STAT_HEADERS, StatTable};

/// Convert the statistics table to CSV.
///
/// The header row uses the Stats sheet headers. Missing coordinates are
/// written as empty fields.
///
/// # Arguments
/// * `stats` - The table to export
///
/// # Returns
/// * `Result<String>` - CSV content or an error
pub fn stats_to_csv(stats: &StatTable) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(STAT_HEADERS)?;
    for record in stats {
        let optional = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([
            record.institution_name.clone(),
            record.city.clone(),
            record.postal_code.clone(),
            optional(record.latitude),
            optional(record.longitude),
            record.event_count.to_string(),
            record.city_event_total.to_string(),
            record.total_tables.to_string(),
            record.total_participants.to_string(),
            record.city_participants_total.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert the statistics table to a JSON array of records.
pub fn stats_to_json(stats: &StatTable) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

/// Render the table as aligned text columns for a terminal.
pub fn stats_to_text(stats: &StatTable) -> String {
    let coordinate = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string());
    let rows: Vec<[String; 10]> = stats
        .iter()
        .map(|r| {
            [
                r.institution_name.clone(),
                r.city.clone(),
                r.postal_code.clone(),
                coordinate(r.latitude),
                coordinate(r.longitude),
                r.event_count.to_string(),
                r.city_event_total.to_string(),
                r.total_tables.to_string(),
                r.total_participants.to_string(),
                r.city_participants_total.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = STAT_HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = pad_line(&STAT_HEADERS, &widths);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&pad_line(&cells, &widths));
    }
    out
}

fn pad_line(cells: &[&str], widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    let mut line = line.join("  ").trim_end().to_string();
    line.push('\n');
    line
}
