use chrono::{DateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::stats::StatTable;
use crate::store::EventStore;

/// Copy the store's file into `archive_dir` under a timestamped name.
///
/// The copy is named `<%Y-%m-%d_H%HM%MS%S>_Archived_<file name>`, e.g.
/// `2024-05-01_H14M03S59_Archived_ClimatePlotter.xlsx`.
///
/// # Errors
/// * `Error::Validation` if there is nothing to archive yet
/// * `Error::Io` if the directory cannot be created or the copy fails
pub fn archive_workbook<Tz>(source: &Path, archive_dir: &Path, now: DateTime<Tz>) -> Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if !source.exists() {
        return Err(Error::Validation(format!(
            "{} does not exist, nothing to archive",
            source.display()
        )));
    }
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("ClimatePlotter.xlsx");
    fs::create_dir_all(archive_dir)?;
    let target = archive_dir.join(format!(
        "{}_Archived_{}",
        now.format("%Y-%m-%d_H%HM%MS%S"),
        file_name
    ));
    fs::copy(source, &target)?;
    log::info!("archived {} to {}", source.display(), target.display());
    Ok(target)
}

/// Archive the current data, then start over with empty tables.
pub fn archive_and_clear<S, Tz>(store: &S, archive_dir: &Path, now: DateTime<Tz>) -> Result<PathBuf>
where
    S: EventStore + ?Sized,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let target = archive_workbook(store.location(), archive_dir, now)?;
    store.save(&[], &StatTable::new())?;
    Ok(target)
}
