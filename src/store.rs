//! Persistence contract for the event log and the statistics table.

use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::aggregator::recompute;
use crate::error::{Error, Result};
use crate::event::EventRecord;
use crate::geocode::GeoResolver;
use crate::snapshot::SnapshotStore;
use crate::stats::StatTable;
use crate::workbook::XlsxStore;

/// What a store found on disk.
///
/// A table is `None` when its sheet (or section) does not exist, which is
/// different from an existing but empty table.
#[derive(Clone, Debug, Default)]
pub struct StoredTables {
    pub events: Option<Vec<EventRecord>>,
    pub stats: Option<StatTable>,
}

/// Durable home of the event log and the statistics table.
///
/// Both tables are always written together: `save` either replaces both or
/// leaves the previous contents untouched.
pub trait EventStore {
    /// Read both tables. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<StoredTables>>;

    fn save(&self, events: &[EventRecord], stats: &StatTable) -> Result<()>;

    /// Where the data lives, for messages.
    fn location(&self) -> &Path;

    /// The event log, or an empty log if nothing is stored yet.
    fn load_events(&self) -> Result<Vec<EventRecord>> {
        Ok(self
            .load()?
            .and_then(|tables| tables.events)
            .unwrap_or_default())
    }
}

/// How [`load_or_init`] had to repair the stored data, if at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadNotice {
    /// No file existed; an empty one was written.
    Created,
    /// The Events table was missing; both tables were reset to empty.
    EventsMissing,
    /// The Stats table was missing; it was rebuilt from the events.
    StatsRebuilt,
}

#[derive(Clone, Debug, Default)]
pub struct Loaded {
    pub events: Vec<EventRecord>,
    pub stats: StatTable,
    pub notice: Option<LoadNotice>,
    /// Only meaningful when `notice` is `Created` or `StatsRebuilt`.
    pub saved: bool,
}

/// Load both tables, creating or repairing them as needed.
///
/// * missing file - empty tables are written immediately
/// * missing Events - both tables start empty (nothing is written)
/// * missing Stats - a full recompute without seed coordinates is run and saved
pub fn load_or_init<S, R>(store: &S, resolver: &mut R) -> Result<Loaded>
where
    S: EventStore + ?Sized,
    R: GeoResolver + ?Sized,
{
    match store.load()? {
        None => {
            let saved = save_logged(store, &[], &StatTable::new());
            warn!(
                "{} not found, created new file",
                store.location().display()
            );
            Ok(Loaded {
                notice: Some(LoadNotice::Created),
                saved,
                ..Loaded::default()
            })
        }
        Some(StoredTables { events: None, .. }) => {
            warn!("Events sheet not found, Stats reset");
            Ok(Loaded {
                notice: Some(LoadNotice::EventsMissing),
                ..Loaded::default()
            })
        }
        Some(StoredTables {
            events: Some(events),
            stats: None,
        }) => {
            warn!("Stats sheet not found, creating new from values in Events sheet");
            let stats = recompute(&events, None, resolver).table;
            let saved = save_logged(store, &events, &stats);
            Ok(Loaded {
                events,
                stats,
                notice: Some(LoadNotice::StatsRebuilt),
                saved,
            })
        }
        Some(StoredTables {
            events: Some(events),
            stats: Some(stats),
        }) => Ok(Loaded {
            events,
            stats,
            notice: None,
            saved: true,
        }),
    }
}

fn save_logged<S: EventStore + ?Sized>(store: &S, events: &[EventRecord], stats: &StatTable) -> bool {
    match store.save(events, stats) {
        Ok(()) => true,
        Err(e) => {
            log::error!("could not write {}: {}", store.location().display(), e);
            false
        }
    }
}

/// Open the store matching the file extension.
///
/// `.xlsx` selects the workbook store, `.gz`/`.bin` the compressed snapshot.
pub fn open_store(path: impl AsRef<Path>) -> Result<Box<dyn EventStore>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") => Ok(Box::new(XlsxStore::new(path))),
        Some("gz") | Some("bin") => Ok(Box::new(SnapshotStore::new(path))),
        _ => Err(Error::UnsupportedFile(path.to_path_buf())),
    }
}

/// Replace `path` with `bytes` in one step.
///
/// The data goes to a temporary file in the same directory which is then
/// renamed over the target, so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    info!("wrote {}", path.display());
    Ok(())
}
