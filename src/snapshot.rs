use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::event::EventRecord;
use crate::stats::StatTable;
use crate::store::{EventStore, StoredTables, write_atomic};

#[derive(Serialize, Deserialize)]
struct Snapshot {
    events: Vec<EventRecord>,
    stats: StatTable,
}

/// [`EventStore`] writing both tables as one gzip-compressed bincode blob.
///
/// A snapshot always contains both tables, so loading never reports a
/// missing Events or Stats section.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }
}

impl EventStore for SnapshotStore {
    fn load(&self) -> Result<Option<StoredTables>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(GzDecoder::new(file));
        let snapshot: Snapshot = deserialize_from(&mut reader)?;
        Ok(Some(StoredTables {
            events: Some(snapshot.events),
            stats: Some(snapshot.stats),
        }))
    }

    fn save(&self, events: &[EventRecord], stats: &StatTable) -> Result<()> {
        let snapshot = Snapshot {
            events: events.to_vec(),
            stats: stats.clone(),
        };
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        serialize_into(&mut encoder, &snapshot)?;
        encoder.flush()?;
        let bytes = encoder.finish()?;
        write_atomic(&self.path, &bytes)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
