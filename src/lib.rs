/*!
# Lecture Map

Record lecture and outreach events in a workbook, aggregate them per
institution and per city, and prepare the results as map markers.

## Overview

Every event (date, institution, address, city, state, postal code, number of
tables and participants) is appended to the `Events` sheet of a workbook. The
`Stats` sheet is derived from it: one row per distinct institution/city pair,
with event and participant totals for the pair and for its whole city, plus
coordinates looked up once per pair.

## Architecture

### Aggregation
- **Aggregator** - rebuilds the statistics table from the full event log on
  every pass, in insertion order
- **Coordinate cache** - reuses coordinates from the previous table so that
  adding one event does not geocode the whole log again

### Geocoding
- **GeoResolver** - one-method trait the aggregator depends on
- **Nominatim** - HTTP client for an OpenStreetMap search endpoint
- **RateLimited / Retry** - pacing and bounded retries around any resolver

### Persistence
- **XlsxStore** - `Events` and `Stats` sheets in one `.xlsx` workbook
- **SnapshotStore** - gzip + bincode snapshot of both tables
- Both replace the file atomically so the two tables never disagree on disk

### Data entry and output
- Manual entry validation, address suggestions, bulk import from xlsx/csv
- Map views (named viewports) and marker preparation
- CSV/JSON export, timestamped archives

## Modules

- **event**: event records and manual entry validation
- **stats**: statistics records and the derived table
- **aggregator**: statistics recalculation
- **geocode**: resolver trait, rate limiting, retries
- **nominatim**: Nominatim client (feature `nominatim`)
- **place**: search hits and address suggestions
- **store**: persistence contract, load-or-initialize
- **workbook**: xlsx store
- **snapshot**: compressed binary store
- **import**: bulk import
- **views**: map viewports
- **markers**: marker preparation
- **archive**: timestamped copies
- **export**: CSV, JSON and text output
- **config**: settings
*/

pub mod aggregator;
pub mod archive;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod geocode;
pub mod import;
pub mod markers;
#[cfg(feature = "nominatim")]
pub mod nominatim;
pub mod place;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod views;
pub mod workbook;

pub use aggregator::*;
pub use error::{Error, Result};
pub use event::*;
pub use geocode::*;
pub use stats::*;
pub use store::*;
