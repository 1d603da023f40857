//! Statistics recalculation.
//!
//! [`recompute`] folds the complete event log into a fresh [`StatTable`].
//! Every pass starts from an empty table; nothing from a previous table is
//! carried over except coordinates handed in through a [`CoordinateCache`].

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;

use crate::event::EventRecord;
use crate::geocode::{Coordinate, GeoQuery, GeoResolver, Resolution, UnresolvedReason};
use crate::stats::{StatRecord, StatTable};
use crate::store::EventStore;

/// Known coordinates per (institution, city), consulted before geocoding.
#[derive(Clone, Debug, Default)]
pub struct CoordinateCache {
    entries: HashMap<(String, String), Coordinate>,
}

impl CoordinateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every located record of a previously computed table.
    pub fn from_table(table: &StatTable) -> Self {
        let mut cache = CoordinateCache::new();
        for record in table {
            if let Some(coordinate) = record.coordinate() {
                cache.insert(&record.institution_name, &record.city, coordinate);
            }
        }
        cache
    }

    pub fn insert(&mut self, institution_name: &str, city: &str, coordinate: Coordinate) {
        self.entries
            .insert((institution_name.to_string(), city.to_string()), coordinate);
    }

    pub fn get(&self, institution_name: &str, city: &str) -> Option<Coordinate> {
        self.entries
            .get(&(institution_name.to_string(), city.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raised when a new group could not be located from its full address.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolutionWarning {
    pub institution_name: String,
    pub city: String,
    pub query: String,
    pub reason: UnresolvedReason,
    /// `true` when the city-level fallback supplied coordinates.
    pub used_city_fallback: bool,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.used_city_fallback {
            write!(
                f,
                "No coordinates were found for {} at {} ({}); using coordinates for {} instead.",
                self.institution_name, self.query, self.reason, self.city
            )
        } else {
            write!(
                f,
                "No coordinates were found for {} at {} or for the city {} ({}); marker left unplaced.",
                self.institution_name, self.query, self.city, self.reason
            )
        }
    }
}

/// Result of an in-memory recalculation pass.
#[derive(Clone, Debug, Default)]
pub struct Recalculation {
    pub table: StatTable,
    pub warnings: Vec<ResolutionWarning>,
}

/// Result of a recalculation that was also written to the store.
///
/// When `saved` is false the table is still the freshly computed one and can
/// be displayed, but the store holds whatever it held before.
#[derive(Clone, Debug, Default)]
pub struct RecomputeOutcome {
    pub table: StatTable,
    pub warnings: Vec<ResolutionWarning>,
    pub saved: bool,
}

/// Rebuild the statistics table from the full event log.
///
/// # Arguments
/// * `events` - The complete event log in insertion order
/// * `seed` - Coordinates to use for the first new group instead of a lookup
/// * `resolver` - Geocoder for groups that need coordinates
///
/// # Returns
/// * `Recalculation` - The new table plus one warning per group that failed
///   to resolve from its full address
pub fn recompute<R: GeoResolver + ?Sized>(
    events: &[EventRecord],
    seed: Option<Coordinate>,
    resolver: &mut R,
) -> Recalculation {
    recompute_cached(events, seed, &CoordinateCache::new(), resolver)
}

/// Like [`recompute`], but new groups found in `cache` skip geocoding.
///
/// The seed, when given, still belongs to the first new group.
pub fn recompute_cached<R: GeoResolver + ?Sized>(
    events: &[EventRecord],
    seed: Option<Coordinate>,
    cache: &CoordinateCache,
    resolver: &mut R,
) -> Recalculation {
    let mut builder = TableBuilder::default();
    let mut warnings = Vec::new();
    let mut seed = seed;

    if !cache.is_empty() {
        debug!("{} cached coordinates available", cache.len());
    }

    for event in events {
        let (institution_name, city) = event.group_key();
        let slot = match builder.position(institution_name, city) {
            Some(slot) => {
                let record = &mut builder.records[slot];
                record.event_count += 1;
                record.total_tables += u64::from(event.table_count);
                record.total_participants += u64::from(event.participant_count);
                slot
            }
            None => {
                let coordinate = match seed.take() {
                    Some(coordinate) => Some(coordinate),
                    None => match cache.get(institution_name, city) {
                        Some(coordinate) => Some(coordinate),
                        None => locate(event, &mut *resolver, &mut warnings),
                    },
                };
                builder.push(StatRecord {
                    institution_name: institution_name.to_string(),
                    city: city.to_string(),
                    postal_code: event.postal_code.clone(),
                    latitude: coordinate.map(|c| c.latitude),
                    longitude: coordinate.map(|c| c.longitude),
                    event_count: 1,
                    city_event_total: 0,
                    total_tables: u64::from(event.table_count),
                    total_participants: u64::from(event.participant_count),
                    city_participants_total: 0,
                })
            }
        };

        builder.roll_up_city(slot);
    }

    let table = builder.finish();
    info!(
        "recalculated statistics: {} events, {} groups, {} unresolved",
        events.len(),
        table.len(),
        table.unlocated().count()
    );
    Recalculation { table, warnings }
}

/// Recalculate and persist both tables.
///
/// The event log is written back unchanged. A failing write is logged and
/// reported through `saved`, never as an error.
pub fn recompute_and_save<S, R>(
    store: &S,
    events: &[EventRecord],
    seed: Option<Coordinate>,
    cache: &CoordinateCache,
    resolver: &mut R,
) -> RecomputeOutcome
where
    S: EventStore + ?Sized,
    R: GeoResolver + ?Sized,
{
    let Recalculation { table, warnings } = recompute_cached(events, seed, cache, resolver);
    let saved = match store.save(events, &table) {
        Ok(()) => true,
        Err(e) => {
            log::error!("statistics not saved: {}", e);
            false
        }
    };
    RecomputeOutcome {
        table,
        warnings,
        saved,
    }
}

/// Geocode a new group, falling back to the city when the address fails.
fn locate<R: GeoResolver + ?Sized>(
    event: &EventRecord,
    resolver: &mut R,
    warnings: &mut Vec<ResolutionWarning>,
) -> Option<Coordinate> {
    let query = GeoQuery::for_address(
        &event.address,
        &event.city,
        &event.state,
        &event.postal_code,
    );
    let reason = match resolver.resolve(&query) {
        Resolution::Resolved(coordinate) => return Some(coordinate),
        Resolution::Unresolved(reason) => reason,
    };

    let fallback = resolver
        .resolve(&GeoQuery::for_city(&event.city, &event.state))
        .coordinate();
    let warning = ResolutionWarning {
        institution_name: event.institution_name.clone(),
        city: event.city.clone(),
        query: query.to_string(),
        reason,
        used_city_fallback: fallback.is_some(),
    };
    warn!("{}", warning);
    warnings.push(warning);
    fallback
}

/// Working state of one pass. Records are only reachable through the
/// finished [`StatTable`].
#[derive(Default)]
struct TableBuilder {
    records: Vec<StatRecord>,
    groups: HashMap<(String, String), usize>,
    cities: HashMap<String, Vec<usize>>,
}

impl TableBuilder {
    fn position(&self, institution_name: &str, city: &str) -> Option<usize> {
        self.groups
            .get(&(institution_name.to_string(), city.to_string()))
            .copied()
    }

    fn push(&mut self, record: StatRecord) -> usize {
        let slot = self.records.len();
        self.groups
            .insert((record.institution_name.clone(), record.city.clone()), slot);
        self.cities.entry(record.city.clone()).or_default().push(slot);
        self.records.push(record);
        slot
    }

    /// Refresh the city totals of every record sharing `slot`'s city.
    fn roll_up_city(&mut self, slot: usize) {
        let Some(members) = self.cities.get(&self.records[slot].city) else {
            return;
        };
        let (events, participants) = members.iter().fold((0u64, 0u64), |(e, p), &i| {
            let record = &self.records[i];
            (e + record.event_count, p + record.total_participants)
        });
        for &i in members {
            let record = &mut self.records[i];
            record.city_event_total = events;
            record.city_participants_total = participants;
        }
    }

    fn finish(self) -> StatTable {
        StatTable::from(self.records)
    }
}
