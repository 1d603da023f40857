use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::geocode::Coordinate;

/// Column headers of the Stats sheet, in on-disk order.
pub const STAT_HEADERS: [&str; 10] = [
    "Hochschule",
    "Stadt",
    "PLZ",
    "Latitude",
    "Longitude",
    "EventCount",
    "CityEventTotal",
    "TotalTables",
    "TotalParticipants",
    "CityParticipantsTotal",
];

/// Aggregated statistics for one (institution, city) pair.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StatRecord {
    pub institution_name: String,
    pub city: String,
    /// Postal code of the first event seen for the pair.
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub event_count: u64,
    pub city_event_total: u64,
    pub total_tables: u64,
    pub total_participants: u64,
    pub city_participants_total: u64,
}

impl StatRecord {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// The derived statistics table.
///
/// Records keep the order in which their group was first seen in the event
/// log. The table is immutable once built; the aggregator is the only producer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<StatRecord>", into = "Vec<StatRecord>")]
pub struct StatTable {
    records: Vec<StatRecord>,
    #[serde(skip)]
    index: HashMap<(String, String), usize>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatRecord> {
        self.records.iter()
    }

    pub fn get(&self, institution_name: &str, city: &str) -> Option<&StatRecord> {
        self.index
            .get(&(institution_name.to_string(), city.to_string()))
            .map(|&i| &self.records[i])
    }

    /// All records whose city matches exactly.
    pub fn in_city<'a>(&'a self, city: &'a str) -> impl Iterator<Item = &'a StatRecord> + 'a {
        self.records.iter().filter(move |r| r.city == city)
    }

    /// Records with no stored coordinates.
    pub fn unlocated(&self) -> impl Iterator<Item = &StatRecord> {
        self.records.iter().filter(|r| r.coordinate().is_none())
    }
}

impl From<Vec<StatRecord>> for StatTable {
    fn from(records: Vec<StatRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index
                .entry((record.institution_name.clone(), record.city.clone()))
                .or_insert(i);
        }
        StatTable { records, index }
    }
}

impl From<StatTable> for Vec<StatRecord> {
    fn from(table: StatTable) -> Self {
        table.records
    }
}

impl<'a> IntoIterator for &'a StatTable {
    type Item = &'a StatRecord;
    type IntoIter = std::slice::Iter<'a, StatRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
