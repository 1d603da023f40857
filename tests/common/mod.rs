#![allow(dead_code)]

use lecture_map::{Coordinate, EventRecord, GeoQuery, GeoResolver, Resolution, UnresolvedReason};
use std::collections::HashMap;

/// Deterministic resolver keyed by the rendered query string.
#[derive(Default)]
pub struct StubResolver {
    known: HashMap<String, Coordinate>,
    pub calls: Vec<String>,
    pub unavailable: bool,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, latitude: f64, longitude: f64) -> Self {
        self.known.insert(
            query.to_string(),
            Coordinate {
                latitude,
                longitude,
            },
        );
        self
    }
}

impl GeoResolver for StubResolver {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        let text = query.to_string();
        self.calls.push(text.clone());
        if self.unavailable {
            return Resolution::Unresolved(UnresolvedReason::Unavailable("down".to_string()));
        }
        match self.known.get(&text) {
            Some(c) => Resolution::Resolved(*c),
            None => Resolution::Unresolved(UnresolvedReason::NoMatch),
        }
    }
}

pub fn event(name: &str, city: &str, tables: u32, participants: u32) -> EventRecord {
    EventRecord {
        date: "12.05.2025".to_string(),
        institution_name: name.to_string(),
        address: format!("{} Campus 1", name),
        city: city.to_string(),
        state: "Berlin".to_string(),
        postal_code: "10115".to_string(),
        table_count: tables,
        participant_count: participants,
    }
}

/// Full query string produced for an event built by [`event`].
pub fn address_query(name: &str, city: &str) -> String {
    format!("{} Campus 1, {}, Berlin, 10115", name, city)
}

pub fn city_query(city: &str) -> String {
    format!("{}, Berlin", city)
}

pub fn coordinate(latitude: f64, longitude: f64) -> Coordinate {
    Coordinate {
        latitude,
        longitude,
    }
}
