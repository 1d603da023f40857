//! Marker preparation for a map renderer.
//!
//! Country and state views show every located record, bucketed by the city
//! participant total. City views show the institutions of that one city.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::stats::StatTable;
use crate::views::View;

const REGIONAL_MAX_SIZE: f64 = 100.0;
const CITY_MAX_SIZE: f64 = 200.0;
const SIZE_PER_PARTICIPANT: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Marker area in points squared.
    pub size: f64,
    /// Position on the color ramp, 0.0 to 1.0.
    pub intensity: f64,
}

pub fn markers_for_view(view: &View, stats: &StatTable) -> Vec<Marker> {
    if view.is_regional() {
        regional_markers(stats)
    } else {
        city_markers(&view.name, stats)
    }
}

fn regional_markers(stats: &StatTable) -> Vec<Marker> {
    let mut groups: BTreeMap<u64, Vec<(&str, f64, f64)>> = BTreeMap::new();
    for record in stats {
        if let Some(c) = record.coordinate() {
            groups
                .entry(record.city_participants_total)
                .or_default()
                .push((record.city.as_str(), c.latitude, c.longitude));
        }
    }

    // smallest total gets the top of the ramp
    let steps = groups.len().saturating_sub(1).max(1) as f64;
    let mut markers = Vec::new();
    for (rank, (total, members)) in groups.into_iter().enumerate() {
        let size = (total as f64 * SIZE_PER_PARTICIPANT).min(REGIONAL_MAX_SIZE);
        let intensity = 1.0 - rank as f64 / steps;
        for (city, latitude, longitude) in members {
            markers.push(Marker {
                label: format!("{} ({})", city, total),
                latitude,
                longitude,
                size,
                intensity,
            });
        }
    }
    markers
}

fn city_markers(city: &str, stats: &StatTable) -> Vec<Marker> {
    let max = stats
        .in_city(city)
        .map(|r| r.total_participants)
        .max()
        .unwrap_or(0);

    stats
        .in_city(city)
        .filter_map(|record| {
            let c = record.coordinate()?;
            let participants = record.total_participants as f64;
            Some(Marker {
                label: record.institution_name.clone(),
                latitude: c.latitude,
                longitude: c.longitude,
                size: (participants * SIZE_PER_PARTICIPANT).min(CITY_MAX_SIZE),
                intensity: if max > 0 {
                    participants / max as f64
                } else {
                    0.0
                },
            })
        })
        .collect()
}
