#![cfg(feature = "nominatim")]
//! Client for a Nominatim search endpoint.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::GeocoderConfig;
use crate::error::Result;
use crate::geocode::{Coordinate, GeoQuery, GeoResolver, Resolution, UnresolvedReason};
use crate::place::{BoundingBox, Place};

/// Raw search hit. Nominatim sends numbers as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    boundingbox: Vec<String>,
    #[serde(default)]
    address: HashMap<String, String>,
}

impl SearchHit {
    fn into_place(self) -> Option<Place> {
        let latitude = self.lat.parse().ok()?;
        let longitude = self.lon.parse().ok()?;
        // [south, north, west, east]
        let bounds: Vec<f64> = self
            .boundingbox
            .iter()
            .filter_map(|v| v.parse().ok())
            .collect();
        let bounding_box = match bounds.as_slice() {
            [south, north, west, east] => Some(BoundingBox {
                south: *south,
                north: *north,
                west: *west,
                east: *east,
            }),
            _ => None,
        };
        Some(Place {
            name: self.name,
            display_name: self.display_name,
            latitude,
            longitude,
            bounding_box,
            address: self.address,
        })
    }
}

pub struct Nominatim {
    client: Client,
    config: GeocoderConfig,
}

impl Nominatim {
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Nominatim { client, config })
    }

    fn search(&self, text: &str, restrict_country: bool) -> Result<Vec<SearchHit>> {
        let mut params = vec![
            ("q", text.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("limit", "1".to_string()),
        ];
        if restrict_country && !self.config.country_code.is_empty() {
            params.push(("countrycodes", self.config.country_code.clone()));
        }
        log::debug!("nominatim search {:?}", text);
        let hits = self
            .client
            .get(&self.config.endpoint)
            .query(&params)
            .send()?
            .error_for_status()?
            .json::<Vec<SearchHit>>()?;
        Ok(hits)
    }

    /// Look up a place by free text, e.g. an institution name or
    /// `"Regensburg, Bayern"`. `Ok(None)` when nothing matched.
    pub fn lookup_place(&self, text: &str) -> Result<Option<Place>> {
        Ok(self
            .search(text, true)?
            .into_iter()
            .find_map(SearchHit::into_place))
    }
}

impl GeoResolver for Nominatim {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        let text = query.to_query_string(&self.config.country);
        match self.search(&text, false) {
            Ok(hits) => match hits.into_iter().find_map(SearchHit::into_place) {
                Some(place) => Resolution::Resolved(Coordinate {
                    latitude: place.latitude,
                    longitude: place.longitude,
                }),
                None => Resolution::Unresolved(UnresolvedReason::NoMatch),
            },
            Err(e) => Resolution::Unresolved(UnresolvedReason::Unavailable(e.to_string())),
        }
    }
}
