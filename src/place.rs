//! Places returned by an address search, and the address form data derived
//! from them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The sixteen German states, as used in the state column and the default views.
pub const STATES: [&str; 16] = [
    "Baden-Württemberg",
    "Bayern",
    "Berlin",
    "Brandenburg",
    "Bremen",
    "Hamburg",
    "Hessen",
    "Mecklenburg-Vorpommern",
    "Niedersachsen",
    "Nordrhein-Westfalen",
    "Rheinland-Pfalz",
    "Saarland",
    "Sachsen",
    "Sachsen-Anhalt",
    "Schleswig-Holstein",
    "Thüringen",
];

/// Cities that are states of their own.
const CITY_STATES: [&str; 3] = ["Berlin", "Hamburg", "Bremen"];

pub fn is_state(name: &str) -> bool {
    STATES.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// One search hit.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    pub name: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bounding_box: Option<BoundingBox>,
    /// Structured address parts (`road`, `city`, `postcode`, ...).
    pub address: HashMap<String, String>,
}

impl Place {
    /// First address part present among `keys`.
    ///
    /// The service is inconsistent about naming, e.g. a municipality may be
    /// filed under `city`, `town` or `village`.
    pub fn address_part(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.address.get(*key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("City/Town/Village not found in the address. Returned address was: {0}")]
    CityMissing(String),
    #[error("State/Region not found in the address. Returned address was: {0}")]
    StateMissing(String),
    #[error("{state} is not a German state. Returned address was: {display_name}")]
    UnknownState { state: String, display_name: String },
    #[error("Incomplete address: postcode or road missing. Returned address was: {0}")]
    Incomplete(String),
    #[error("{0} returned no results.")]
    NotFound(String),
}

/// Form data suggested for an institution found by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddressSuggestion {
    pub institution_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// Derive form fields from a search hit.
///
/// Berlin, Hamburg and Bremen use the city as the state. Everywhere else the
/// state comes from `state` or `region` and has to be one of [`STATES`].
/// Postcode and road are both required; the house number is optional.
pub fn suggest_address(place: &Place) -> Result<AddressSuggestion, AddressError> {
    let city = place
        .address_part(&["city", "town", "village"])
        .ok_or_else(|| AddressError::CityMissing(place.display_name.clone()))?;

    let state = if CITY_STATES.contains(&city) {
        city
    } else {
        place
            .address_part(&["state", "region"])
            .ok_or_else(|| AddressError::StateMissing(place.display_name.clone()))?
    };
    if !is_state(state) {
        return Err(AddressError::UnknownState {
            state: state.to_string(),
            display_name: place.display_name.clone(),
        });
    }

    let (Some(postcode), Some(road)) = (
        place.address_part(&["postcode"]),
        place.address_part(&["road"]),
    ) else {
        return Err(AddressError::Incomplete(place.display_name.clone()));
    };
    let house_number = place.address_part(&["house_number"]).unwrap_or("");

    Ok(AddressSuggestion {
        institution_name: place.name.clone(),
        address: format!("{} {}", road, house_number).trim().to_string(),
        city: city.to_string(),
        state: state.to_string(),
        postal_code: postcode.to_string(),
    })
}
