use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::place::is_state;

/// Column headers of the Events sheet, in on-disk order.
pub const EVENT_HEADERS: [&str; 8] = [
    "Datum",
    "Hochschule",
    "Adresse",
    "Stadt",
    "Bundesland",
    "PLZ",
    "Tische",
    "Teilnehmer",
];

/// One recorded outreach event.
///
/// Strings are stored exactly as entered. Grouping compares
/// `institution_name` and `city` byte for byte, so `"Uni A"` and `"Uni A "`
/// end up in different statistics rows.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub date: String,
    pub institution_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub table_count: u32,
    pub participant_count: u32,
}

impl EventRecord {
    /// Grouping key used by the aggregator.
    pub fn group_key(&self) -> (&str, &str) {
        (&self.institution_name, &self.city)
    }
}

/// Raw text of the manual entry form.
///
/// Every field arrives as free text; [`EventForm::validate`] turns it into an
/// [`EventRecord`] or explains what is wrong.
#[derive(Clone, Debug, Default)]
pub struct EventForm {
    pub date: String,
    pub institution_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub tables: String,
    pub participants: String,
}

impl EventForm {
    /// Validate a manually entered event.
    ///
    /// All fields must be filled in, the state must be one of the sixteen
    /// German states and both counts must be integers greater than zero.
    /// Text fields are kept verbatim.
    ///
    /// # Errors
    /// * [`Error::Validation`] naming the first problem found
    pub fn validate(&self) -> Result<EventRecord> {
        let fields = [
            &self.date,
            &self.institution_name,
            &self.address,
            &self.city,
            &self.postal_code,
            &self.state,
            &self.tables,
            &self.participants,
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(Error::Validation("All fields must be filled in.".to_string()));
        }

        if !is_state(&self.state) {
            return Err(Error::Validation(format!(
                "{} is not a German state.",
                self.state
            )));
        }

        let table_count = parse_positive(&self.tables, "tables")?;
        let participant_count = parse_positive(&self.participants, "participants")?;

        Ok(EventRecord {
            date: self.date.clone(),
            institution_name: self.institution_name.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            table_count,
            participant_count,
        })
    }
}

fn parse_positive(value: &str, field: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Validation(format!(
            "Tables and participants must be greater than zero ({} = {:?}).",
            field, value
        ))),
    }
}
