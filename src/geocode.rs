//! Address to coordinate resolution.
//!
//! The aggregator only sees the [`GeoResolver`] trait. Concrete services
//! (see [`crate::nominatim`]) are wrapped in [`RateLimited`] and [`Retry`] to
//! respect the service's request budget.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A free-text geocoding query, assembled from the parts of an address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeoQuery {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl GeoQuery {
    /// Full query for an event: street, city, state and postal code.
    pub fn for_address(address: &str, city: &str, state: &str, postal_code: &str) -> Self {
        GeoQuery {
            address: address.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            postal_code: postal_code.to_string(),
        }
    }

    /// Coarser city-level query used when the full address does not resolve.
    pub fn for_city(city: &str, state: &str) -> Self {
        GeoQuery {
            city: city.to_string(),
            state: state.to_string(),
            ..GeoQuery::default()
        }
    }

    /// Render the query as `"<address>, <city>, <state>, <postal>, <country>"`.
    ///
    /// Empty parts are left out so that city-level queries don't start with a
    /// dangling separator.
    pub fn to_query_string(&self, country: &str) -> String {
        [
            self.address.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            country,
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

impl fmt::Display for GeoQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string(""))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnresolvedReason {
    /// The service answered but found nothing.
    NoMatch,
    /// The service could not be reached or returned an error.
    Unavailable(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::NoMatch => f.write_str("no match"),
            UnresolvedReason::Unavailable(msg) => write!(f, "service unavailable: {}", msg),
        }
    }
}

/// Outcome of one geocoding attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Resolved(Coordinate),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Resolution::Resolved(c) => Some(*c),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// Best-effort address to coordinate lookup.
///
/// Implementations may block. Calls are made one at a time from the thread
/// running the aggregation pass.
pub trait GeoResolver {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution;
}

impl<R: GeoResolver + ?Sized> GeoResolver for &mut R {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        (**self).resolve(query)
    }
}

impl<R: GeoResolver + ?Sized> GeoResolver for Box<R> {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        (**self).resolve(query)
    }
}

/// Resolver used when no network lookups are wanted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Offline;

impl GeoResolver for Offline {
    fn resolve(&mut self, _query: &GeoQuery) -> Resolution {
        Resolution::Unresolved(UnresolvedReason::Unavailable("offline".to_string()))
    }
}

/// Paces calls to the wrapped resolver to at most `per_second` per second.
///
/// The first call goes through immediately; each later call sleeps until
/// the interval since the previous call has passed.
pub struct RateLimited<R> {
    inner: R,
    interval: Duration,
    last_call: Option<Instant>,
}

impl<R> RateLimited<R> {
    pub fn new(inner: R, per_second: f64) -> Self {
        let interval = if per_second > 0.0 && per_second.is_finite() {
            Duration::from_secs_f64(1.0 / per_second)
        } else {
            Duration::ZERO
        };
        RateLimited {
            inner,
            interval,
            last_call: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

impl<R: GeoResolver> GeoResolver for RateLimited<R> {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        self.pace();
        self.inner.resolve(query)
    }
}

/// Retries transport failures a bounded number of times.
///
/// `NoMatch` is an answer, not a failure, and is returned straight away.
pub struct Retry<R> {
    inner: R,
    retries: u32,
}

impl<R> Retry<R> {
    pub fn new(inner: R, retries: u32) -> Self {
        Retry { inner, retries }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: GeoResolver> GeoResolver for Retry<R> {
    fn resolve(&mut self, query: &GeoQuery) -> Resolution {
        let mut outcome = self.inner.resolve(query);
        let mut attempt = 0;
        while attempt < self.retries {
            match outcome {
                Resolution::Unresolved(UnresolvedReason::Unavailable(ref msg)) => {
                    log::debug!("retrying {:?} after failure: {}", query.to_string(), msg);
                }
                _ => break,
            }
            attempt += 1;
            outcome = self.inner.resolve(query);
        }
        outcome
    }
}
