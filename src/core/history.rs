//! Navigation history tracking.
//!
//! Provides immutable tracking of committed transitions over time.

use crate::params::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A state name with the params it was entered with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub params: Params,
}

impl Location {
    pub fn new(state: impl Into<String>, params: Params) -> Self {
        Self {
            state: state.into(),
            params,
        }
    }
}

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use wayfinder::core::{Location, NavigationRecord};
/// use wayfinder::params::Params;
/// use chrono::Utc;
///
/// let record = NavigationRecord {
///     transition: 1,
///     from: Location::default(),
///     to: Location::new("home", Params::new()),
///     url: Some("/home".to_string()),
///     timestamp: Utc::now(),
///     redirects: 0,
/// };
/// assert_eq!(record.to.state, "home");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavigationRecord {
    /// Id of the transition that committed
    pub transition: u64,
    /// Where the router was before
    pub from: Location,
    /// Where the router is now
    pub to: Location,
    /// URL of the new location, if it has one
    pub url: Option<String>,
    /// When the transition committed
    pub timestamp: DateTime<Utc>,
    /// How many redirects led to this transition
    pub redirects: usize,
}

/// Ordered history of committed transitions.
///
/// History is immutable - the `record` method returns a new history
/// with the record added. A `limit` keeps only the newest records.
///
/// # Example
///
/// ```rust
/// use wayfinder::core::{Location, NavigationHistory, NavigationRecord};
/// use wayfinder::params::Params;
/// use chrono::Utc;
///
/// let history = NavigationHistory::new();
/// let history = history.record(NavigationRecord {
///     transition: 1,
///     from: Location::default(),
///     to: Location::new("inbox", Params::new()),
///     url: None,
///     timestamp: Utc::now(),
///     redirects: 0,
/// });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 2); // root -> inbox
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NavigationHistory {
    records: Vec<NavigationRecord>,
    limit: Option<usize>,
}

impl NavigationHistory {
    /// Create a new empty, unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history that keeps at most `limit` records.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// This is a pure function - the existing history is left unchanged.
    pub fn record(&self, record: NavigationRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        if let Some(limit) = self.limit {
            let excess = records.len().saturating_sub(limit);
            records.drain(..excess);
        }
        Self {
            records,
            limit: self.limit,
        }
    }

    /// Locations visited, in order: the first record's origin, then the
    /// destination of each record.
    pub fn get_path(&self) -> Vec<&Location> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(&first.from);
        }
        path.extend(self.records.iter().map(|r| &r.to));
        path
    }

    /// Time between the first and last recorded transition.
    ///
    /// Returns `None` if nothing was recorded.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.first()?, self.records.last()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Records, oldest first.
    pub fn records(&self) -> &[NavigationRecord] {
        &self.records
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&NavigationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
