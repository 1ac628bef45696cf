use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One calendar day as read from the page: its displayed label and the
/// labels of its bookable slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReading {
    pub label: String,
    pub times: Vec<String>,
}

/// Raw availability keyed by the exact label text shown on the page.
///
/// The first reading for a label wins. Later pages may re-render a day that
/// was already read, and those repeats are ignored. Iteration follows the
/// order in which labels were first read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSlotMap {
    days: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl RawSlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the label was already present and nothing changed.
    pub fn insert_if_absent(&mut self, label: impl Into<String>, times: Vec<String>) -> bool {
        let label = label.into();
        if self.days.contains_key(&label) {
            return false;
        }
        self.order.push(label.clone());
        self.days.insert(label, times);
        true
    }

    pub fn get(&self, label: &str) -> Option<&[String]> {
        self.days.get(label).map(Vec::as_slice)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.days.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Labels in the order they were first read.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .filter_map(|label| self.days.get(label).map(|times| (label.as_str(), times.as_slice())))
    }
}

impl<L: Into<String>> FromIterator<(L, Vec<String>)> for RawSlotMap {
    fn from_iter<I: IntoIterator<Item = (L, Vec<String>)>>(iter: I) -> Self {
        let mut map = RawSlotMap::new();
        for (label, times) in iter {
            map.insert_if_absent(label, times);
        }
        map
    }
}

/// A single persisted record. Field names are consumed downstream and must
/// stay `fecha` / `horas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEntry {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "horas")]
    pub times: Vec<String>,
}

/// Entries ordered ascending by date, one entry per date.
pub type ResultSet = Vec<NormalizedEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested page was visited.
    Completed,
    /// The next-page control was missing or never became clickable.
    PaginationUnavailable,
    /// The browser stopped answering; `RawSlotMap` holds what was read before.
    SessionLost(String),
    /// The run was asked to stop before the scan finished.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub slots: RawSlotMap,
    pub pages_visited: usize,
    pub days_read: usize,
    pub days_skipped: usize,
    pub stale_retries: usize,
    pub stop_reason: StopReason,
}

impl ScanReport {
    pub fn new() -> Self {
        Self {
            slots: RawSlotMap::new(),
            pages_visited: 0,
            days_read: 0,
            days_skipped: 0,
            stale_retries: 0,
            stop_reason: StopReason::Completed,
        }
    }

    /// An empty report for runs that never reached the calendar.
    pub fn lost(message: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::SessionLost(message.into()),
            ..Self::new()
        }
    }
}

impl Default for ScanReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub path: String,
    pub written: usize,
    pub dropped: Vec<String>,
}
