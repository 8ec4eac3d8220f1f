//! Delivery history.
//!
//! Every accepted dose and every cartridge refill is appended to the pump's
//! [`DeliveryLog`] in delivery order. The log is unbounded by default; a
//! capacity turns it into a ring that drops the oldest entries while
//! [`total_recorded`](DeliveryLog::total_recorded) keeps counting.
//!
//! Writing the history to disk is the host's job. The log hands out either
//! the rendered text ([`to_text`](DeliveryLog::to_text)) or a compact
//! `postcard` snapshot ([`encode`](DeliveryLog::encode)).

use core::fmt;
use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest label kept; longer labels are truncated.
pub const LABEL_CAP: usize = 32;

pub const LABEL_BOLUS: &str = "bolus";
pub const LABEL_BASAL: &str = "basal";
pub const LABEL_AUTOMATIC_CORRECTION: &str = "automatic-correction";
pub const LABEL_REFILL: &str = "refill";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEntry {
    /// Pump uptime when the entry was written.
    pub at: Duration,
    pub label: heapless::String<LABEL_CAP>,
    /// Units delivered; zero for events such as refills.
    pub units: f64,
}

impl DeliveryEntry {
    pub fn new(at: Duration, label: &str, units: f64) -> Self {
        let mut l = heapless::String::new();
        let mut end = label.len().min(LABEL_CAP);
        while !label.is_char_boundary(end) {
            end -= 1;
        }
        let _ = l.push_str(&label[..end]);
        Self {
            at,
            label: l,
            units,
        }
    }
}

impl fmt::Display for DeliveryEntry {
    /// `HH:MM:SS: <label> Delivered: <units> units`, clock wrapping daily.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.at.as_secs() % 86_400;
        write!(
            f,
            "{:02}:{:02}:{:02}: {} Delivered: {:.2} units",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.label,
            self.units
        )
    }
}

/// Append-only delivery log with an optional ring bound.
#[derive(Debug, Default)]
pub struct DeliveryLog {
    entries: VecDeque<DeliveryEntry>,
    capacity: Option<usize>,
    total: u64,
}

impl DeliveryLog {
    /// Unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `capacity` entries (`None` = unbounded).
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.map(|c| c.max(1)),
            total: 0,
        }
    }

    pub fn push(&mut self, entry: DeliveryEntry) {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
        self.total = self.total.saturating_add(1);
    }

    /// Entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ever pushed, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &DeliveryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&DeliveryEntry> {
        self.entries.back()
    }

    pub fn snapshot(&self) -> Vec<DeliveryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Rendered history, one entry per line.
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Binary snapshot of the retained entries.
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(&self.snapshot())
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Vec<DeliveryEntry>, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
