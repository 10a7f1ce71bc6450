//! # Staging Buffer Module
//!
//! A transient clipboard bridging the "pick food on one screen, commit it on
//! another" interaction: selections accumulate while browsing search results
//! or favorites and are drained in one step when the user commits them
//! against a meal category.

use std::sync::Mutex;

use crate::food_model::{FoodRecord, UNAVAILABLE};

/// A food selection frozen at staging time: the record, the chosen unit
/// basis, and the quantity multiplier. Immutable once staged.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEntry {
    pub record: FoodRecord,
    pub unit_index: usize,
    pub quantity: f32,
}

impl StagedEntry {
    /// Collapse the staged selection into a loggable `(title, kcal)` entry.
    ///
    /// An out-of-range unit or an unavailable kcal value stays unavailable
    /// instead of being scaled into a misleading number.
    pub fn log_entry(&self) -> LogEntry {
        let kcal = self
            .record
            .units
            .get(self.unit_index)
            .map(|basis| basis.scaled(self.quantity)[0])
            .unwrap_or(UNAVAILABLE);
        LogEntry {
            title: self.record.title.clone(),
            kcal,
        }
    }
}

/// A minimal diary line: what was eaten and how many kcal it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub title: String,
    pub kcal: f32,
}

/// Ordered multi-item staging buffer. Duplicates are allowed; insertion
/// order is preserved.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    entries: Mutex<Vec<StagedEntry>>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and report the new buffer size.
    pub fn stage(&self, record: FoodRecord, unit_index: usize, quantity: f32) -> usize {
        let mut entries = self.entries.lock().unwrap();
        entries.push(StagedEntry {
            record,
            unit_index,
            quantity,
        });
        entries.len()
    }

    /// Append an already-built entry and report the new buffer size.
    pub fn stage_entry(&self, entry: StagedEntry) -> usize {
        let mut entries = self.entries.lock().unwrap();
        entries.push(entry);
        entries.len()
    }

    /// Atomically take the full ordered contents, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<StagedEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
