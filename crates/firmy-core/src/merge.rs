use crate::record::{phone_key, Record};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Row ordering used when the store is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Highest keyword score first, unscored records last.
    ByScore,
    /// Oldest ingestion day first, then by score within a day.
    ByDay,
}

/// Records keyed by normalized phone number, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Store {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert_or_merge(record);
        }
        store
    }

    /// Rebuilds a store from rows read back from the spreadsheet. Rows
    /// without a usable phone are kept as they are, unmerged.
    pub fn from_persisted(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            if record.key().is_empty() {
                store.keep_unkeyed(record);
            } else {
                store.insert_or_merge(record);
            }
        }
        store
    }

    /// Stores a record that has no phone key. Nothing is ever merged into it.
    pub fn keep_unkeyed(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Inserts a record under its phone key, or folds it into the record
    /// already stored under that key. Returns `true` only for a new key.
    ///
    /// Fields of the stored record win. Optional fields it lacks are taken
    /// from the incoming record, and so is the annotation when the stored one
    /// is unset. The earliest `first_seen` is kept.
    pub fn insert_or_merge(&mut self, record: Record) -> bool {
        let key = record.key();
        if key.is_empty() {
            debug!("Dropping record without a usable phone: {}", record.name);
            return false;
        }

        match self.index.get(&key) {
            Some(&position) => {
                let existing = &mut self.records[position];
                if !existing.rejected.is_set() && record.rejected.is_set() {
                    existing.rejected = record.rejected;
                }
                if existing.website.is_none() {
                    existing.website = record.website;
                }
                if existing.matched_keyword_count.is_none() {
                    existing.matched_keyword_count = record.matched_keyword_count;
                }
                if record.first_seen < existing.first_seen {
                    existing.first_seen = record.first_seen;
                }
                false
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    /// Looks a record up by phone number in any formatting.
    pub fn get(&self, phone: &str) -> Option<&Record> {
        self.index
            .get(&phone_key(phone))
            .map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<&Record> {
        let mut sorted: Vec<&Record> = self.records.iter().collect();
        match order {
            SortOrder::ByScore => sorted.sort_by_key(|r| score_rank(r)),
            SortOrder::ByDay => sorted.sort_by_key(|r| (r.first_seen, score_rank(r))),
        }
        sorted
    }
}

fn score_rank(record: &Record) -> (bool, Reverse<u32>) {
    (
        record.matched_keyword_count.is_none(),
        Reverse(record.matched_keyword_count.unwrap_or(0)),
    )
}

/// Collapses records sharing a phone key; the first occurrence wins.
pub fn dedup(records: Vec<Record>) -> Vec<Record> {
    Store::from_records(records).into_records()
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub store: Store,
    pub added: usize,
}

/// Merges a freshly collected batch into previously persisted records.
/// Existing records come first, so their field values win. Existing rows
/// without a phone stay; incoming ones are dropped.
pub fn merge(
    existing: impl IntoIterator<Item = Record>,
    incoming: impl IntoIterator<Item = Record>,
) -> MergeOutcome {
    let mut store = Store::from_persisted(existing);
    let before = store.len();

    for record in incoming {
        store.insert_or_merge(record);
    }

    let added = store.len() - before;
    debug!("Merged store holds {} records ({} new)", store.len(), added);
    MergeOutcome { store, added }
}

/// Counters reported after a collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub found: usize,
    pub unique: usize,
    pub added: usize,
}

impl fmt::Display for CollectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {}, unique {}, added {}",
            self.found, self.unique, self.added
        )
    }
}
