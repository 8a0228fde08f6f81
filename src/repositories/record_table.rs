use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    Duplicate(String),
    #[error("record {0} not found")]
    Missing(String),
    #[error("record {id} changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },
}

/// A record together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// Keyed table with per-row versions.
///
/// Each mutation holds the row's shard lock for its whole read-modify-write,
/// and bumps the version, so `compare_and_swap` rejects writers that worked
/// from a stale read.
#[derive(Debug)]
pub struct RecordTable<T> {
    rows: DashMap<String, Versioned<T>>,
}

impl<T> Default for RecordTable<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<T: Clone> RecordTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, record: T) -> Result<Versioned<T>, StoreError> {
        match self.rows.entry(id.into()) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                let row = Versioned { version: 1, record };
                entry.insert(row.clone());
                Ok(row)
            }
        }
    }

    /// Returns the stored row, inserting `make()` first if the id is free.
    pub fn get_or_insert_with(&self, id: impl Into<String>, make: impl FnOnce() -> T) -> Versioned<T> {
        self.rows
            .entry(id.into())
            .or_insert_with(|| Versioned {
                version: 1,
                record: make(),
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Versioned<T>> {
        self.rows.get(id).map(|row| row.value().clone())
    }

    /// Replaces the record only if its version still equals `expected_version`.
    pub fn compare_and_swap(
        &self,
        id: &str,
        expected_version: u64,
        record: T,
    ) -> Result<Versioned<T>, StoreError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;

        if row.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                actual: row.version,
            });
        }

        row.version += 1;
        row.record = record;
        Ok(row.value().clone())
    }

    /// Applies `mutate` under the row lock. Returning `false` from `mutate`
    /// leaves the version untouched.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Versioned<T>, StoreError>
    where
        F: FnOnce(&mut T) -> bool,
    {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;

        if mutate(&mut row.record) {
            row.version += 1;
        }
        Ok(row.value().clone())
    }

    /// Snapshot of all records, in no particular order.
    pub fn values(&self) -> Vec<T> {
        self.rows.iter().map(|row| row.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
