//! In-memory registry of event ids already observed by this process.
//!
//! `DedupRegistry` only grows: ids are never evicted, so memory use is
//! proportional to the number of distinct events seen since startup. A
//! restart loses the history and may cause duplicate downstream publishes.
//!
//! The registry is `Sync`; workers share it by reference and synchronise
//! only through [`DedupRegistry::insert`], which is an atomic
//! insert-if-absent.

use dashmap::DashSet;

/// Process-lifetime set of observed event ids.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    ids: DashSet<String>,
}

impl DedupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` if absent.
    ///
    /// Returns `true` when this call added the id and `false` when it was
    /// already present. For concurrent callers racing on the same id,
    /// exactly one observes `true`.
    pub fn insert(&self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_owned())
    }

    /// Insert every id, returning how many were new.
    pub fn seed<'a, I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().filter(|id| self.insert(id)).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of distinct ids held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
