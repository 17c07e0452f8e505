//! Identifier allocation.
//!
//! Numerics are handed out per `(prefix, owner)` in strictly increasing order
//! and are never handed out twice, even after the object that held one is
//! deleted. Released identifiers are only remembered for introspection.
//!
//! All state sits behind one `tokio::sync::RwLock`. The lock is fair: once a
//! writer is queued, readers that arrive later wait for it. Callers must not
//! hold a store transaction while allocating; the mapper allocates before it
//! opens a unit of work and calls [`IdAllocator::observe`] after commit.

use std::collections::{BTreeSet, HashMap};

use taleweaver_domain::{Identifier, OwnerId};
use tokio::sync::RwLock;

use crate::infrastructure::ports::RepoError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Soft cap on numerics per `(prefix, owner)`. `None` means unbounded.
    pub max_numeric: Option<u64>,
}

#[derive(Debug, Default)]
struct Sequence {
    last: u64,
    released: BTreeSet<u64>,
}

type Key = (String, OwnerId);

#[derive(Debug, Default)]
pub struct IdAllocator {
    config: AllocatorConfig,
    sequences: RwLock<HashMap<Key, Sequence>>,
}

impl IdAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            sequences: RwLock::new(HashMap::new()),
        }
    }

    /// Highest numeric this allocator will hand out or accept. Stored
    /// numerics are SQLite integers, so the ceiling never exceeds `i64::MAX`.
    pub fn ceiling(&self) -> u64 {
        self.config
            .max_numeric
            .unwrap_or(u64::MAX)
            .min(i64::MAX as u64)
    }

    /// Reject a client-supplied identifier the allocator could not track.
    pub fn check_explicit(&self, id: &Identifier) -> Result<(), RepoError> {
        let limit = self.ceiling();
        if id.numeric() > limit {
            return Err(RepoError::validation(format!(
                "{} exceeds the identifier limit of {limit}",
                id.obj_id
            )));
        }
        Ok(())
    }

    /// Hand out the next identifier for `(prefix, owner)`.
    pub async fn allocate(&self, prefix: &str, owner: OwnerId) -> Result<Identifier, RepoError> {
        let mut sequences = self.sequences.write().await;
        let sequence = sequences.entry((prefix.to_string(), owner)).or_default();

        let limit = self.ceiling();
        let next = sequence
            .last
            .checked_add(1)
            .filter(|n| *n <= limit)
            .ok_or_else(|| RepoError::AllocatorExhausted {
                prefix: prefix.to_string(),
                owner,
                limit,
            })?;
        sequence.last = next;

        tracing::debug!(prefix, numeric = next, owner = %owner, "Allocated identifier");
        Ok(Identifier::new(prefix, next, owner))
    }

    /// Record that an identifier's object was discarded. The numeric is not
    /// reused. Unknown sequences and never-allocated numerics are ignored.
    pub async fn release(&self, id: &Identifier) {
        let mut sequences = self.sequences.write().await;
        let Some(sequence) = sequences.get_mut(&(id.prefix().to_string(), id.owner)) else {
            return;
        };
        let numeric = id.numeric();
        if numeric == 0 || numeric > sequence.last {
            return;
        }
        if sequence.released.insert(numeric) {
            tracing::debug!(
                prefix = id.prefix(),
                numeric,
                owner = %id.owner,
                "Released identifier"
            );
        }
    }

    /// Raise the counter so `id` is never handed out. Used after persisting
    /// identifiers that did not come from this allocator (imports).
    pub async fn observe(&self, id: &Identifier) {
        {
            let sequences = self.sequences.read().await;
            if let Some(sequence) = sequences.get(&(id.prefix().to_string(), id.owner)) {
                if sequence.last >= id.numeric() {
                    return;
                }
            }
        }
        let mut sequences = self.sequences.write().await;
        let sequence = sequences
            .entry((id.prefix().to_string(), id.owner))
            .or_default();
        sequence.last = sequence.last.max(id.numeric());
    }

    /// Load durable counters `(prefix, owner, last_numeric)`.
    pub async fn seed(&self, counters: impl IntoIterator<Item = (String, OwnerId, u64)>) {
        let mut sequences = self.sequences.write().await;
        let mut seeded = 0usize;
        for (prefix, owner, last) in counters {
            let sequence = sequences.entry((prefix, owner)).or_default();
            sequence.last = sequence.last.max(last);
            seeded += 1;
        }
        tracing::info!(sequences = seeded, "Seeded identifier allocator");
    }

    /// Released identifiers for `prefix` across all owners.
    pub async fn list_released(&self, prefix: &str) -> BTreeSet<Identifier> {
        let sequences = self.sequences.read().await;
        sequences
            .iter()
            .filter(|((p, _), _)| p == prefix)
            .flat_map(|((p, owner), sequence)| {
                sequence
                    .released
                    .iter()
                    .map(move |n| Identifier::new(p.clone(), *n, *owner))
            })
            .collect()
    }

    /// Identifiers handed out for `(prefix, owner)` and not released, ascending.
    pub async fn list_allocated(&self, prefix: &str, owner: OwnerId) -> Vec<Identifier> {
        let sequences = self.sequences.read().await;
        let Some(sequence) = sequences.get(&(prefix.to_string(), owner)) else {
            return Vec::new();
        };
        (1..=sequence.last)
            .filter(|n| !sequence.released.contains(n))
            .map(|n| Identifier::new(prefix, n, owner))
            .collect()
    }

    /// Highest numeric handed out or observed for `(prefix, owner)`.
    pub async fn last_numeric(&self, prefix: &str, owner: OwnerId) -> u64 {
        self.sequences
            .read()
            .await
            .get(&(prefix.to_string(), owner))
            .map(|s| s.last)
            .unwrap_or(0)
    }
}
