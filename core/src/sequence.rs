use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Proof that a request for `key` was started, carrying its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    seq: u64,
}

impl<K> Ticket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug)]
struct Slot<V> {
    issued: u64,
    settled: u64,
    value: Option<V>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            issued: 0,
            settled: 0,
            value: None,
        }
    }
}

/// Latest settled value per key, guarded by monotonic request numbers.
///
/// Each request takes a ticket with [`SettledMap::begin`]. When it completes,
/// [`SettledMap::settle`] stores its value unless a request with a higher
/// number for the same key has already settled. Requests may finish in any
/// order; the map only ever moves forward.
#[derive(Debug)]
pub struct SettledMap<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for SettledMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SettledMap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, key: K) -> Ticket<K> {
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        slot.issued += 1;
        Ticket {
            key,
            seq: slot.issued,
        }
    }

    /// Record the outcome of `ticket`. Returns `false` if it arrived too late.
    pub fn settle(&self, ticket: &Ticket<K>, value: V) -> bool {
        let mut slots = self.lock();
        let slot = slots.entry(ticket.key.clone()).or_default();
        if ticket.seq <= slot.settled {
            return false;
        }
        slot.settled = ticket.seq;
        slot.value = Some(value);
        true
    }

    /// Store a value that did not come from a request, e.g. a fresh read.
    /// Counts as a request that started and settled just now.
    pub fn set(&self, key: K, value: V) {
        let ticket = self.begin(key);
        self.settle(&ticket, value);
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).and_then(|slot| slot.value.clone())
    }
}
