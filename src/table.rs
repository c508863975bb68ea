//! Hostname to address table shared by the request handlers.

use rustc_hash::FxHashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};

/// An immutable hostname → address map.
pub type HostMap = FxHashMap<String, Ipv4Addr>;

/// The active resolution table.
///
/// Published maps are never mutated; a refresh builds a whole new map and
/// swaps the pointer. The lock only covers that swap, so a reader holding a
/// snapshot can look names up without contending with the writer and always
/// sees one complete generation.
#[derive(Default)]
pub struct ResolutionTable {
    current: RwLock<Arc<HostMap>>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation of the table.
    pub fn snapshot(&self) -> Arc<HostMap> {
        // A panic while holding the lock cannot leave a half-written Arc.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Look a name up in the current generation.
    pub fn lookup(&self, name: &str) -> Option<Ipv4Addr> {
        self.snapshot().get(name).copied()
    }

    /// Publish `hosts` as the new generation, dropping the previous one once
    /// its last reader is done with it.
    pub fn replace(&self, hosts: HostMap) {
        let next = Arc::new(hosts);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        drop(previous);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
