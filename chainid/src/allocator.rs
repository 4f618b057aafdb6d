// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bounded pool of chain identifiers

use crate::address::{AddressLayout, ChainFlags, VirtualAddress};
use crate::errors::ChainIdError;
use concurrency::sync::{Mutex, MutexGuard};
use crossbeam_channel::Sender;
use model::ChainKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::PoisonError;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// A chain identifier, as carried in the chain field of a [`VirtualAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u32);

impl ChainId {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}
impl Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notifications for external audit or statistics collectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainIdEvent {
    Allocated { key: ChainKey, chain_id: ChainId },
    Released { key: ChainKey, chain_id: ChainId },
}

/// Outcome of [`ChainIdAllocator::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub chain_id: ChainId,
    /// false if the key already owned the identifier
    pub fresh: bool,
}

#[derive(Debug)]
struct Pool {
    capacity: u32,
    /// identifiers never handed out are `next..capacity`
    next: u32,
    /// released identifiers, reused first
    released: Vec<ChainId>,
    owners: HashMap<ChainId, ChainKey>,
    by_key: HashMap<ChainKey, ChainId>,
}

impl Pool {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            released: Vec::new(),
            owners: HashMap::new(),
            by_key: HashMap::new(),
        }
    }
    fn pop_free(&mut self) -> Option<ChainId> {
        if let Some(id) = self.released.pop() {
            return Some(id);
        }
        if self.next < self.capacity {
            let id = ChainId(self.next);
            self.next += 1;
            return Some(id);
        }
        None
    }
}

/// Allocator of chain identifiers.
///
/// Identifiers are allocated per [`ChainKey`]: allocating for a key that already owns an
/// identifier returns that identifier. All the pool state is kept under a single lock.
#[derive(Debug)]
pub struct ChainIdAllocator {
    layout: AddressLayout,
    pool: Mutex<Pool>,
    events: Option<Sender<ChainIdEvent>>,
}

impl ChainIdAllocator {
    #[must_use]
    pub fn new(layout: AddressLayout) -> Self {
        Self {
            layout,
            pool: Mutex::new(Pool::new(layout.capacity())),
            events: None,
        }
    }
    /// Send allocation and release notifications to `sink`
    #[must_use]
    pub fn with_events(mut self, sink: Sender<ChainIdEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    fn pool(&self) -> MutexGuard<'_, Pool> {
        // every pool mutation completes before anything can panic
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: ChainIdEvent) {
        if let Some(sink) = &self.events {
            if let Err(e) = sink.try_send(event) {
                warn!("Could not deliver chain id event: {e}");
            }
        }
    }

    #[must_use]
    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }
    /// Number of identifiers currently allocated
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.pool().owners.len()
    }
    /// The identifier owned by `key`, if any
    #[must_use]
    pub fn lookup(&self, key: &ChainKey) -> Option<ChainId> {
        self.pool().by_key.get(key).copied()
    }

    /// Allocate an identifier for `key`, telling whether it was newly allocated.
    pub fn acquire(&self, key: ChainKey) -> Result<Allocation, ChainIdError> {
        let chain_id = {
            let mut pool = self.pool();
            if let Some(chain_id) = pool.by_key.get(&key).copied() {
                debug!("Chain key {key} already owns chain id {chain_id}");
                return Ok(Allocation {
                    chain_id,
                    fresh: false,
                });
            }
            let Some(chain_id) = pool.pop_free() else {
                error!(
                    "No chain id left for key {key}: all {} are in use",
                    pool.capacity
                );
                return Err(ChainIdError::PoolExhausted {
                    capacity: pool.capacity,
                });
            };
            pool.owners.insert(chain_id, key);
            pool.by_key.insert(key, chain_id);
            chain_id
        };
        debug!("Allocated chain id {chain_id} for key {key}");
        self.notify(ChainIdEvent::Allocated { key, chain_id });
        Ok(Allocation {
            chain_id,
            fresh: true,
        })
    }

    /// Allocate an identifier for `key`, or return the one it already owns.
    pub fn allocate(&self, key: ChainKey) -> Result<ChainId, ChainIdError> {
        self.acquire(key).map(|allocation| allocation.chain_id)
    }

    /// Return `chain_id` to the pool. Returns the key that owned it.
    pub fn release(&self, chain_id: ChainId) -> Result<ChainKey, ChainIdError> {
        let key = {
            let mut pool = self.pool();
            if chain_id.as_u32() >= pool.capacity {
                error!("Refusing to release chain id {chain_id}: out of range");
                return Err(ChainIdError::InvalidRelease {
                    chain_id,
                    reason: "out of range",
                });
            }
            let Some(key) = pool.owners.remove(&chain_id) else {
                error!("Refusing to release chain id {chain_id}: not allocated");
                return Err(ChainIdError::InvalidRelease {
                    chain_id,
                    reason: "not allocated",
                });
            };
            pool.by_key.remove(&key);
            pool.released.push(chain_id);
            key
        };
        debug!("Released chain id {chain_id} of key {key}");
        self.notify(ChainIdEvent::Released { key, chain_id });
        Ok(key)
    }

    /// Encode the base address of a chain with this allocator's layout
    pub fn encode(
        &self,
        flags: ChainFlags,
        port: u32,
        chain_id: ChainId,
    ) -> Result<VirtualAddress, ChainIdError> {
        self.layout.encode(flags, port, chain_id)
    }
}
