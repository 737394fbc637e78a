use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::HotelState;

use super::{EngineError, SharedHotel};

/// Authoritative in-memory inventory: one locked state per hotel plus the
/// unique-name index.
pub struct InventoryStore {
    hotels: DashMap<Ulid, SharedHotel>,
    names: DashMap<String, Ulid>,
    /// Creations admitted by [`InventoryStore::reserve_slot`] but not yet inserted.
    pending: AtomicUsize,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryStore {
    pub fn new() -> Self {
        Self {
            hotels: DashMap::new(),
            names: DashMap::new(),
            pending: AtomicUsize::new(0),
        }
    }

    // ── Hotels ───────────────────────────────────────────────

    pub fn hotel_count(&self) -> usize {
        self.hotels.len()
    }

    pub fn load(&self, id: &Ulid) -> Result<SharedHotel, EngineError> {
        self.hotels
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::HotelNotFound(id.to_string()))
    }

    pub fn insert(&self, state: HotelState) {
        let id = state.id();
        self.names.insert(state.name().to_string(), id);
        self.hotels.insert(id, Arc::new(RwLock::new(state)));
    }

    pub fn all(&self) -> Vec<SharedHotel> {
        self.hotels.iter().map(|e| e.value().clone()).collect()
    }

    /// Admit one more hotel if stored plus in-flight creations stay under `max`.
    /// Pair with [`InventoryStore::release_slot`] once the hotel is inserted or
    /// the creation fails.
    pub fn reserve_slot(&self, max: usize) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (self.hotels.len() + pending < max).then_some(pending + 1)
            })
            .is_ok()
    }

    pub fn release_slot(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    // ── Name index ───────────────────────────────────────────

    pub fn hotel_for_name(&self, name: &str) -> Option<Ulid> {
        self.names.get(name).map(|e| *e.value())
    }

    /// Claim `name` for `id`. Claiming a name the hotel already holds succeeds.
    pub fn claim_name(&self, name: &str, id: Ulid) -> Result<(), EngineError> {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(e) if *e.get() == id => Ok(()),
            Entry::Occupied(_) => Err(EngineError::NameTaken(name.to_string())),
            Entry::Vacant(e) => {
                e.insert(id);
                Ok(())
            }
        }
    }

    /// Drop `name` only if it still points at `id`.
    pub fn release_name(&self, name: &str, id: Ulid) {
        self.names.remove_if(name, |_, owner| *owner == id);
    }
}
