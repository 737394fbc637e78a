use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::UNKNOWN_OWNER;

/// Unix milliseconds.
pub type Ms = i64;

/// 1-based room number, stable for the lifetime of the room.
pub type RoomId = u32;

/// Salted password hash. Never leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub owner: String,
    pub is_reserved: bool,
    pub reservation_date: Option<Ms>,
}

impl Room {
    pub fn vacant(room_id: RoomId) -> Self {
        Self {
            room_id,
            owner: UNKNOWN_OWNER.to_string(),
            is_reserved: false,
            reservation_date: None,
        }
    }

    pub fn reserved(room_id: RoomId, owner: String, at: Ms) -> Self {
        Self {
            room_id,
            owner,
            is_reserved: true,
            reservation_date: Some(at),
        }
    }
}

/// How a room update touches the reserved index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOp {
    Insert,
    Remove,
}

/// A single-room replacement together with its effect on the derived views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpdate {
    pub room: Room,
    pub reserved_delta: i64,
    pub index_op: IndexOp,
}

impl RoomUpdate {
    pub fn reserve(room_id: RoomId, owner: String, at: Ms) -> Self {
        Self {
            room: Room::reserved(room_id, owner, at),
            reserved_delta: 1,
            index_op: IndexOp::Insert,
        }
    }

    pub fn checkout(room_id: RoomId) -> Self {
        Self {
            room: Room::vacant(room_id),
            reserved_delta: -1,
            index_op: IndexOp::Remove,
        }
    }
}

/// A whole-list replacement for grow/shrink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityChange {
    pub rooms: Vec<Room>,
    pub reserved_delta: i64,
    /// Index entries above this id are dropped.
    pub keep_up_to: RoomId,
}

/// One hotel's inventory. Fields that carry invariants are private; the only
/// ways to change them are [`HotelState::apply_room_update`] and
/// [`HotelState::apply_capacity_change`].
#[derive(Debug, Clone)]
pub struct HotelState {
    id: Ulid,
    name: String,
    credential: Credential,
    room_count: u32,
    rooms: Vec<Room>,
    reserved_rooms: u32,
    /// Reserved room ids, ascending.
    reserved_index: Vec<RoomId>,
}

impl HotelState {
    pub fn new(id: Ulid, name: String, credential: Credential, room_count: u32) -> Self {
        Self {
            id,
            name,
            credential,
            room_count,
            rooms: (1..=room_count).map(Room::vacant).collect(),
            reserved_rooms: 0,
            reserved_index: Vec::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn room_count(&self) -> u32 {
        self.room_count
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn reserved_rooms(&self) -> u32 {
        self.reserved_rooms
    }

    pub fn reserved_index(&self) -> &[RoomId] {
        &self.reserved_index
    }

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        if room_id == 0 {
            return None;
        }
        self.rooms.get(room_id as usize - 1)
    }

    // ── Store primitives ─────────────────────────────────────

    /// Replace one room and adjust the reserved count and index in one step.
    ///
    /// Returns `false` without touching anything when the room does not exist
    /// or is already in the target state (reserving a reserved room, checking
    /// out a vacant one).
    pub fn apply_room_update(&mut self, update: RoomUpdate) -> bool {
        let room_id = update.room.room_id;
        let Some(slot) = room_id
            .checked_sub(1)
            .and_then(|i| self.rooms.get_mut(i as usize))
        else {
            return false;
        };
        if slot.is_reserved == update.room.is_reserved {
            return false;
        }
        *slot = update.room;
        self.reserved_rooms = (i64::from(self.reserved_rooms) + update.reserved_delta).max(0) as u32;
        match update.index_op {
            IndexOp::Insert => {
                if let Err(pos) = self.reserved_index.binary_search(&room_id) {
                    self.reserved_index.insert(pos, room_id);
                }
            }
            IndexOp::Remove => {
                if let Ok(pos) = self.reserved_index.binary_search(&room_id) {
                    self.reserved_index.remove(pos);
                }
            }
        }
        true
    }

    /// Replace the room list and adjust the reserved count and index in one step.
    pub fn apply_capacity_change(&mut self, change: CapacityChange) {
        self.rooms = change.rooms;
        self.room_count = self.rooms.len() as u32;
        self.reserved_rooms = (i64::from(self.reserved_rooms) + change.reserved_delta).max(0) as u32;
        let keep = change.keep_up_to;
        self.reserved_index.retain(|id| *id <= keep);
    }

    /// Overwrite the non-inventory fields. Room state is untouched.
    pub fn save_info(&mut self, name: Option<String>, credential: Option<Credential>) {
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(credential) = credential {
            self.credential = credential;
        }
    }

    // ── Capacity planning ────────────────────────────────────

    /// New room list with `added` vacant rooms appended.
    pub fn plan_grow(&self, added: u32) -> CapacityChange {
        let mut rooms = self.rooms.clone();
        let start = self.room_count + 1;
        rooms.extend((start..start + added).map(Room::vacant));
        CapacityChange {
            keep_up_to: self.room_count + added,
            rooms,
            reserved_delta: 0,
        }
    }

    /// New room list with the `removed` highest-id rooms dropped.
    pub fn plan_shrink(&self, removed: u32) -> CapacityChange {
        let new_count = self.room_count.saturating_sub(removed);
        let (kept, dropped) = self.rooms.split_at(new_count as usize);
        let lost = dropped.iter().filter(|r| r.is_reserved).count() as i64;
        CapacityChange {
            rooms: kept.to_vec(),
            reserved_delta: -lost,
            keep_up_to: new_count,
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply a committed event. Returns `false` and leaves the state alone when
    /// the event contradicts it, which only a damaged log can produce. Hotel
    /// creation is handled by the store.
    pub fn apply_event(&mut self, event: &Event) -> bool {
        match event {
            Event::HotelUpdated { name, credential, .. } => {
                self.save_info(name.clone(), credential.clone());
                true
            }
            Event::RoomReserved { room_id, owner, at, .. } => {
                self.apply_room_update(RoomUpdate::reserve(*room_id, owner.clone(), *at))
            }
            Event::RoomCheckedOut { room_id, .. } => {
                self.apply_room_update(RoomUpdate::checkout(*room_id))
            }
            Event::CapacityGrown { added, .. } => {
                if *added == 0 || self.room_count.checked_add(*added).is_none() {
                    return false;
                }
                let change = self.plan_grow(*added);
                self.apply_capacity_change(change);
                true
            }
            Event::CapacityShrunk { removed, .. } => {
                if *removed == 0 || *removed >= self.room_count {
                    return false;
                }
                let change = self.plan_shrink(*removed);
                self.apply_capacity_change(change);
                true
            }
            Event::HotelCreated { .. } => false,
        }
    }

    /// Returns the first inventory invariant that does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.room_count as usize != self.rooms.len() {
            return Err(format!(
                "room count {} does not match {} room records",
                self.room_count,
                self.rooms.len()
            ));
        }
        let reserved: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|r| r.is_reserved)
            .map(|r| r.room_id)
            .collect();
        if self.reserved_rooms as usize != reserved.len() {
            return Err(format!(
                "reserved count {} but {} rooms are reserved",
                self.reserved_rooms,
                reserved.len()
            ));
        }
        if self.reserved_index != reserved {
            return Err(format!(
                "reserved index {:?} does not match reserved rooms {:?}",
                self.reserved_index, reserved
            ));
        }
        for (i, room) in self.rooms.iter().enumerate() {
            if room.room_id as usize != i + 1 {
                return Err(format!("room at position {} has id {}", i + 1, room.room_id));
            }
            if !room.is_reserved && (room.owner != UNKNOWN_OWNER || room.reservation_date.is_some()) {
                return Err(format!("vacant room {} still carries reservation data", room.room_id));
            }
            if room.is_reserved && room.reservation_date.is_none() {
                return Err(format!("reserved room {} has no reservation date", room.room_id));
            }
        }
        Ok(())
    }
}

/// Committed state changes, one per WAL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HotelCreated {
        id: Ulid,
        name: String,
        credential: Credential,
        room_count: u32,
    },
    HotelUpdated {
        id: Ulid,
        name: Option<String>,
        credential: Option<Credential>,
    },
    RoomReserved {
        hotel_id: Ulid,
        room_id: RoomId,
        owner: String,
        at: Ms,
    },
    RoomCheckedOut {
        hotel_id: Ulid,
        room_id: RoomId,
    },
    CapacityGrown {
        hotel_id: Ulid,
        added: u32,
    },
    CapacityShrunk {
        hotel_id: Ulid,
        removed: u32,
    },
}

impl Event {
    pub fn hotel_id(&self) -> Ulid {
        match self {
            Event::HotelCreated { id, .. } | Event::HotelUpdated { id, .. } => *id,
            Event::RoomReserved { hotel_id, .. }
            | Event::RoomCheckedOut { hotel_id, .. }
            | Event::CapacityGrown { hotel_id, .. }
            | Event::CapacityShrunk { hotel_id, .. } => *hotel_id,
        }
    }
}
