use serde::Serialize;
use ulid::Ulid;

use crate::model::{HotelState, Ms, Room, RoomId};

/// The public face of a hotel. Credential material has no field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelView {
    pub id: Ulid,
    pub name: String,
    pub room_count: u32,
    pub reserved_rooms: u32,
    pub rooms: Vec<RoomView>,
    pub reserved_index: Vec<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
    pub owner: String,
    pub is_reserved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_date: Option<Ms>,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id,
            owner: room.owner.clone(),
            is_reserved: room.is_reserved,
            reservation_date: room.reservation_date,
        }
    }
}

impl From<&HotelState> for HotelView {
    fn from(hotel: &HotelState) -> Self {
        Self {
            id: hotel.id(),
            name: hotel.name().to_string(),
            room_count: hotel.room_count(),
            reserved_rooms: hotel.reserved_rooms(),
            rooms: hotel.rooms().iter().map(RoomView::from).collect(),
            reserved_index: hotel.reserved_index().to_vec(),
        }
    }
}
