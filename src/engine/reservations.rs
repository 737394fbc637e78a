use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::observability::timed;
use crate::projection::HotelView;

use super::rules::{check_grow, check_occupied, check_reservable, check_shrink, now_ms, validate_owner};
use super::{Engine, EngineError};

impl Engine {
    /// Reserve a vacant room for `owner`, stamped with the current time.
    pub async fn reserve_room(
        &self,
        identity: Ulid,
        room_id: RoomId,
        owner: &str,
    ) -> Result<HotelView, EngineError> {
        timed("reserve_room", async {
            let owner = validate_owner(owner)?;
            let lock = self.lock_for_write(identity).await?;
            check_reservable(&lock, room_id)?;

            let event = Event::RoomReserved {
                hotel_id: identity,
                room_id,
                owner,
                at: now_ms(),
            };
            let view = self.commit(lock, event).await?;
            debug!(hotel = %identity, room_id, "room reserved");
            Ok(view)
        })
        .await
    }

    /// Release a reserved room back to `Unknown`.
    pub async fn checkout_room(&self, identity: Ulid, room_id: RoomId) -> Result<HotelView, EngineError> {
        timed("checkout_room", async {
            let lock = self.lock_for_write(identity).await?;
            check_occupied(&lock, room_id)?;

            let event = Event::RoomCheckedOut {
                hotel_id: identity,
                room_id,
            };
            let view = self.commit(lock, event).await?;
            debug!(hotel = %identity, room_id, "room checked out");
            Ok(view)
        })
        .await
    }

    /// Append `count` vacant rooms, numbered after the current highest.
    pub async fn grow_capacity(&self, identity: Ulid, count: u32) -> Result<HotelView, EngineError> {
        timed("grow_capacity", async {
            let lock = self.lock_for_write(identity).await?;
            check_grow(&lock, count, self.config.max_rooms)?;

            let event = Event::CapacityGrown {
                hotel_id: identity,
                added: count,
            };
            let view = self.commit(lock, event).await?;
            info!(hotel = %identity, added = count, room_count = view.room_count, "capacity grown");
            Ok(view)
        })
        .await
    }

    /// Remove the `count` highest-numbered rooms. Reservations on them are dropped.
    pub async fn shrink_capacity(&self, identity: Ulid, count: u32) -> Result<HotelView, EngineError> {
        timed("shrink_capacity", async {
            let lock = self.lock_for_write(identity).await?;
            check_shrink(&lock, count)?;
            let lost = lock.plan_shrink(count).reserved_delta.unsigned_abs();

            let event = Event::CapacityShrunk {
                hotel_id: identity,
                removed: count,
            };
            let view = self.commit(lock, event).await?;
            info!(
                hotel = %identity,
                removed = count,
                reservations_dropped = lost,
                room_count = view.room_count,
                "capacity shrunk"
            );
            Ok(view)
        })
        .await
    }
}
