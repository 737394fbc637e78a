use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

/// Trimmed, length-checked hotel name.
pub(crate) fn validate_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(EngineError::Validation(format!(
            "name must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_password(password: &str) -> Result<(), EngineError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(EngineError::Validation(format!(
            "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_owner(owner: &str) -> Result<String, EngineError> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(EngineError::Validation("owner must not be blank".into()));
    }
    if owner.chars().count() > MAX_OWNER_LEN {
        return Err(EngineError::Validation(format!(
            "owner must be at most {MAX_OWNER_LEN} characters"
        )));
    }
    Ok(owner.to_string())
}

pub(crate) fn validate_room_count(count: u32, max_rooms: u32) -> Result<(), EngineError> {
    if count > max_rooms {
        return Err(EngineError::CapacityExceeded {
            requested: u64::from(count),
            max: max_rooms,
        });
    }
    Ok(())
}

fn room<'a>(hotel: &'a HotelState, room_id: RoomId) -> Result<&'a Room, EngineError> {
    hotel.room(room_id).ok_or(EngineError::RoomNotFound(room_id))
}

pub(crate) fn check_reservable(hotel: &HotelState, room_id: RoomId) -> Result<(), EngineError> {
    if room(hotel, room_id)?.is_reserved {
        return Err(EngineError::AlreadyReserved(room_id));
    }
    Ok(())
}

pub(crate) fn check_occupied(hotel: &HotelState, room_id: RoomId) -> Result<(), EngineError> {
    if !room(hotel, room_id)?.is_reserved {
        return Err(EngineError::AlreadyVacant(room_id));
    }
    Ok(())
}

pub(crate) fn check_grow(hotel: &HotelState, added: u32, max_rooms: u32) -> Result<(), EngineError> {
    if added == 0 {
        return Err(EngineError::Validation("room count to add must be positive".into()));
    }
    let requested = u64::from(hotel.room_count()) + u64::from(added);
    if requested > u64::from(max_rooms) {
        return Err(EngineError::CapacityExceeded {
            requested,
            max: max_rooms,
        });
    }
    Ok(())
}

pub(crate) fn check_shrink(hotel: &HotelState, removed: u32) -> Result<(), EngineError> {
    if removed == 0 {
        return Err(EngineError::Validation("room count to remove must be positive".into()));
    }
    if removed >= hotel.room_count() {
        return Err(EngineError::OperationNotAllowed(format!(
            "cannot remove {removed} of {} rooms: a hotel keeps at least one room",
            hotel.room_count()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn hotel(rooms: u32) -> HotelState {
        let cred = Credential {
            salt: String::new(),
            hash: String::new(),
        };
        HotelState::new(Ulid::new(), "Rules".into(), cred, rooms)
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name("ab").is_err());
        assert_eq!(validate_name("  abc  ").unwrap(), "abc");
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        // Counted in characters, not bytes.
        assert!(validate_name("ééé").is_ok());
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"p".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }

    #[test]
    fn owner_rules() {
        assert!(validate_owner("   ").is_err());
        assert_eq!(validate_owner(" Marie Curie ").unwrap(), "Marie Curie");
        assert!(validate_owner(&"o".repeat(MAX_OWNER_LEN + 1)).is_err());
    }

    #[test]
    fn reserve_and_checkout_preconditions() {
        let mut h = hotel(3);
        assert!(matches!(check_reservable(&h, 0), Err(EngineError::RoomNotFound(0))));
        assert!(matches!(check_reservable(&h, 4), Err(EngineError::RoomNotFound(4))));
        assert!(check_reservable(&h, 3).is_ok());
        assert!(matches!(check_occupied(&h, 3), Err(EngineError::AlreadyVacant(3))));

        h.apply_room_update(RoomUpdate::reserve(3, "g".into(), 1));
        assert!(matches!(check_reservable(&h, 3), Err(EngineError::AlreadyReserved(3))));
        assert!(check_occupied(&h, 3).is_ok());
    }

    #[test]
    fn grow_limits() {
        let h = hotel(8);
        assert!(matches!(check_grow(&h, 0, 10), Err(EngineError::Validation(_))));
        assert!(check_grow(&h, 2, 10).is_ok());
        assert!(matches!(
            check_grow(&h, 3, 10),
            Err(EngineError::CapacityExceeded { requested: 11, max: 10 })
        ));
        assert!(check_grow(&h, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn shrink_limits() {
        let h = hotel(5);
        assert!(matches!(check_shrink(&h, 0), Err(EngineError::Validation(_))));
        assert!(check_shrink(&h, 4).is_ok());
        assert!(matches!(check_shrink(&h, 5), Err(EngineError::OperationNotAllowed(_))));
        assert!(matches!(check_shrink(&h, 6), Err(EngineError::OperationNotAllowed(_))));
    }

    #[test]
    fn initial_room_count_ceiling() {
        assert!(validate_room_count(0, 10).is_ok());
        assert!(validate_room_count(10, 10).is_ok());
        assert!(validate_room_count(11, 10).is_err());
    }
}
