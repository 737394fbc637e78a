use async_trait::async_trait;
use tracing::info;
use ulid::Ulid;

use crate::auth::{self, IdentityResolver};
use crate::limits::MAX_HOTELS;
use crate::model::*;
use crate::observability::timed;
use crate::projection::{HotelView, RoomView};

use super::rules::{validate_name, validate_password, validate_room_count};
use super::{Engine, EngineError};

impl Engine {
    /// Register a hotel with `initial_room_count` vacant rooms. Returns its view
    /// and an access token.
    pub async fn create_hotel(
        &self,
        name: &str,
        password: &str,
        initial_room_count: u32,
    ) -> Result<(HotelView, String), EngineError> {
        timed("create_hotel", async {
            let name = validate_name(name)?;
            validate_password(password)?;
            validate_room_count(initial_room_count, self.config.max_rooms)?;
            if self.store.hotel_count() >= MAX_HOTELS {
                return Err(EngineError::LimitExceeded("too many hotels"));
            }
            if self.store.hotel_for_name(&name).is_some() {
                return Err(EngineError::NameTaken(name));
            }

            let id = Ulid::new();
            let credential = auth::hash_password(password);
            let token = auth::issue_token(&self.config.token_secret, id, &credential);
            let event = Event::HotelCreated {
                id,
                name: name.clone(),
                credential: credential.clone(),
                room_count: initial_room_count,
            };
            let state = HotelState::new(id, name, credential, initial_room_count);
            let view = self.commit_new(state, event).await?;
            info!(hotel = %id, name = %view.name, rooms = initial_room_count, "hotel created");
            Ok((view, token))
        })
        .await
    }

    /// Exchange a name and password for a fresh token.
    pub async fn login(&self, name: &str, password: &str) -> Result<(HotelView, String), EngineError> {
        timed("login", async {
            let id = self
                .store
                .hotel_for_name(name.trim())
                .ok_or(EngineError::Unauthorized)?;
            let guard = self.lock_for_read(id).await.map_err(|e| match e {
                EngineError::HotelNotFound(_) => EngineError::Unauthorized,
                other => other,
            })?;
            if !auth::verify_password(guard.credential(), password) {
                return Err(EngineError::Unauthorized);
            }
            let token = auth::issue_token(&self.config.token_secret, id, guard.credential());
            Ok((HotelView::from(&*guard), token))
        })
        .await
    }

    /// Resolve a token to the hotel it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<Ulid, EngineError> {
        let (id, mac) = auth::parse_token(token).ok_or(EngineError::Unauthorized)?;
        let guard = self.lock_for_read(id).await.map_err(|e| match e {
            EngineError::HotelNotFound(_) => EngineError::Unauthorized,
            other => other,
        })?;
        if auth::verify_token_mac(&self.config.token_secret, id, guard.credential(), mac) {
            Ok(id)
        } else {
            Err(EngineError::Unauthorized)
        }
    }

    pub async fn get_own_hotel(&self, identity: Ulid) -> Result<HotelView, EngineError> {
        timed("get_own_hotel", async {
            let guard = self.lock_for_read(identity).await?;
            Ok(HotelView::from(&*guard))
        })
        .await
    }

    pub async fn get_hotel_by_name(&self, name: &str) -> Result<HotelView, EngineError> {
        timed("get_hotel_by_name", async {
            let id = self
                .store
                .hotel_for_name(name.trim())
                .ok_or_else(|| EngineError::HotelNotFound(name.trim().to_string()))?;
            let guard = self.lock_for_read(id).await?;
            Ok(HotelView::from(&*guard))
        })
        .await
    }

    pub async fn get_room(&self, identity: Ulid, room_id: RoomId) -> Result<RoomView, EngineError> {
        timed("get_room", async {
            let guard = self.lock_for_read(identity).await?;
            guard
                .room(room_id)
                .map(RoomView::from)
                .ok_or(EngineError::RoomNotFound(room_id))
        })
        .await
    }

    /// Change the hotel's name and/or password. Room state is never written here.
    /// A password change invalidates previously issued tokens.
    pub async fn update_hotel_info(
        &self,
        identity: Ulid,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<HotelView, EngineError> {
        timed("update_hotel_info", async {
            if name.is_none() && password.is_none() {
                return Err(EngineError::Validation("nothing to update".into()));
            }
            let name = name.map(validate_name).transpose()?;
            if let Some(p) = password {
                validate_password(p)?;
            }

            let lock = self.lock_for_write(identity).await?;
            let name = name.filter(|n| n != lock.name());
            if let Some(n) = &name
                && self.store.hotel_for_name(n).is_some_and(|owner| owner != identity)
            {
                return Err(EngineError::NameTaken(n.clone()));
            }
            if name.is_none() && password.is_none() {
                return Ok(HotelView::from(&*lock));
            }

            let renamed = name.is_some();
            let event = Event::HotelUpdated {
                id: identity,
                name,
                credential: password.map(auth::hash_password),
            };
            let view = self.commit(lock, event).await?;
            info!(hotel = %identity, renamed, password_changed = password.is_some(), "hotel updated");
            Ok(view)
        })
        .await
    }

    /// Check the hotel's inventory invariants. `Ok(None)` means all hold.
    pub async fn verify(&self, identity: Ulid) -> Result<Option<String>, EngineError> {
        let guard = self.lock_for_read(identity).await?;
        Ok(guard.check_invariants().err())
    }
}

#[async_trait]
impl IdentityResolver for Engine {
    async fn resolve(&self, token: &str) -> Result<Ulid, EngineError> {
        self.authenticate(token).await
    }
}
