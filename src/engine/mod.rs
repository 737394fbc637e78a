mod error;
mod hotels;
mod reservations;
mod rules;
mod store;

pub use error::{EngineError, ErrorKind};
pub use store::InventoryStore;

use std::io;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{
    broadcast, mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::limits::{MAX_HOTELS, WAL_CHANNEL_CAPACITY};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::projection::HotelView;
use crate::wal::Wal;

pub type SharedHotel = Arc<RwLock<HotelState>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// take the first append, drain whatever else is already queued, then one
/// flush+fsync answers the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    // Ordering matters: everything queued before a compaction
                    // lands in the old file first.
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            error!(path = %wal.path().display(), "WAL flush failed for {} events: {e}", batch.len());
        }
        respond_batch(batch, &result);

        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
    debug!("WAL writer stopped");
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    let result = match append_err {
        Some(e) => Err(e),
        None => wal.flush_sync(),
    };
    // Every waiter in a failed batch is told the write failed, so none of its
    // bytes may survive to be replayed later.
    if result.is_err()
        && let Err(e) = wal.rollback()
    {
        error!(path = %wal.path().display(), "WAL rollback failed: {e}");
    }
    result
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let batch = vec![(event, response)];
            let result = flush_batch(wal, &batch);
            respond_batch(batch, &result);
        }
    }
}

async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}

/// Exclusive hold on one hotel, plus a shared hold on the commit gate so
/// compaction cannot interleave with the mutation.
pub(crate) struct WriteLock {
    _gate: OwnedRwLockReadGuard<()>,
    guard: OwnedRwLockWriteGuard<HotelState>,
}

impl Deref for WriteLock {
    type Target = HotelState;

    fn deref(&self) -> &HotelState {
        &self.guard
    }
}

impl DerefMut for WriteLock {
    fn deref_mut(&mut self) -> &mut HotelState {
        &mut self.guard
    }
}

pub struct Engine {
    store: Arc<InventoryStore>,
    wal_tx: mpsc::Sender<WalCommand>,
    notify: Arc<NotifyHub>,
    config: EngineConfig,
    /// Commits hold this shared; compaction holds it exclusively.
    commit_gate: Arc<RwLock<()>>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, config: EngineConfig, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        if replay.truncated {
            warn!(
                path = %wal_path.display(),
                "discarded torn WAL tail after {} events",
                replay.events.len()
            );
            // New entries must not land behind the garbage.
            Wal::truncate(&wal_path, replay.valid_len)?;
        }
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: Arc::new(InventoryStore::new()),
            wal_tx,
            notify,
            config,
            commit_gate: Arc::new(RwLock::new(())),
        };
        for event in &replay.events {
            engine.replay_event(event);
        }
        metrics::gauge!(crate::observability::HOTELS_LOADED).set(engine.store.hotel_count() as f64);
        info!(
            hotels = engine.store.hotel_count(),
            events = replay.events.len(),
            "inventory restored"
        );
        Ok(engine)
    }

    // Replay runs before the engine is shared, so try_write never contends.
    fn replay_event(&self, event: &Event) {
        if let Event::HotelCreated { id, name, credential, room_count } = event {
            self.store
                .insert(HotelState::new(*id, name.clone(), credential.clone(), *room_count));
            return;
        }
        let hotel_id = event.hotel_id();
        let Ok(hotel) = self.store.load(&hotel_id) else {
            warn!(hotel = %hotel_id, "skipping WAL event for unknown hotel");
            return;
        };
        let Ok(mut guard) = hotel.try_write() else {
            warn!(hotel = %hotel_id, "skipping WAL event for locked hotel");
            return;
        };
        if let Event::HotelUpdated { name: Some(new_name), .. } = event {
            if let Err(e) = self.store.claim_name(new_name, hotel_id) {
                warn!(hotel = %hotel_id, "skipping replayed rename: {e}");
                return;
            }
            self.store.release_name(guard.name(), hotel_id);
        }
        if !guard.apply_event(event) {
            warn!(hotel = %hotel_id, ?event, "skipping WAL event that contradicts hotel state");
        }
    }

    pub fn hotel_count(&self) -> usize {
        self.store.hotel_count()
    }

    /// Committed events for one hotel, in commit order.
    pub fn subscribe(&self, hotel_id: Ulid) -> broadcast::Receiver<Event> {
        self.notify.subscribe(hotel_id)
    }

    async fn acquire_gate(&self, hotel_id: Option<Ulid>) -> Result<OwnedRwLockReadGuard<()>, EngineError> {
        tokio::time::timeout(self.config.lock_timeout, self.commit_gate.clone().read_owned())
            .await
            .map_err(|_| self.lock_timed_out(hotel_id.unwrap_or(Ulid::nil())))
    }

    fn lock_timed_out(&self, hotel_id: Ulid) -> EngineError {
        metrics::counter!(crate::observability::LOCK_TIMEOUTS_TOTAL).increment(1);
        warn!(hotel = %hotel_id, timeout_ms = self.config.lock_timeout.as_millis() as u64, "lock wait timed out");
        EngineError::Busy(hotel_id)
    }

    /// Take the hotel's write lock, bounded by the configured timeout.
    pub(crate) async fn lock_for_write(&self, hotel_id: Ulid) -> Result<WriteLock, EngineError> {
        let hotel = self.store.load(&hotel_id)?;
        let gate = self.acquire_gate(Some(hotel_id)).await?;
        let guard = tokio::time::timeout(self.config.lock_timeout, hotel.write_owned())
            .await
            .map_err(|_| self.lock_timed_out(hotel_id))?;
        Ok(WriteLock { _gate: gate, guard })
    }

    pub(crate) async fn lock_for_read(&self, hotel_id: Ulid) -> Result<OwnedRwLockReadGuard<HotelState>, EngineError> {
        let hotel = self.store.load(&hotel_id)?;
        tokio::time::timeout(self.config.lock_timeout, hotel.read_owned())
            .await
            .map_err(|_| self.lock_timed_out(hotel_id))
    }

    /// Append `event` to the WAL, apply it and publish it while `lock` is held.
    ///
    /// The work runs on its own task that owns the lock: once started it
    /// finishes even if the caller stops waiting, so the log and memory never
    /// disagree. Renames also move the name index in the same step.
    pub(crate) async fn commit(&self, mut lock: WriteLock, event: Event) -> Result<HotelView, EngineError> {
        let wal_tx = self.wal_tx.clone();
        let store = self.store.clone();
        let notify = self.notify.clone();
        let task = tokio::spawn(async move {
            let hotel_id = lock.id();
            let renamed = match &event {
                Event::HotelUpdated { name: Some(name), .. } => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = &renamed {
                store.claim_name(name, hotel_id)?;
            }
            if let Err(e) = wal_append(&wal_tx, &event).await {
                if let Some(name) = &renamed {
                    store.release_name(name, hotel_id);
                }
                return Err(e);
            }
            let old_name = lock.name().to_string();
            let applied = lock.apply_event(&event);
            debug_assert!(applied, "validated event must apply: {event:?}");
            if renamed.is_some() {
                store.release_name(&old_name, hotel_id);
            }
            debug_assert_eq!(lock.check_invariants(), Ok(()));
            notify.send(&event);
            Ok::<_, EngineError>(HotelView::from(&*lock))
        });
        task.await
            .map_err(|e| EngineError::WalError(format!("commit task failed: {e}")))?
    }

    /// Persist a new hotel and make it visible, on its own task like [`Engine::commit`].
    pub(crate) async fn commit_new(&self, state: HotelState, event: Event) -> Result<HotelView, EngineError> {
        let gate = self.acquire_gate(None).await?;
        let wal_tx = self.wal_tx.clone();
        let store = self.store.clone();
        let notify = self.notify.clone();
        let task = tokio::spawn(async move {
            let _gate = gate;
            let id = state.id();
            if !store.reserve_slot(MAX_HOTELS) {
                return Err(EngineError::LimitExceeded("too many hotels"));
            }
            if let Err(e) = store.claim_name(state.name(), id) {
                store.release_slot();
                return Err(e);
            }
            if let Err(e) = wal_append(&wal_tx, &event).await {
                store.release_name(state.name(), id);
                store.release_slot();
                return Err(e);
            }
            let view = HotelView::from(&state);
            store.insert(state);
            store.release_slot();
            metrics::gauge!(crate::observability::HOTELS_LOADED).set(store.hotel_count() as f64);
            notify.send(&event);
            Ok::<_, EngineError>(view)
        });
        task.await
            .map_err(|e| EngineError::WalError(format!("commit task failed: {e}")))?
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // With the gate held exclusively no commit is in flight, so every hotel
        // lock is free and state cannot move until the swap is queued.
        let timeout = self.config.lock_timeout;
        let _gate = tokio::time::timeout(timeout, self.commit_gate.write())
            .await
            .map_err(|_| self.lock_timed_out(Ulid::nil()))?;
        let guards = tokio::time::timeout(
            timeout,
            futures::future::join_all(self.store.all().into_iter().map(|hotel| hotel.read_owned())),
        )
        .await
        .map_err(|_| self.lock_timed_out(Ulid::nil()))?;
        let mut events = Vec::new();
        for guard in &guards {
            snapshot_events(guard, &mut events);
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!(hotels = guards.len(), events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Compact when the configured number of appends has accumulated.
    pub async fn maybe_compact(&self) -> Result<bool, EngineError> {
        let threshold = self.config.compact_threshold;
        if threshold == 0 || self.wal_appends_since_compact().await < threshold {
            return Ok(false);
        }
        self.compact_wal().await?;
        Ok(true)
    }
}

/// Minimal events that rebuild `hotel`: its creation plus one reservation per
/// occupied room.
fn snapshot_events(hotel: &HotelState, out: &mut Vec<Event>) {
    out.push(Event::HotelCreated {
        id: hotel.id(),
        name: hotel.name().to_string(),
        credential: hotel.credential().clone(),
        room_count: hotel.room_count(),
    });
    for &room_id in hotel.reserved_index() {
        if let Some(room) = hotel.room(room_id) {
            out.push(Event::RoomReserved {
                hotel_id: hotel.id(),
                room_id,
                owner: room.owner.clone(),
                at: room.reservation_date.unwrap_or_default(),
            });
        }
    }
}
