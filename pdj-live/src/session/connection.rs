//! Memoized connection to the generation service
//!
//! At most one connect attempt is in flight per logical connection: every
//! requester for "the session" gets the same `ConnectionSlot` and awaits the
//! same `OnceCell`. `invalidate()` (called by stop) forgets the slot; the next
//! requester gets a fresh slot with a new generation number. Service events and
//! late connect results carry the generation they belong to, so anything from
//! a superseded slot can be recognized and ignored.

use crate::error::Result;
use crate::session::service::MusicSession;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

/// Handle to one logical connection (in flight or established)
#[derive(Clone)]
pub struct ConnectionSlot {
    pub generation: u64,
    pub session_id: Uuid,
    cell: Arc<OnceCell<Arc<dyn MusicSession>>>,
}

impl ConnectionSlot {
    /// Session for this slot, connecting with `connect` if nobody has yet
    ///
    /// Concurrent callers share the pending attempt. A failed attempt leaves
    /// the slot empty.
    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> Result<Arc<dyn MusicSession>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn MusicSession>>>,
    {
        self.cell.get_or_try_init(connect).await.map(Arc::clone)
    }

    /// Session, if this slot has connected
    pub fn session(&self) -> Option<Arc<dyn MusicSession>> {
        self.cell.get().cloned()
    }
}

struct CacheState {
    current: Option<ConnectionSlot>,
    next_generation: u64,
}

/// Single connection cache owned by the controller
pub struct ConnectionCache {
    state: Mutex<CacheState>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                current: None,
                next_generation: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current slot, creating one if there is none
    pub fn slot(&self) -> ConnectionSlot {
        let mut state = self.lock();
        if let Some(slot) = &state.current {
            return slot.clone();
        }
        let slot = ConnectionSlot {
            generation: state.next_generation,
            session_id: Uuid::new_v4(),
            cell: Arc::new(OnceCell::new()),
        };
        state.next_generation += 1;
        debug!(
            "New connection slot: generation {} (session {})",
            slot.generation, slot.session_id
        );
        state.current = Some(slot.clone());
        slot
    }

    /// Current slot without creating one
    pub fn current(&self) -> Option<ConnectionSlot> {
        self.lock().current.clone()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Forget the current slot; returns its generation
    pub fn invalidate(&self) -> Option<u64> {
        let slot = self.lock().current.take()?;
        debug!("Connection slot {} invalidated", slot.generation);
        Some(slot.generation)
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}
