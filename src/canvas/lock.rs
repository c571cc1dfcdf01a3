//! Lock manager: exclusive per-element edit locks with renewable leases.
//!
//! DESIGN
//! ======
//! The lock owner lives on the element itself (`locked` / `locked_by`); this
//! module keeps the matching lease table. A lease exists exactly when its
//! element is locked. Leases are renewed by any activity of the holder and
//! reclaimed by [`LockManager::expire`] once they run out, so a crashed
//! session cannot keep an element locked forever.

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::element::{ElementId, UserId};
use super::error::CanvasError;
use super::event::{CanvasEvent, UnlockReason};
use super::store::ElementStore;

#[derive(Debug, Clone)]
struct Lease {
    holder: UserId,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct LockManager {
    ttl: Duration,
    leases: HashMap<ElementId, Lease>,
}

impl LockManager {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, leases: HashMap::new() }
    }

    #[cfg(test)]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of live leases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// When the lease on `element_id` runs out, if it is locked.
    #[cfg(test)]
    #[must_use]
    pub fn expires_at(&self, element_id: &ElementId) -> Option<Instant> {
        self.leases.get(element_id).map(|lease| lease.expires_at)
    }

    /// Acquire the lock on `element_id` for `user`.
    ///
    /// Unlocked: lock it and emit `ELEMENT_LOCKED`. Already held by `user`:
    /// toggle it off and emit `ELEMENT_UNLOCKED`. Held by someone else: fail.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`, or `LockConflict` with no state change.
    pub fn acquire(
        &mut self,
        store: &mut ElementStore,
        element_id: &ElementId,
        user: &str,
        now: Instant,
    ) -> Result<CanvasEvent, CanvasError> {
        let element = store
            .get_mut(element_id)
            .ok_or(CanvasError::ElementNotFound(*element_id))?;

        if !element.is_locked() {
            element.set_lock(Some(user.to_owned()));
            self.leases
                .insert(*element_id, Lease { holder: user.to_owned(), expires_at: now + self.ttl });
            self.renew(user, now);
            return Ok(CanvasEvent::ElementLocked { element_id: *element_id, user_id: user.to_owned() });
        }
        if let Some(holder) = element.locked_by().filter(|holder| *holder != user) {
            return Err(CanvasError::LockConflict { element_id: *element_id, holder: holder.to_owned() });
        }

        element.set_lock(None);
        self.leases.remove(element_id);
        Ok(CanvasEvent::ElementUnlocked {
            element_id: *element_id,
            user_id: user.to_owned(),
            reason: UnlockReason::Released,
        })
    }

    /// Release the lock on `element_id` if `user` holds it.
    ///
    /// Returns `None` (no state change) when the element is unlocked or held
    /// by someone else.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if the element does not exist.
    pub fn release(
        &mut self,
        store: &mut ElementStore,
        element_id: &ElementId,
        user: &str,
    ) -> Result<Option<CanvasEvent>, CanvasError> {
        let element = store
            .get_mut(element_id)
            .ok_or(CanvasError::ElementNotFound(*element_id))?;

        if element.locked_by() != Some(user) {
            return Ok(None);
        }
        element.set_lock(None);
        self.leases.remove(element_id);
        Ok(Some(CanvasEvent::ElementUnlocked {
            element_id: *element_id,
            user_id: user.to_owned(),
            reason: UnlockReason::Released,
        }))
    }

    /// Push out every lease held by `user`.
    pub fn renew(&mut self, user: &str, now: Instant) {
        let expires_at = now + self.ttl;
        for lease in self.leases.values_mut() {
            if lease.holder == user {
                lease.expires_at = expires_at;
            }
        }
    }

    /// Release every lock held by `user`.
    pub fn release_all(&mut self, store: &mut ElementStore, user: &str, reason: UnlockReason) -> Vec<CanvasEvent> {
        let held: Vec<ElementId> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.holder == user)
            .map(|(id, _)| *id)
            .collect();
        self.unlock_all(store, held, reason)
    }

    /// Release every lock whose lease ran out at or before `now`.
    pub fn expire(&mut self, store: &mut ElementStore, now: Instant) -> Vec<CanvasEvent> {
        let expired: Vec<ElementId> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        self.unlock_all(store, expired, UnlockReason::Expired)
    }

    /// Drop the lease of an element that no longer exists.
    pub fn forget(&mut self, element_id: &ElementId) {
        self.leases.remove(element_id);
    }

    fn unlock_all(&mut self, store: &mut ElementStore, ids: Vec<ElementId>, reason: UnlockReason) -> Vec<CanvasEvent> {
        let mut events = Vec::with_capacity(ids.len());
        for element_id in ids {
            let Some(lease) = self.leases.remove(&element_id) else {
                continue;
            };
            if let Some(element) = store.get_mut(&element_id) {
                element.set_lock(None);
            }
            events.push(CanvasEvent::ElementUnlocked { element_id, user_id: lease.holder, reason });
        }
        events
    }
}
