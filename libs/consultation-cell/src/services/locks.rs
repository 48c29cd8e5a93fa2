// libs/consultation-cell/src/services/locks.rs
//
// The origin system checked for conflicts and then wrote the booking with
// nothing in between, so two concurrent requests for the same practitioner
// could both pass the check. Serializing the check-and-insert per
// practitioner closes that window for a single process; the store's
// single-row atomicity covers everything else.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct PractitionerLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl PractitionerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the booking lock for one practitioner. The guard must be held
    /// across the conflict check and the consultation insert.
    pub async fn acquire(&self, practitioner_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(practitioner_id).or_default())
        };
        slot.lock_owned().await
    }
}
