use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::codec;
use crate::schema::{Message, MessageShape};
use crate::sync::lock_ignore_poison;
use crate::{log_debug, CorrelationId, Error, Result};

/// An outstanding call as seen by its caller.
///
/// `slot` receives exactly one outcome: the decoded response, a
/// `TypeMismatch`, or `Timeout`. It reports closed only if the registry
/// was closed.
pub(crate) struct PendingCall<R> {
    pub id: CorrelationId,
    pub deadline: Instant,
    pub slot: oneshot::Receiver<Result<R>>,
}

struct PendingEntry<R> {
    expected: MessageShape,
    slot: oneshot::Sender<Result<R>>,
}

/// Tracks one client's in-flight calls by correlation id.
///
/// Every transition out of the pending state (`resolve`, `expire`,
/// `cancel`, `close`) removes the entry under the lock, so for any id
/// exactly one of them wins and the loser sees nothing to do. The closed
/// flag lives under the same lock: once `close` returns, nothing new can
/// be registered.
pub(crate) struct CorrelationRegistry<R> {
    // ---
    table: Mutex<Table<R>>,
}

struct Table<R> {
    entries: HashMap<CorrelationId, PendingEntry<R>>,
    closed: bool,
}

impl<R: Message> CorrelationRegistry<R> {
    // ---
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Register a new pending call.
    ///
    /// # Errors
    ///
    /// - `Error::Closed` once [`close`](Self::close) has run
    /// - `Error::DuplicateCorrelationId` if `id` is already pending. The
    ///   existing entry is left untouched.
    pub fn register(
        &self,
        id: CorrelationId,
        expected: MessageShape,
        deadline: Instant,
    ) -> Result<PendingCall<R>> {
        // ---
        let mut table = lock_ignore_poison(&self.table);
        if table.closed {
            return Err(Error::Closed);
        }
        if table.entries.contains_key(&id) {
            return Err(Error::DuplicateCorrelationId(id));
        }

        let (tx, rx) = oneshot::channel();
        table.entries.insert(id, PendingEntry { expected, slot: tx });

        Ok(PendingCall {
            id,
            deadline,
            slot: rx,
        })
    }

    /// Fulfill the call waiting on `id` with a reply payload.
    ///
    /// Returns false, discarding the payload, when no such call is pending.
    pub fn resolve(&self, id: &CorrelationId, payload: &[u8]) -> bool {
        // ---
        let entry = self.take(id);
        let Some(entry) = entry else {
            return false;
        };

        // Decode outside the lock.
        let outcome = codec::decode::<R>(payload, entry.expected);
        if entry.slot.send(outcome).is_err() {
            log_debug!("reply for {id} arrived after its caller went away");
        }
        true
    }

    /// Fulfill the call waiting on `id` with `Error::Timeout`.
    pub fn expire(&self, id: &CorrelationId) -> bool {
        // ---
        match self.take(id) {
            Some(entry) => {
                let _ = entry.slot.send(Err(Error::Timeout));
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `id` without fulfilling it.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        self.take(id).is_some()
    }

    /// Refuse further registrations and drop every entry.
    ///
    /// Waiting callers observe a closed slot. Returns how many were pending.
    pub fn close(&self) -> usize {
        // ---
        let drained: Vec<_> = {
            let mut table = lock_ignore_poison(&self.table);
            table.closed = true;
            table.entries.drain().collect()
        };
        drained.len()
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.table).entries.len()
    }

    fn take(&self, id: &CorrelationId) -> Option<PendingEntry<R>> {
        lock_ignore_poison(&self.table).entries.remove(id)
    }
}
