//! In-flight request table for one connection.
//!
//! Every request gets an invoke id and a single-assignment result slot. The
//! dispatch loop resolves slots by id as responses arrive, in whatever order
//! the device answers. Timeouts and connection loss complete the same slots, so
//! a caller is woken exactly once no matter which happens first.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use amslink_frame::Frame;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

type Slot = oneshot::Sender<Result<Frame>>;

struct Pending {
    issued_at: Instant,
    /// `None` when the timeout lies beyond what `Instant` can represent.
    deadline: Option<Instant>,
    timeout: Duration,
    slot: Slot,
}

struct Inner {
    next_id: u32,
    pending: HashMap<u32, Pending>,
    /// Set by `cancel_all`; later registrations fail immediately.
    closed: Option<String>,
}

/// Outcome of [`InvokeRegistry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The waiter received the result.
    Delivered,
    /// The entry existed but its waiter had already gone away.
    Abandoned,
    /// No pending entry: late, duplicate, or foreign response.
    Unknown,
}

/// Handle a caller awaits for its response.
#[derive(Debug)]
pub struct Waiter {
    invoke_id: u32,
    rx: oneshot::Receiver<Result<Frame>>,
}

impl Waiter {
    pub fn invoke_id(&self) -> u32 {
        self.invoke_id
    }

    /// Wait for the response, a timeout, or connection loss.
    pub async fn wait(self) -> Result<Frame> {
        match self.rx.await {
            Ok(result) => result,
            // Only happens if the registry itself is dropped with us inside.
            Err(_) => Err(ClientError::ConnectionLost(
                "invocation dropped without a result".to_string(),
            )),
        }
    }
}

/// Correlates invoke ids to waiting callers.
pub struct InvokeRegistry {
    inner: Mutex<Inner>,
}

impl Default for InvokeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvokeRegistry {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(first_id: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: first_id,
                pending: HashMap::new(),
                closed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an invoke id and a waiter that expires after `timeout`.
    ///
    /// Ids wrap around `u32`, skip 0 and skip ids that are still pending.
    pub fn register(&self, timeout: Duration) -> Result<(u32, Waiter)> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.closed {
            return Err(ClientError::ConnectionLost(reason.clone()));
        }

        let invoke_id = loop {
            let candidate = inner.next_id;
            inner.next_id = inner.next_id.wrapping_add(1);
            if candidate != 0 && !inner.pending.contains_key(&candidate) {
                break candidate;
            }
        };

        let (slot, rx) = oneshot::channel();
        let issued_at = Instant::now();
        inner.pending.insert(
            invoke_id,
            Pending {
                issued_at,
                deadline: issued_at.checked_add(timeout),
                timeout,
                slot,
            },
        );
        Ok((invoke_id, Waiter { invoke_id, rx }))
    }

    /// Complete the waiter for `invoke_id`, if there is one.
    ///
    /// Never blocks and never fails: unknown ids are logged and dropped.
    pub fn resolve(&self, invoke_id: u32, result: Result<Frame>) -> Resolution {
        let entry = self.lock().pending.remove(&invoke_id);
        let Some(entry) = entry else {
            warn!(invoke_id, "dropping response for unknown invoke id");
            return Resolution::Unknown;
        };

        let elapsed = entry.issued_at.elapsed();
        if entry.slot.send(result).is_err() {
            debug!(invoke_id, ?elapsed, "waiter gone before response arrived");
            return Resolution::Abandoned;
        }
        debug!(invoke_id, ?elapsed, "invocation resolved");
        Resolution::Delivered
    }

    /// Remove an entry without completing it (request never hit the wire).
    pub fn forget(&self, invoke_id: u32) -> bool {
        self.lock().pending.remove(&invoke_id).is_some()
    }

    /// Fail every pending waiter with `ConnectionLost(reason)` and refuse new
    /// registrations. Returns how many waiters were cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<(u32, Pending)> = {
            let mut inner = self.lock();
            if inner.closed.is_none() {
                inner.closed = Some(reason.to_string());
            }
            inner.pending.drain().collect()
        };

        let count = drained.len();
        for (invoke_id, entry) in drained {
            debug!(invoke_id, reason, "cancelling invocation");
            let _ = entry
                .slot
                .send(Err(ClientError::ConnectionLost(reason.to_string())));
        }
        count
    }

    /// Time out every entry whose deadline is at or before `now`.
    ///
    /// Returns the expired ids. A response arriving later for one of them is
    /// dropped by [`resolve`](Self::resolve).
    pub fn expire(&self, now: Instant) -> Vec<u32> {
        let expired: Vec<(u32, Pending)> = {
            let mut inner = self.lock();
            let ids: Vec<u32> = inner
                .pending
                .iter()
                .filter(|(_, entry)| entry.deadline.is_some_and(|deadline| deadline <= now))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let mut ids = Vec::with_capacity(expired.len());
        for (invoke_id, entry) in expired {
            warn!(invoke_id, timeout = ?entry.timeout, "invocation timed out");
            let _ = entry.slot.send(Err(ClientError::Timeout(entry.timeout)));
            ids.push(invoke_id);
        }
        ids
    }

    /// Number of in-flight invocations.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }
}
