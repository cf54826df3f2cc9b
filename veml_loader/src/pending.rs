//! Join on outstanding entity creations.
//!
//! The outstanding count is fixed when the requests are issued, so the last
//! completion and the waiter cannot race on a counter that is still growing.
//! A ticket settles exactly once: `complete` records the entity, dropping the
//! ticket unused records a failed creation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug)]
struct Shared {
    outstanding: AtomicUsize,
    completed: Mutex<HashSet<Uuid>>,
    notify: Notify,
}

#[derive(Debug, Clone)]
pub struct PendingCreations {
    shared: Arc<Shared>,
}

impl PendingCreations {
    /// One slot per id; returns the tracker and one ticket per id, in order.
    pub fn issue(ids: &[Uuid]) -> (Self, Vec<CreationTicket>) {
        let shared = Arc::new(Shared {
            outstanding: AtomicUsize::new(ids.len()),
            completed: Mutex::new(HashSet::with_capacity(ids.len())),
            notify: Notify::new(),
        });
        let tickets = ids
            .iter()
            .map(|&id| CreationTicket {
                id,
                shared: Arc::clone(&shared),
                settled: false,
            })
            .collect();
        (Self { shared }, tickets)
    }

    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    pub fn is_completed(&self, id: &Uuid) -> bool {
        self.shared.completed.lock().contains(id)
    }

    /// Copy of the ids completed so far; later completions do not show up in it.
    pub fn completed(&self) -> HashSet<Uuid> {
        self.shared.completed.lock().clone()
    }

    /// Resolves once every ticket has been completed or dropped.
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between still wakes us.
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Handed to the runtime with each creation request.
#[derive(Debug)]
pub struct CreationTicket {
    id: Uuid,
    shared: Arc<Shared>,
    settled: bool,
}

impl CreationTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn complete(mut self) {
        self.settle(true);
    }

    fn settle(&mut self, completed: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        if completed {
            self.shared.completed.lock().insert(self.id);
        }
        if self.shared.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.notify.notify_waiters();
        }
    }
}

impl Drop for CreationTicket {
    fn drop(&mut self) {
        self.settle(false);
    }
}
