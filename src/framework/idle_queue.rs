//! Bounded queue of idle players.
//!
//! Players push [`IdleTicket`]s; dispatchers pop them. Each queued ticket holds
//! one slot permit, released when the ticket is popped or withdrawn. Popping
//! never holds a lock across an await point, so a dispatcher waiting for a
//! player cannot block a fail-fast dispatcher behind it.

use crate::framework::player::{IdleTicket, PlayerId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

struct Queued {
    ticket: IdleTicket,
    _slot: OwnedSemaphorePermit,
}

pub(crate) struct IdleQueue {
    slots: Arc<Semaphore>,
    tickets: Mutex<VecDeque<Queued>>,
    ready: Notify,
    capacity: usize,
}

impl IdleQueue {
    /// `capacity` is clamped to at least one slot.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            tickets: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Queued>> {
        self.tickets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for a free slot, then enqueue `ticket`.
    pub(crate) async fn offer(&self, ticket: IdleTicket) {
        // The semaphore is never closed.
        let Ok(slot) = self.slots.clone().acquire_owned().await else {
            return;
        };
        self.lock().push_back(Queued { ticket, _slot: slot });
        self.ready.notify_one();
    }

    /// Remove `player`'s ticket and release its slot. Returns `false` if the
    /// player had no ticket queued.
    pub(crate) fn withdraw(&self, player: PlayerId) -> bool {
        let mut tickets = self.lock();
        let before = tickets.len();
        tickets.retain(|q| q.ticket.player_id != player);
        tickets.len() != before
    }

    /// Pop the oldest ticket whose player is still waiting, without blocking.
    ///
    /// Tickets of players that were cancelled while queued are dropped.
    pub(crate) fn try_pop(&self) -> Option<IdleTicket> {
        let mut tickets = self.lock();
        while let Some(queued) = tickets.pop_front() {
            if queued.ticket.is_live() {
                return Some(queued.ticket);
            }
        }
        None
    }

    /// Wait until a live ticket is available.
    pub(crate) async fn pop(&self) -> IdleTicket {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(ticket) = self.try_pop() {
                return ticket;
            }
            notified.await;
        }
    }

    /// Players queued and still waiting for an assignment.
    pub(crate) fn len(&self) -> usize {
        self.lock().iter().filter(|q| q.ticket.is_live()).count()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
