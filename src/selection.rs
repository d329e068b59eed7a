//! Generation tokens for discarding results of superseded selections.
//!
//! Every new selection calls [`SelectionGuard::begin`]; a load that finishes after a
//! newer selection started hands its result to [`SelectionGuard::accept`] and gets
//! `None` back.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct SelectionGuard {
    current: AtomicU64,
}

impl SelectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new selection; every earlier ticket becomes stale.
    pub fn begin(&self) -> Ticket {
        Ticket(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current.load(Ordering::Acquire) == ticket.0
    }

    pub fn accept<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            log::debug!("dropping result of stale selection #{}", ticket.0);
            None
        }
    }
}
