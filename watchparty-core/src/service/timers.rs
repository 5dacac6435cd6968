//! Deferred actions: cancelable, one-shot re-evaluations at a deadline.
//!
//! Each action is keyed by what it re-evaluates, so scheduling the same
//! action again replaces the earlier deadline. Entries carry a sequence
//! number that acts as a generation token: a popped or cancelled entry can
//! never fire again.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::{RoomCode, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeferredAction {
    /// The room's host grace period has run out.
    HostFailover(RoomCode),
    /// A dropped viewer's reconnect window has run out.
    MemberReconnect(RoomCode, SessionId),
}

impl DeferredAction {
    #[must_use]
    pub const fn room_code(&self) -> &RoomCode {
        match self {
            Self::HostFailover(code) | Self::MemberReconnect(code, _) => code,
        }
    }
}

type Slot = (DateTime<Utc>, u64);

#[derive(Debug, Default)]
pub struct DeferredActions {
    queue: BTreeMap<Slot, DeferredAction>,
    index: HashMap<DeferredAction, Slot>,
    next_seq: u64,
}

impl DeferredActions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` at `deadline`, replacing any pending instance.
    pub fn schedule(&mut self, action: DeferredAction, deadline: DateTime<Utc>) {
        self.cancel(&action);
        let slot = (deadline, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(slot, action.clone());
        self.index.insert(action, slot);
    }

    /// Returns true if the action was pending.
    pub fn cancel(&mut self, action: &DeferredAction) -> bool {
        match self.index.remove(action) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Drop every pending action for a room.
    pub fn cancel_room(&mut self, code: &RoomCode) -> usize {
        let doomed: Vec<DeferredAction> = self
            .index
            .keys()
            .filter(|action| action.room_code() == code)
            .cloned()
            .collect();
        for action in &doomed {
            self.cancel(action);
        }
        doomed.len()
    }

    #[must_use]
    pub fn is_scheduled(&self, action: &DeferredAction) -> bool {
        self.index.contains_key(action)
    }

    #[must_use]
    pub fn deadline_of(&self, action: &DeferredAction) -> Option<DateTime<Utc>> {
        self.index.get(action).map(|(deadline, _)| *deadline)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every action due at `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let action = entry.remove();
            self.index.remove(&action);
            due.push(action);
        }
        due
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
