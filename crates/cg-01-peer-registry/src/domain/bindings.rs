//! # Transport Bindings
//!
//! Mutable mapping from guard index to the transport identity proven by a
//! handshake, plus outstanding challenges.
//!
//! A binding is created only after a nonce round trip: either the peer
//! echoed one of our recent registration nonces, or it echoed a
//! counter-challenge we issued to that exact transport.

use shared_types::{GuardIndex, TransportId};
use std::collections::{HashMap, VecDeque};

/// Outstanding challenges kept per guard.
pub const MAX_PENDING_CHALLENGES: usize = 4;

/// Own registration nonces still accepted in an `approve`.
pub const MAX_RECENT_REGISTRATIONS: usize = 4;

/// A counter-challenge issued to a transport claiming some guard index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    /// Transport the challenge was sent to.
    pub transport_id: TransportId,
    /// Nonce the transport must echo.
    pub nonce: String,
}

/// Effect of a bind call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// First binding for the guard.
    New,
    /// Same transport as before.
    Unchanged,
    /// Guard came back under a new transport; holds the old one.
    Rebound(TransportId),
}

/// Transport binding table.
#[derive(Debug, Default)]
pub struct TransportBindings {
    bound: HashMap<GuardIndex, TransportId>,
    pending: HashMap<GuardIndex, VecDeque<PendingChallenge>>,
    registrations: VecDeque<String>,
}

impl TransportBindings {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a registration nonce we broadcast.
    pub fn record_registration(&mut self, nonce: String) {
        if self.registrations.len() == MAX_RECENT_REGISTRATIONS {
            self.registrations.pop_front();
        }
        self.registrations.push_back(nonce);
    }

    /// True if `nonce` is one of our recent registration nonces.
    pub fn is_own_registration(&self, nonce: &str) -> bool {
        self.registrations.iter().any(|n| n == nonce)
    }

    /// Remember a counter-challenge sent to `transport_id` for `index`.
    /// The oldest challenge is dropped when the per-guard cap is reached.
    pub fn record_challenge(&mut self, index: GuardIndex, transport_id: TransportId, nonce: String) {
        let queue = self.pending.entry(index).or_default();
        if queue.len() == MAX_PENDING_CHALLENGES {
            queue.pop_front();
        }
        queue.push_back(PendingChallenge {
            transport_id,
            nonce,
        });
    }

    /// Consume a matching challenge. Returns false if none matches.
    pub fn take_challenge(&mut self, index: GuardIndex, transport_id: &TransportId, nonce: &str) -> bool {
        let Some(queue) = self.pending.get_mut(&index) else {
            return false;
        };
        let Some(position) = queue
            .iter()
            .position(|c| c.transport_id == *transport_id && c.nonce == nonce)
        else {
            return false;
        };
        queue.remove(position);
        if queue.is_empty() {
            self.pending.remove(&index);
        }
        true
    }

    /// Bind `index` to `transport_id`, replacing any previous binding.
    pub fn bind(&mut self, index: GuardIndex, transport_id: TransportId) -> BindOutcome {
        match self.bound.insert(index, transport_id.clone()) {
            None => BindOutcome::New,
            Some(old) if old == transport_id => BindOutcome::Unchanged,
            Some(old) => BindOutcome::Rebound(old),
        }
    }

    /// Transport bound to `index`.
    pub fn transport_of(&self, index: GuardIndex) -> Option<&TransportId> {
        self.bound.get(&index)
    }

    /// All bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&GuardIndex, &TransportId)> {
        self.bound.iter()
    }

    /// Outstanding challenges for `index`.
    pub fn pending_for(&self, index: GuardIndex) -> usize {
        self.pending.get(&index).map_or(0, VecDeque::len)
    }
}
