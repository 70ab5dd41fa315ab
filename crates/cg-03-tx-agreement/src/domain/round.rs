//! # Agreement Round
//!
//! In-memory state of the current proposer turn.
//!
//! - As proposer: at most one open proposal per event, collecting at most
//!   one vote per guard.
//! - As voter: at most one endorsed candidate per event.
//!
//! Everything here is discarded when the turn changes; agreed transactions
//! live in the ledger.

use shared_types::{ChainTransaction, EventId, GuardIndex, GuardSignature, GuardVoteSignature, TxId};
use std::collections::{BTreeMap, HashMap};

/// A candidate this guard proposed in the current turn.
#[derive(Debug, Clone)]
pub struct Proposal {
    /// The candidate.
    pub tx: ChainTransaction,
    /// Its canonical JSON, the bytes every vote signs.
    pub tx_json: String,
    votes: BTreeMap<GuardIndex, GuardSignature>,
}

impl Proposal {
    fn new(tx: ChainTransaction, tx_json: String) -> Self {
        Self {
            tx,
            tx_json,
            votes: BTreeMap::new(),
        }
    }

    /// Number of distinct votes.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Votes in guard order.
    pub fn endorsements(&self) -> Vec<GuardVoteSignature> {
        self.votes
            .iter()
            .map(|(guard_index, signature)| GuardVoteSignature {
                guard_index: *guard_index,
                signature: *signature,
            })
            .collect()
    }
}

/// Outcome of offering a vote for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    /// First candidate seen for the event this turn.
    New,
    /// The candidate already endorsed; send the same vote again.
    Repeat,
    /// A different candidate was already endorsed for the event.
    Conflict,
}

/// State of one proposer turn.
#[derive(Debug, Default)]
pub struct AgreementRound {
    turn: Option<u64>,
    proposals: HashMap<TxId, Proposal>,
    proposed_events: HashMap<EventId, TxId>,
    endorsed_events: HashMap<EventId, TxId>,
}

impl AgreementRound {
    /// Empty round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current turn number, once set.
    pub fn turn(&self) -> Option<u64> {
        self.turn
    }

    /// Move to `turn`, discarding all state of an earlier one. Returns true
    /// if the turn changed.
    pub fn advance_turn(&mut self, turn: u64) -> bool {
        if self.turn == Some(turn) {
            return false;
        }
        self.turn = Some(turn);
        self.proposals.clear();
        self.proposed_events.clear();
        self.endorsed_events.clear();
        true
    }

    /// Open a proposal. Returns false if the event already has one.
    pub fn propose(&mut self, tx: ChainTransaction, tx_json: String) -> bool {
        if self.proposed_events.contains_key(&tx.event_id) {
            return false;
        }
        self.proposed_events
            .insert(tx.event_id.clone(), tx.tx_id.clone());
        self.proposals
            .insert(tx.tx_id.clone(), Proposal::new(tx, tx_json));
        true
    }

    /// Open proposal for `tx_id`.
    pub fn proposal(&self, tx_id: &TxId) -> Option<&Proposal> {
        self.proposals.get(tx_id)
    }

    /// All open proposals.
    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Record a verified vote. Returns the vote count, or `None` if there
    /// is no open proposal for `tx_id`. A guard's repeated vote is counted
    /// once.
    pub fn record_vote(
        &mut self,
        tx_id: &TxId,
        guard_index: GuardIndex,
        signature: GuardSignature,
    ) -> Option<usize> {
        let proposal = self.proposals.get_mut(tx_id)?;
        proposal.votes.entry(guard_index).or_insert(signature);
        Some(proposal.vote_count())
    }

    /// Close the proposal for `tx_id` if it holds at least `required`
    /// votes.
    pub fn take_if_quorum(&mut self, tx_id: &TxId, required: usize) -> Option<Proposal> {
        if self.proposals.get(tx_id)?.vote_count() < required {
            return None;
        }
        self.proposals.remove(tx_id)
    }

    /// Offer to endorse `tx_id` for `event_id`.
    pub fn endorse(&mut self, event_id: &EventId, tx_id: &TxId) -> VoteDecision {
        match self.endorsed_events.get(event_id) {
            Some(endorsed) if endorsed == tx_id => VoteDecision::Repeat,
            Some(_) => VoteDecision::Conflict,
            None => {
                self.endorsed_events.insert(event_id.clone(), tx_id.clone());
                VoteDecision::New
            }
        }
    }

    /// Forget everything about `event_id` once it is agreed.
    pub fn close_event(&mut self, event_id: &EventId) {
        if let Some(tx_id) = self.proposed_events.remove(event_id) {
            self.proposals.remove(&tx_id);
        }
        self.endorsed_events.remove(event_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ChainId, TransactionType};

    fn tx(id: &str, event: &str) -> ChainTransaction {
        ChainTransaction {
            tx_id: TxId::from(id),
            event_id: EventId::from(event),
            chain: ChainId::from("ergo"),
            tx_type: TransactionType::Payment,
            tx_bytes: vec![],
            input_boxes: vec![],
            data_boxes: vec![],
        }
    }

    fn sig(byte: u8) -> GuardSignature {
        GuardSignature::from_bytes([byte; 64])
    }

    #[test]
    fn test_one_proposal_per_event() {
        let mut round = AgreementRound::new();
        assert!(round.propose(tx("a", "e1"), "{}".into()));
        assert!(!round.propose(tx("b", "e1"), "{}".into()));
        assert!(round.propose(tx("c", "e2"), "{}".into()));
        assert_eq!(round.proposals().count(), 2);
    }

    #[test]
    fn test_votes_are_distinct_per_guard() {
        let mut round = AgreementRound::new();
        round.propose(tx("a", "e1"), "{}".into());
        assert_eq!(round.record_vote(&TxId::from("a"), 1, sig(1)), Some(1));
        assert_eq!(round.record_vote(&TxId::from("a"), 1, sig(2)), Some(1));
        assert_eq!(round.record_vote(&TxId::from("a"), 2, sig(2)), Some(2));
        assert_eq!(round.record_vote(&TxId::from("zz"), 2, sig(2)), None);

        assert!(round.take_if_quorum(&TxId::from("a"), 3).is_none());
        let proposal = round.take_if_quorum(&TxId::from("a"), 2).unwrap();
        assert_eq!(proposal.endorsements()[0].signature, sig(1));
        assert!(round.proposal(&TxId::from("a")).is_none());
    }

    #[test]
    fn test_endorse_once_per_event() {
        let mut round = AgreementRound::new();
        let event = EventId::from("e1");
        assert_eq!(round.endorse(&event, &TxId::from("a")), VoteDecision::New);
        assert_eq!(round.endorse(&event, &TxId::from("a")), VoteDecision::Repeat);
        assert_eq!(round.endorse(&event, &TxId::from("b")), VoteDecision::Conflict);
    }

    #[test]
    fn test_turn_change_clears_state() {
        let mut round = AgreementRound::new();
        assert!(round.advance_turn(4));
        round.propose(tx("a", "e1"), "{}".into());
        round.endorse(&EventId::from("e2"), &TxId::from("b"));

        assert!(!round.advance_turn(4));
        assert!(round.proposal(&TxId::from("a")).is_some());

        assert!(round.advance_turn(5));
        assert!(round.proposal(&TxId::from("a")).is_none());
        assert_eq!(
            round.endorse(&EventId::from("e2"), &TxId::from("c")),
            VoteDecision::New
        );
    }
}
