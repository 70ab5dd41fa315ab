//! # Agreement Coordinator
//!
//! Per-event consensus on the exact transaction to sign.
//!
//! ```text
//! proposer (turn holder)                         guard
//!   build candidate ── request{txJson} ───────▶  re-derive + validate
//!                   ◀────── response{sig(txJson)}
//!   quorum of votes ── approval{txJson, sigs} ─▶  verify quorum, persist
//! ```
//!
//! Per event: `no-candidate → proposed → approved`. The first quorum wins:
//! once an agreed transaction is persisted the event leaves its pending
//! status and every later candidate for it is ignored.
//!
//! Round state sits behind a `parking_lot` mutex that is never held across
//! an `.await`.

use crate::domain::{AgreementConfig, AgreementError, AgreementRound, Proposal, VoteDecision};
use cg_01_peer_registry::{GuardDirectory, RegistryError};
use parking_lot::Mutex;
use shared_bus::{Dialer, AGREEMENT_CHANNEL};
use shared_types::{
    AgreementApproval, AgreementRequest, AgreementVote, ChainAdapter, ChainAdapters, ChainId,
    ChainTransaction, EventId, EventRecord, EventStatus, GuardIndex, GuardMessage, LedgerError,
    LedgerStore, PersistedTransaction, Signed, TimeSource, TransactionType, TransportId, TxId,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Dependencies for [`AgreementService`].
pub struct AgreementDependencies {
    /// Guard identities and this guard's signing key.
    pub directory: Arc<dyn GuardDirectory>,
    /// Transport.
    pub dialer: Arc<dyn Dialer>,
    /// Chain adapters by chain.
    pub chains: ChainAdapters,
    /// Event and transaction storage.
    pub ledger: Arc<dyn LedgerStore>,
    /// Clock driving the proposer turn.
    pub time: Arc<dyn TimeSource>,
    /// Configuration.
    pub config: AgreementConfig,
}

/// Agreement coordinator.
pub struct AgreementService {
    directory: Arc<dyn GuardDirectory>,
    dialer: Arc<dyn Dialer>,
    chains: ChainAdapters,
    ledger: Arc<dyn LedgerStore>,
    time: Arc<dyn TimeSource>,
    config: AgreementConfig,
    round: Mutex<AgreementRound>,
    // Approvals this guard announced, kept for re-broadcast until the event
    // leaves its in-progress status. Survives turn changes.
    announced: Mutex<HashMap<EventId, (TransactionType, AgreementApproval)>>,
    // Serializes the check-then-insert of agreed transactions.
    persist: tokio::sync::Mutex<()>,
}

impl AgreementService {
    /// Create a new coordinator.
    pub fn new(deps: AgreementDependencies) -> Self {
        Self {
            directory: deps.directory,
            dialer: deps.dialer,
            chains: deps.chains,
            ledger: deps.ledger,
            time: deps.time,
            config: deps.config,
            round: Mutex::new(AgreementRound::new()),
            announced: Mutex::new(HashMap::new()),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// Current turn number.
    pub fn current_turn(&self) -> u64 {
        self.time.now_millis() / self.config.turn_duration_ms()
    }

    /// Guard allowed to propose in the current turn.
    pub fn guard_turn(&self) -> GuardIndex {
        let guards = self.directory.guard_count().max(1) as u64;
        // Fits: the remainder is below the guard count.
        (self.current_turn() % guards) as GuardIndex
    }

    /// True if this guard holds the current turn.
    pub fn is_my_turn(&self) -> bool {
        self.guard_turn() == self.directory.own_index()
    }

    /// Discard round state if the turn changed. Called on every tick and
    /// before handling any agreement message.
    pub fn on_tick(&self) {
        let turn = self.current_turn();
        if self.round.lock().advance_turn(turn) {
            debug!(turn, proposer = self.guard_turn(), "[cg-03] new proposer turn");
        }
    }

    /// Propose candidates for every pending event while holding the turn.
    /// Failures are isolated per event. Returns the number proposed.
    pub async fn process_pending_events(&self) -> Result<usize, AgreementError> {
        self.on_tick();
        if !self.is_my_turn() {
            return Ok(0);
        }
        let events = self
            .ledger
            .events_by_status(&[EventStatus::PendingPayment, EventStatus::PendingReward])
            .await?;

        let mut proposed = 0;
        for record in events {
            let Some(tx_type) = record.status.pending_tx_type() else {
                continue;
            };
            match self.propose_for_event(&record, tx_type).await {
                Ok(true) => proposed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(event_id = %record.event.id, error = %e, "[cg-03] failed to propose candidate");
                }
            }
        }
        Ok(proposed)
    }

    async fn propose_for_event(
        &self,
        record: &EventRecord,
        tx_type: TransactionType,
    ) -> Result<bool, AgreementError> {
        let adapter = self.adapter_for(&record.event.to_chain, tx_type)?;
        let tx = adapter
            .build_candidate_transaction(&record.event, tx_type)
            .await?;
        self.propose(tx).await
    }

    /// Open a proposal for `tx`, count this guard's own vote and broadcast
    /// the request. Returns false if the event already has a proposal in
    /// this turn.
    pub async fn propose(&self, tx: ChainTransaction) -> Result<bool, AgreementError> {
        self.on_tick();
        let own = self.directory.own_index();
        let turn_holder = self.guard_turn();
        if turn_holder != own {
            return Err(AgreementError::NotMyTurn { own, turn_holder });
        }

        let tx_json = tx.to_json()?;
        let tx_id = tx.tx_id.clone();
        let event_id = tx.event_id.clone();
        let own_vote = self.directory.sign_bytes(tx_json.as_bytes());
        {
            let mut round = self.round.lock();
            if !round.propose(tx, tx_json.clone()) {
                return Ok(false);
            }
            round.record_vote(&tx_id, own, own_vote);
        }
        info!(tx_id = %tx_id, event_id = %event_id, "[cg-03] proposing candidate");

        let request = GuardMessage::Request(self.directory.seal(AgreementRequest { tx_json })?);
        self.dialer
            .send_message(AGREEMENT_CHANNEL, request.to_json()?, None)
            .await?;
        self.finalize_if_quorum(&tx_id).await?;
        Ok(true)
    }

    /// Re-broadcast every open proposal and every announced approval whose
    /// event is still in progress. Returns the number of messages re-sent.
    pub async fn resend_requests(&self) -> Result<usize, AgreementError> {
        self.on_tick();
        let pending: Vec<String> = self
            .round
            .lock()
            .proposals()
            .map(|p| p.tx_json.clone())
            .collect();

        for tx_json in &pending {
            let request = GuardMessage::Request(self.directory.seal(AgreementRequest {
                tx_json: tx_json.clone(),
            })?);
            self.dialer
                .send_message(AGREEMENT_CHANNEL, request.to_json()?, None)
                .await?;
        }
        if !pending.is_empty() {
            debug!(count = pending.len(), "[cg-03] re-broadcast open proposals");
        }
        Ok(pending.len() + self.resend_approvals().await?)
    }

    async fn resend_approvals(&self) -> Result<usize, AgreementError> {
        let announced: Vec<(EventId, TransactionType, AgreementApproval)> = self
            .announced
            .lock()
            .iter()
            .map(|(event_id, (tx_type, approval))| (event_id.clone(), *tx_type, approval.clone()))
            .collect();

        let mut resent = 0;
        for (event_id, tx_type, approval) in announced {
            let in_progress = self
                .ledger
                .event_by_id(&event_id)
                .await?
                .is_some_and(|record| record.status == tx_type.in_progress_event_status());
            if !in_progress {
                let mut announced = self.announced.lock();
                if announced
                    .get(&event_id)
                    .is_some_and(|(_, current)| current.tx_id == approval.tx_id)
                {
                    announced.remove(&event_id);
                }
                continue;
            }
            let message = GuardMessage::Approval(approval);
            self.dialer
                .send_message(AGREEMENT_CHANNEL, message.to_json()?, None)
                .await?;
            resent += 1;
        }
        if resent > 0 {
            debug!(count = resent, "[cg-03] re-broadcast approvals");
        }
        Ok(resent)
    }

    /// Validate a proposer's candidate and vote for it.
    ///
    /// The candidate must come from the turn holder, decode on its chain,
    /// belong to an event waiting for a transaction of its type and match
    /// that event. A guard endorses one candidate per event per turn; a
    /// re-delivered request gets the same vote again, a different candidate
    /// is ignored.
    pub async fn handle_request(
        &self,
        sender: &TransportId,
        message: &Signed<AgreementRequest>,
    ) -> Result<(), AgreementError> {
        let proposer = self.directory.authenticate(sender, message)?;
        self.on_tick();
        let turn_holder = self.guard_turn();
        if proposer != turn_holder {
            return Err(AgreementError::NotProposerTurn {
                sender: proposer,
                turn_holder,
            });
        }

        let tx_json = &message.payload.tx_json;
        let tx = self.validate_candidate(tx_json).await?;

        let decision = self.round.lock().endorse(&tx.event_id, &tx.tx_id);
        if decision == VoteDecision::Conflict {
            debug!(tx_id = %tx.tx_id, event_id = %tx.event_id, "[cg-03] already endorsed another candidate");
            return Ok(());
        }

        let vote = GuardMessage::Response(AgreementVote {
            tx_id: tx.tx_id.clone(),
            guard_index: self.directory.own_index(),
            signature: self.directory.sign_bytes(tx_json.as_bytes()),
        });
        self.dialer
            .send_message(AGREEMENT_CHANNEL, vote.to_json()?, Some(sender))
            .await?;
        debug!(tx_id = %tx.tx_id, proposer, "[cg-03] voted for candidate");
        Ok(())
    }

    /// Count a vote for one of this guard's proposals.
    pub async fn handle_response(
        &self,
        sender: &TransportId,
        vote: &AgreementVote,
    ) -> Result<(), AgreementError> {
        let index = vote.guard_index;
        let bound = self
            .directory
            .transport_of(index)
            .ok_or(RegistryError::Unbound(index))?;
        if bound != *sender {
            return Err(RegistryError::SenderMismatch {
                index,
                expected: bound,
                actual: sender.clone(),
            }
            .into());
        }

        let tx_json = self
            .round
            .lock()
            .proposal(&vote.tx_id)
            .map(|p| p.tx_json.clone())
            .ok_or_else(|| AgreementError::UnknownProposal(vote.tx_id.clone()))?;
        self.directory
            .verify_detached(index, tx_json.as_bytes(), &vote.signature)?;

        let count = self
            .round
            .lock()
            .record_vote(&vote.tx_id, index, vote.signature)
            .ok_or_else(|| AgreementError::UnknownProposal(vote.tx_id.clone()))?;
        debug!(tx_id = %vote.tx_id, guard_index = index, votes = count, "[cg-03] vote recorded");

        self.finalize_if_quorum(&vote.tx_id).await?;
        Ok(())
    }

    /// Persist an agreed transaction announced by its proposer after
    /// checking every endorsement.
    pub async fn handle_approval(
        &self,
        sender: &TransportId,
        approval: &AgreementApproval,
    ) -> Result<(), AgreementError> {
        if !self
            .directory
            .bound_peers()
            .iter()
            .any(|(_, transport)| transport == sender)
        {
            return Err(AgreementError::Registry(RegistryError::UnknownTransport(
                sender.clone(),
            )));
        }

        let tx = ChainTransaction::from_json(&approval.tx_json)?;
        let adapter = self.chains.get(&tx.chain)?;
        let tx = adapter.deserialize(approval.tx_json.as_bytes())?;
        if tx.tx_id != approval.tx_id {
            return Err(AgreementError::TxIdMismatch {
                claimed: approval.tx_id.clone(),
                actual: tx.tx_id,
            });
        }

        let required = self.config.required_sign;
        let valid: BTreeSet<GuardIndex> = approval
            .guards_signatures
            .iter()
            .filter(|endorsement| {
                self.directory
                    .verify_detached(
                        endorsement.guard_index,
                        approval.tx_json.as_bytes(),
                        &endorsement.signature,
                    )
                    .is_ok()
            })
            .map(|endorsement| endorsement.guard_index)
            .collect();
        if valid.len() < required {
            return Err(AgreementError::InsufficientEndorsements {
                valid: valid.len(),
                required,
            });
        }

        self.record_agreement(&tx).await?;
        Ok(())
    }

    /// Persist `tx` as the event's agreed transaction and move the event to
    /// its in-progress status. Returns false if the event already has one.
    pub async fn record_agreement(&self, tx: &ChainTransaction) -> Result<bool, AgreementError> {
        let _persist = self.persist.lock().await;
        let record = self
            .ledger
            .event_by_id(&tx.event_id)
            .await?
            .ok_or_else(|| AgreementError::UnknownEvent(tx.event_id.clone()))?;
        if record.status != tx.tx_type.pending_event_status() {
            debug!(tx_id = %tx.tx_id, event_id = %tx.event_id, status = ?record.status, "[cg-03] event already agreed");
            return Ok(false);
        }

        let persisted =
            PersistedTransaction::new_approved(tx, self.config.required_sign, self.time.now_millis())?;
        match self.ledger.insert_transaction(persisted).await {
            Ok(()) => {}
            Err(LedgerError::Duplicate(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        self.ledger
            .set_event_status(&tx.event_id, tx.tx_type.in_progress_event_status())
            .await?;
        self.round.lock().close_event(&tx.event_id);

        info!(tx_id = %tx.tx_id, event_id = %tx.event_id, tx_type = ?tx.tx_type, "[cg-03] transaction agreed");
        Ok(true)
    }

    /// Votes collected so far for an open proposal.
    pub fn vote_count(&self, tx_id: &TxId) -> Option<usize> {
        self.round.lock().proposal(tx_id).map(Proposal::vote_count)
    }

    async fn finalize_if_quorum(&self, tx_id: &TxId) -> Result<(), AgreementError> {
        let Some(proposal) = self
            .round
            .lock()
            .take_if_quorum(tx_id, self.config.required_sign)
        else {
            return Ok(());
        };

        if !self.record_agreement(&proposal.tx).await? {
            return Ok(());
        }
        let approval = AgreementApproval {
            tx_id: proposal.tx.tx_id.clone(),
            tx_json: proposal.tx_json.clone(),
            guards_signatures: proposal.endorsements(),
        };
        self.announced.lock().insert(
            proposal.tx.event_id.clone(),
            (proposal.tx.tx_type, approval.clone()),
        );
        let approval = GuardMessage::Approval(approval);
        self.dialer
            .send_message(AGREEMENT_CHANNEL, approval.to_json()?, None)
            .await?;
        Ok(())
    }

    async fn validate_candidate(&self, tx_json: &str) -> Result<ChainTransaction, AgreementError> {
        let claimed = ChainTransaction::from_json(tx_json)?;
        let adapter = self.chains.get(&claimed.chain)?;
        let tx = adapter.deserialize(tx_json.as_bytes())?;

        let record = self
            .ledger
            .event_by_id(&tx.event_id)
            .await?
            .ok_or_else(|| AgreementError::UnknownEvent(tx.event_id.clone()))?;
        if record.status != tx.tx_type.pending_event_status() {
            return Err(AgreementError::EventNotPending {
                event: tx.event_id.clone(),
                status: record.status,
            });
        }
        let expected = self.adapter_for(&record.event.to_chain, tx.tx_type)?;
        if expected.chain() != &tx.chain {
            return Err(AgreementError::WrongChain {
                expected: expected.chain().clone(),
                actual: tx.chain.clone(),
            });
        }
        if !adapter
            .verify_candidate_against_event(&tx, &record.event)
            .await?
        {
            return Err(AgreementError::InvalidCandidate(tx.tx_id));
        }
        Ok(tx)
    }

    fn adapter_for(
        &self,
        target_chain: &ChainId,
        tx_type: TransactionType,
    ) -> Result<Arc<dyn ChainAdapter>, AgreementError> {
        let chain = match tx_type {
            TransactionType::Payment => target_chain,
            TransactionType::Reward => &self.config.reward_chain,
        };
        Ok(self.chains.get(chain)?)
    }
}
