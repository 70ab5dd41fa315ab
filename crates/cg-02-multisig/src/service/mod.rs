//! # Signing Session Manager
//!
//! Coordinates `t`-of-`n` threshold signing. Each guard holds one long-term
//! key share; every round partitions the guards into real signers,
//! simulated signers and guards that have not contributed.
//!
//! ## Flow
//!
//! ```text
//! sign(tx) ──▶ own commitment ──▶ commitment to bound peers
//!                                        │
//! peer commitments ≥ required - 1 ───────┤
//!                                        ▼
//!                           generate_sign (extend candidate)
//!                                        │
//!                     sign message to peers outside the simulated set
//!                     (or to everyone once the quorum is reached)
//! ```
//!
//! ## Concurrency
//!
//! Every session-map mutation (create-if-absent, append commitment, adopt a
//! candidate, resolve) happens under one `tokio::sync::Mutex`. The guard is
//! never held across a prover call or a network send: prover work runs on
//! the blocking pool under a timeout, and outbound messages are collected
//! and sent after the guard is dropped.

use crate::domain::{
    CompletedSession, HintsBag, MultiSigConfig, SessionView, SignatureState, SigningError,
    SigningSession, SigningTarget,
};
use crate::ports::{MultiSigProver, SignRequest};
use cg_01_peer_registry::{GuardDirectory, RegistryError};
use shared_bus::{Dialer, MULTISIG_CHANNEL};
use shared_crypto::GuardPublicKey;
use shared_types::{
    ChainTransaction, Commitment, CommitmentPayload, GuardIndex, GuardMessage, SignPayload,
    Signed, SignedTransaction, TimeSource, TransportId, TxId,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};


#[derive(Default)]
struct SessionMap {
    active: HashMap<TxId, SigningSession>,
    completed: HashMap<TxId, CompletedSession>,
}

/// Handle to the eventual result of a signing round.
#[derive(Debug)]
pub struct SigningTicket {
    tx_id: TxId,
    receiver: oneshot::Receiver<Result<SignedTransaction, SigningError>>,
}

impl SigningTicket {
    /// Transaction being signed.
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Wait for resolution, timeout or abandonment.
    pub async fn wait(self) -> Result<SignedTransaction, SigningError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(SigningError::Abandoned(self.tx_id)),
        }
    }
}

/// Inputs for one `generate_sign` prover call, captured under the lock.
struct SignPlan {
    target: SigningTarget,
    request: SignRequest,
    commitments: Vec<(GuardPublicKey, Commitment)>,
    base: Option<SignatureState>,
}

/// Threshold signing session manager.
pub struct MultiSigService {
    directory: Arc<dyn GuardDirectory>,
    dialer: Arc<dyn Dialer>,
    prover: Arc<dyn MultiSigProver>,
    time: Arc<dyn TimeSource>,
    config: MultiSigConfig,
    own_index: GuardIndex,
    own_key: GuardPublicKey,
    sessions: Mutex<SessionMap>,
}

impl MultiSigService {
    /// Create the manager for the guard described by `directory`.
    pub fn new(
        directory: Arc<dyn GuardDirectory>,
        dialer: Arc<dyn Dialer>,
        prover: Arc<dyn MultiSigProver>,
        time: Arc<dyn TimeSource>,
        config: MultiSigConfig,
    ) -> Result<Self, SigningError> {
        let own_index = directory.own_index();
        let own_key = directory
            .own_public_key()
            .ok_or(RegistryError::UnknownGuard(own_index))?;
        Ok(Self {
            directory,
            dialer,
            prover,
            time,
            config,
            own_index,
            own_key,
            sessions: Mutex::new(SessionMap::default()),
        })
    }

    /// Start (or rejoin) the signing round for `tx`.
    ///
    /// Creates or loads the session, attaches the transaction and a fresh
    /// completion handle, generates this guard's commitment if it has none
    /// and publishes its public half to every bound peer. If the session
    /// already holds enough commitments, or a peer candidate that still
    /// needs this guard, signing proceeds immediately.
    pub async fn sign(
        &self,
        tx: &ChainTransaction,
        required_signers: usize,
    ) -> Result<SigningTicket, SigningError> {
        let guards = self.directory.guard_count();
        if required_signers == 0 || required_signers > guards {
            return Err(SigningError::InvalidQuorum {
                required: required_signers,
                guards,
            });
        }
        let tx_id = tx.tx_id.clone();
        let (sender, receiver) = oneshot::channel();
        let ticket = SigningTicket {
            tx_id: tx_id.clone(),
            receiver,
        };
        let target = SigningTarget {
            tx_bytes: tx.tx_bytes.clone(),
            input_boxes: tx.input_boxes.clone(),
            data_boxes: tx.data_boxes.clone(),
            required_signers,
        };

        let needs_commitment = {
            let mut map = self.sessions.lock().await;
            if let Some(done) = map.completed.get(&tx_id) {
                let _ = sender.send(Ok(done.signed.clone()));
                return Ok(ticket);
            }
            let now = self.time.now_millis();
            let session = map
                .active
                .entry(tx_id.clone())
                .or_insert_with(|| SigningSession::new(tx_id.clone(), guards, now));
            if session.attach(target, sender).is_some() {
                debug!(tx_id = %tx_id, "[cg-02] replaced completion handle of an existing session");
            }
            !session.has_own_secret()
        };

        if needs_commitment {
            let tx_bytes = tx.tx_bytes.clone();
            let input_count = tx.input_boxes.len();
            let (commitment, secret) = self
                .run_prover(&tx_id, move |prover| {
                    prover.generate_commitment(&tx_bytes, input_count)
                })
                .await?;
            let sealed = self.directory.seal(CommitmentPayload {
                tx_id: tx_id.clone(),
                commitment: commitment.clone(),
            })?;

            let mut map = self.sessions.lock().await;
            let session = map
                .active
                .get_mut(&tx_id)
                .ok_or_else(|| SigningError::SessionClosed(tx_id.clone()))?;
            session.set_own_commitment(self.own_index, commitment, sealed.signature, secret);
        }

        info!(tx_id = %tx_id, required_signers, "[cg-02] signing requested");
        self.publish_commitment(&tx_id).await?;
        self.advance(&tx_id).await;
        Ok(ticket)
    }

    /// Handle a peer's commitment.
    pub async fn handle_commitment(
        &self,
        sender: &TransportId,
        message: &Signed<CommitmentPayload>,
    ) -> Result<(), SigningError> {
        let index = self.directory.authenticate(sender, message)?;
        let tx_id = &message.payload.tx_id;

        let stored = {
            let mut map = self.sessions.lock().await;
            if map.completed.contains_key(tx_id) {
                return Ok(());
            }
            let now = self.time.now_millis();
            let guards = self.directory.guard_count();
            let session = map
                .active
                .entry(tx_id.clone())
                .or_insert_with(|| SigningSession::new(tx_id.clone(), guards, now));
            session.store_commitment(index, message.payload.commitment.clone(), message.signature)
        };

        if stored {
            debug!(tx_id = %tx_id, guard_index = index, "[cg-02] peer commitment stored");
            self.advance(tx_id).await;
        }
        Ok(())
    }

    /// Handle a peer's partial signature candidate.
    pub async fn handle_sign(
        &self,
        sender: &TransportId,
        message: &Signed<SignPayload>,
    ) -> Result<(), SigningError> {
        self.directory.authenticate(sender, message)?;
        let payload = &message.payload;
        let tx_id = &payload.tx_id;

        let candidate = SignatureState {
            signed_by: payload.signed_by.clone(),
            simulated_by: payload.simulated_by.clone(),
            partial_tx: payload.partial_tx_bytes.clone(),
        };
        if !candidate.is_consistent() {
            return Err(SigningError::InconsistentSigners(tx_id.clone()));
        }
        if candidate
            .signed_by
            .iter()
            .chain(candidate.simulated_by.iter())
            .any(|key| self.directory.index_of(key).is_none())
        {
            return Err(SigningError::UnknownSigner(tx_id.clone()));
        }

        let endorsements: Vec<_> = payload
            .commitments
            .iter()
            .filter(|e| self.verify_endorsement(tx_id, e.index, &e.commitment, &e.signature))
            .cloned()
            .collect();

        let adopted = {
            let mut map = self.sessions.lock().await;
            if map.completed.contains_key(tx_id) {
                return Ok(());
            }
            let now = self.time.now_millis();
            let guards = self.directory.guard_count();
            let session = map
                .active
                .entry(tx_id.clone())
                .or_insert_with(|| SigningSession::new(tx_id.clone(), guards, now));
            for endorsement in endorsements {
                session.store_commitment(
                    endorsement.index,
                    endorsement.commitment,
                    endorsement.signature,
                );
            }
            session.adopt_if_better(candidate, &self.own_key)
        };

        if adopted {
            debug!(
                tx_id = %tx_id,
                signers = payload.signed_by.len(),
                "[cg-02] adopted peer candidate"
            );
        }
        self.advance(tx_id).await;
        Ok(())
    }

    /// Reject and evict sessions unresolved after the session timeout and
    /// forget resolved ones older than it. Returns the number rejected.
    pub async fn cleanup(&self) -> usize {
        let now = self.time.now_millis();
        let timeout = self.config.session_timeout_ms();
        let mut map = self.sessions.lock().await;

        let expired: Vec<TxId> = map
            .active
            .iter()
            .filter(|(_, session)| session.is_expired(now, timeout))
            .map(|(tx_id, _)| tx_id.clone())
            .collect();
        for tx_id in &expired {
            if let Some(mut session) = map.active.remove(tx_id) {
                if let Some(completion) = session.take_completion() {
                    let _ = completion.send(Err(SigningError::Timeout(tx_id.clone())));
                }
                warn!(tx_id = %tx_id, "[cg-02] signing session timed out");
            }
        }
        map.completed
            .retain(|_, done| now.saturating_sub(done.completed_at) < timeout);
        expired.len()
    }

    /// Snapshot of an in-flight session.
    pub async fn session_view(&self, tx_id: &TxId) -> Option<SessionView> {
        self.sessions
            .lock()
            .await
            .active
            .get(tx_id)
            .map(SigningSession::view)
    }

    /// Signed transaction of a recently resolved session.
    pub async fn completed(&self, tx_id: &TxId) -> Option<SignedTransaction> {
        self.sessions
            .lock()
            .await
            .completed
            .get(tx_id)
            .map(|done| done.signed.clone())
    }

    /// Number of in-flight sessions.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.active.len()
    }

    /// Resolve the session if its candidate meets the quorum, otherwise
    /// extend the candidate if this guard's share is still missing. Errors
    /// are logged and leave the session pending for the next peer message.
    async fn advance(&self, tx_id: &TxId) {
        loop {
            let needs_sign = {
                let mut map = self.sessions.lock().await;
                if self.resolve_if_complete(&mut map, tx_id) {
                    return;
                }
                map.active
                    .get(tx_id)
                    .is_some_and(|s| s.needs_own_signature(self.own_index, &self.own_key))
            };
            if !needs_sign {
                return;
            }
            match self.generate_sign(tx_id).await {
                Ok(true) => return,
                // The candidate moved while the prover ran; retry on the new one.
                Ok(false) => continue,
                Err(e) => {
                    error!(tx_id = %tx_id, error = %e, "[cg-02] failed to generate signature");
                    return;
                }
            }
        }
    }

    /// Add this guard's share to the stored candidate (or start one) and
    /// broadcast the result. Returns false if the stored candidate changed
    /// while the prover ran and the result was discarded.
    async fn generate_sign(&self, tx_id: &TxId) -> Result<bool, SigningError> {
        let Some(plan) = self.plan_sign(tx_id).await? else {
            return Ok(true);
        };
        let SignPlan {
            target,
            mut request,
            commitments,
            base,
        } = plan;

        let extracted = base.clone();
        let simulated = request.simulated.clone();
        let partial_tx = self
            .run_prover(tx_id, move |prover| {
                for (key, commitment) in &commitments {
                    request.hints.add_commitment(*key, commitment);
                }
                if let Some(base) = &extracted {
                    request.hints.extend(prover.extract_hints(
                        &base.partial_tx,
                        &base.signed_by,
                        &base.simulated_by,
                    )?);
                }
                prover.sign(request)
            })
            .await?;

        let (message, receivers) = {
            let mut map = self.sessions.lock().await;
            let Some(session) = map.active.get_mut(tx_id) else {
                return Ok(true);
            };
            if session.state() != base.as_ref() {
                debug!(tx_id = %tx_id, "[cg-02] candidate moved while signing, discarding own");
                return Ok(false);
            }

            let mut signed_by = base.map(|b| b.signed_by).unwrap_or_default();
            signed_by.push(self.own_key);
            let candidate = SignatureState {
                signed_by,
                simulated_by: simulated,
                partial_tx,
            };
            session.adopt_if_better(candidate.clone(), &self.own_key);
            let quorum = candidate.signed_by.len() >= target.required_signers;

            let payload = SignPayload {
                tx_id: tx_id.clone(),
                partial_tx_bytes: candidate.partial_tx,
                signed_by: candidate.signed_by,
                simulated_by: candidate.simulated_by,
                commitments: session.take_unannounced(),
            };
            let receivers: Vec<TransportId> = self
                .directory
                .bound_peers()
                .into_iter()
                .filter(|(index, _)| {
                    quorum
                        || self
                            .directory
                            .public_key(*index)
                            .is_some_and(|key| !payload.simulated_by.contains(&key))
                })
                .map(|(_, transport)| transport)
                .collect();
            info!(
                tx_id = %tx_id,
                signers = payload.signed_by.len(),
                required = target.required_signers,
                "[cg-02] added own signature"
            );
            let message = GuardMessage::Sign(self.directory.seal(payload)?);
            self.resolve_if_complete(&mut map, tx_id);
            (message, receivers)
        };

        let json = message.to_json()?;
        for receiver in receivers {
            if let Err(e) = self
                .dialer
                .send_message(MULTISIG_CHANNEL, json.clone(), Some(&receiver))
                .await
            {
                warn!(tx_id = %tx_id, receiver = %receiver, error = %e, "[cg-02] failed to send candidate");
            }
        }
        Ok(true)
    }

    async fn plan_sign(&self, tx_id: &TxId) -> Result<Option<SignPlan>, SigningError> {
        let map = self.sessions.lock().await;
        let Some(session) = map.active.get(tx_id) else {
            return Ok(None);
        };
        if !session.needs_own_signature(self.own_index, &self.own_key) {
            return Ok(None);
        }
        let (Some(target), Some(secret)) = (session.target().cloned(), session.own_secret().cloned())
        else {
            return Ok(None);
        };

        let mut commitments = Vec::new();
        for index in session.committed().filter(|i| *i != self.own_index) {
            if let (Some(key), Some(commitment)) =
                (self.directory.public_key(index), session.commitment(index))
            {
                commitments.push((key, commitment.clone()));
            }
        }

        let base = session.state().cloned();
        let simulated = match &base {
            Some(state) => state.simulated_by.clone(),
            // The first signer fixes the real signers: itself and the first
            // committed peers up to the quorum. Everyone else is simulated,
            // committed or not, so every key is covered at resolution.
            None => {
                let mut real: BTreeSet<GuardIndex> = session
                    .committed()
                    .filter(|index| *index != self.own_index)
                    .take(target.required_signers.saturating_sub(1))
                    .collect();
                real.insert(self.own_index);
                (0..self.directory.guard_count())
                    .filter(|index| !real.contains(index))
                    .filter_map(|index| self.directory.public_key(index))
                    .collect()
            }
        };

        let request = SignRequest {
            tx_bytes: target.tx_bytes.clone(),
            input_count: target.input_count(),
            signer: self.own_key,
            secret,
            hints: HintsBag::new(),
            simulated,
        };
        Ok(Some(SignPlan {
            target,
            request,
            commitments,
            base,
        }))
    }

    fn resolve_if_complete(&self, map: &mut SessionMap, tx_id: &TxId) -> bool {
        if !map.active.get(tx_id).is_some_and(SigningSession::is_complete) {
            return false;
        }
        let Some(mut session) = map.active.remove(tx_id) else {
            return false;
        };
        let Some(state) = session.state() else {
            return false;
        };
        let signed = SignedTransaction {
            tx_id: tx_id.clone(),
            bytes: state.partial_tx.clone(),
        };
        let signers = state.signed_by.len();
        if let Some(completion) = session.take_completion() {
            let _ = completion.send(Ok(signed.clone()));
        }
        map.completed.insert(
            tx_id.clone(),
            CompletedSession {
                signed,
                completed_at: self.time.now_millis(),
            },
        );
        info!(tx_id = %tx_id, signers, "[cg-02] signing session resolved");
        true
    }

    async fn publish_commitment(&self, tx_id: &TxId) -> Result<(), SigningError> {
        let message = {
            let map = self.sessions.lock().await;
            let Some(session) = map.active.get(tx_id) else {
                return Ok(());
            };
            let (Some(commitment), Some(signature)) = (
                session.commitment(self.own_index),
                session.commitment_signature(self.own_index),
            ) else {
                return Ok(());
            };
            GuardMessage::Commitment(Signed {
                payload: CommitmentPayload {
                    tx_id: tx_id.clone(),
                    commitment: commitment.clone(),
                },
                guard_index: self.own_index,
                signature: *signature,
            })
        };

        let json = message.to_json()?;
        for (index, transport) in self.directory.bound_peers() {
            if let Err(e) = self
                .dialer
                .send_message(MULTISIG_CHANNEL, json.clone(), Some(&transport))
                .await
            {
                warn!(tx_id = %tx_id, guard_index = index, error = %e, "[cg-02] failed to send commitment");
            }
        }
        Ok(())
    }

    fn verify_endorsement(
        &self,
        tx_id: &TxId,
        index: GuardIndex,
        commitment: &Commitment,
        signature: &shared_crypto::GuardSignature,
    ) -> bool {
        let payload = CommitmentPayload {
            tx_id: tx_id.clone(),
            commitment: commitment.clone(),
        };
        let verified = Signed::signing_bytes(&payload, index)
            .map_err(RegistryError::from)
            .and_then(|bytes| self.directory.verify_detached(index, &bytes, signature));
        if let Err(e) = &verified {
            debug!(tx_id = %tx_id, guard_index = index, error = %e, "[cg-02] dropping carried commitment");
        }
        verified.is_ok()
    }

    async fn run_prover<R, F>(&self, tx_id: &TxId, job: F) -> Result<R, SigningError>
    where
        F: FnOnce(&dyn MultiSigProver) -> Result<R, crate::domain::ProverError> + Send + 'static,
        R: Send + 'static,
    {
        let prover = self.prover.clone();
        let task = tokio::task::spawn_blocking(move || job(prover.as_ref()));
        match tokio::time::timeout(self.config.prover_timeout, task).await {
            Ok(Ok(result)) => result.map_err(SigningError::from),
            Ok(Err(join)) => Err(SigningError::Internal(join.to_string())),
            Err(_) => Err(SigningError::ProverTimeout(tx_id.clone())),
        }
    }
}
