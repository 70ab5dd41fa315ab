//! # Signing Session
//!
//! Per-transaction state of one threshold signature round.
//!
//! ## Invariants
//!
//! - One commitment slot per guard; a filled slot is never overwritten.
//! - `signed_by ∩ simulated_by = ∅` for every stored candidate.
//! - The stored real-signer set never shrinks: a peer candidate replaces the
//!   local one only if it has at least as many real signers other than this
//!   guard and at least as many real signers overall.
//! - The completion handle is taken exactly once.

use crate::domain::errors::SigningError;
use crate::domain::hints::CommitmentSecret;
use shared_crypto::{GuardPublicKey, GuardSignature};
use shared_types::{Commitment, CommitmentEndorsement, GuardIndex, SignedTransaction, TxId};
use tokio::sync::oneshot;

/// One-shot completion handle owned by a session.
pub type Completion = oneshot::Sender<Result<SignedTransaction, SigningError>>;

/// What `sign()` asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningTarget {
    /// Reduced transaction bytes.
    pub tx_bytes: Vec<u8>,
    /// Serialized input boxes.
    pub input_boxes: Vec<Vec<u8>>,
    /// Serialized data-input boxes.
    pub data_boxes: Vec<Vec<u8>>,
    /// Real signatures needed to resolve.
    pub required_signers: usize,
}

impl SigningTarget {
    /// Number of inputs to sign.
    pub fn input_count(&self) -> usize {
        self.input_boxes.len()
    }
}

/// A partial signature candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureState {
    /// Guards whose real share is included, in signing order.
    pub signed_by: Vec<GuardPublicKey>,
    /// Guards covered by a simulated proof.
    pub simulated_by: Vec<GuardPublicKey>,
    /// Serialized partial transaction.
    pub partial_tx: Vec<u8>,
}

impl SignatureState {
    /// True if `key` is a real or simulated signer.
    pub fn covers(&self, key: &GuardPublicKey) -> bool {
        self.signed_by.contains(key) || self.simulated_by.contains(key)
    }

    /// Real signers other than `own`.
    pub fn real_count_excluding(&self, own: &GuardPublicKey) -> usize {
        self.signed_by.iter().filter(|k| *k != own).count()
    }

    /// True if no key repeats within or across the two sets.
    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.signed_by
            .iter()
            .chain(self.simulated_by.iter())
            .all(|key| seen.insert(*key))
    }
}

/// A resolved session kept until the timeout sweep.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    /// The signed transaction.
    pub signed: SignedTransaction,
    /// Resolution time (unix ms).
    pub completed_at: u64,
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Transaction id.
    pub tx_id: TxId,
    /// True once `sign()` attached the transaction.
    pub attached: bool,
    /// Commitment presence per guard index.
    pub commitments: Vec<bool>,
    /// Real signers of the stored candidate.
    pub signed_by: Vec<GuardPublicKey>,
    /// Simulated signers of the stored candidate.
    pub simulated_by: Vec<GuardPublicKey>,
    /// Creation time (unix ms).
    pub created_at: u64,
}

/// One in-flight signature round.
#[derive(Debug)]
pub struct SigningSession {
    tx_id: TxId,
    target: Option<SigningTarget>,
    commitments: Vec<Option<Commitment>>,
    commitment_signatures: Vec<Option<GuardSignature>>,
    announced: Vec<bool>,
    own_secret: Option<CommitmentSecret>,
    state: Option<SignatureState>,
    created_at: u64,
    completion: Option<Completion>,
}

impl SigningSession {
    /// Empty session with one commitment slot per guard.
    pub fn new(tx_id: TxId, guard_count: usize, now: u64) -> Self {
        Self {
            tx_id,
            target: None,
            commitments: vec![None; guard_count],
            commitment_signatures: vec![None; guard_count],
            announced: vec![false; guard_count],
            own_secret: None,
            state: None,
            created_at: now,
            completion: None,
        }
    }

    /// Transaction id.
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Creation time.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// True if unresolved for at least `timeout_ms`.
    pub fn is_expired(&self, now: u64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.created_at) >= timeout_ms
    }

    /// Attach the transaction and a fresh completion handle. Returns the
    /// handle it replaced, if any. Commitments that do not cover the
    /// transaction's inputs are discarded.
    pub fn attach(&mut self, target: SigningTarget, completion: Completion) -> Option<Completion> {
        let inputs = target.input_count();
        for (slot, signature) in self
            .commitments
            .iter_mut()
            .zip(self.commitment_signatures.iter_mut())
        {
            if slot.as_ref().is_some_and(|c| c.input_count() != inputs) {
                *slot = None;
                *signature = None;
            }
        }
        self.target = Some(target);
        self.completion.replace(completion)
    }

    /// The attached transaction.
    pub fn target(&self) -> Option<&SigningTarget> {
        self.target.as_ref()
    }

    /// Store a peer commitment. Returns false if the slot is taken, the
    /// index is out of range, or the commitment does not match the input
    /// count.
    pub fn store_commitment(
        &mut self,
        index: GuardIndex,
        commitment: Commitment,
        signature: GuardSignature,
    ) -> bool {
        if self.commitments.get(index).map_or(true, Option::is_some) {
            return false;
        }
        if let Some(target) = &self.target {
            if commitment.input_count() != target.input_count() {
                return false;
            }
        }
        self.commitments[index] = Some(commitment);
        self.commitment_signatures[index] = Some(signature);
        true
    }

    /// Store this guard's own commitment and keep its secret half.
    pub fn set_own_commitment(
        &mut self,
        index: GuardIndex,
        commitment: Commitment,
        signature: GuardSignature,
        secret: CommitmentSecret,
    ) -> bool {
        if self.own_secret.is_some() || index >= self.commitments.len() {
            return false;
        }
        self.commitments[index] = Some(commitment);
        self.commitment_signatures[index] = Some(signature);
        self.own_secret = Some(secret);
        true
    }

    /// True once this guard generated its commitment.
    pub fn has_own_secret(&self) -> bool {
        self.own_secret.is_some()
    }

    /// Own secret half.
    pub fn own_secret(&self) -> Option<&CommitmentSecret> {
        self.own_secret.as_ref()
    }

    /// Commitment of guard `index`.
    pub fn commitment(&self, index: GuardIndex) -> Option<&Commitment> {
        self.commitments.get(index).and_then(Option::as_ref)
    }

    /// Signature of guard `index`'s commitment message.
    pub fn commitment_signature(&self, index: GuardIndex) -> Option<&GuardSignature> {
        self.commitment_signatures.get(index).and_then(Option::as_ref)
    }

    /// Guards with a stored commitment.
    pub fn committed(&self) -> impl Iterator<Item = GuardIndex> + '_ {
        self.commitments
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| i)
    }

    /// Stored commitments from guards other than `own`.
    pub fn peer_commitment_count(&self, own: GuardIndex) -> usize {
        self.committed().filter(|i| *i != own).count()
    }

    /// Stored candidate.
    pub fn state(&self) -> Option<&SignatureState> {
        self.state.as_ref()
    }

    /// "Better candidate wins". Returns true if `candidate` replaced the
    /// stored one.
    pub fn adopt_if_better(&mut self, candidate: SignatureState, own: &GuardPublicKey) -> bool {
        let better = match &self.state {
            None => true,
            Some(local) => {
                candidate != *local
                    && candidate.real_count_excluding(own) >= local.real_count_excluding(own)
                    && candidate.signed_by.len() >= local.signed_by.len()
            }
        };
        if better {
            self.state = Some(candidate);
        }
        better
    }

    /// True if this guard should extend the current candidate (or start
    /// one): the transaction is attached, the own commitment exists, this
    /// guard is neither a real nor a simulated signer yet and the quorum is
    /// not reached.
    pub fn needs_own_signature(&self, own_index: GuardIndex, own_key: &GuardPublicKey) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        if self.own_secret.is_none() {
            return false;
        }
        match &self.state {
            None => self.peer_commitment_count(own_index) + 1 >= target.required_signers,
            Some(state) => {
                !state.covers(own_key) && state.signed_by.len() < target.required_signers
            }
        }
    }

    /// True if the stored candidate meets the attached quorum.
    pub fn is_complete(&self) -> bool {
        match (&self.target, &self.state) {
            (Some(target), Some(state)) => state.signed_by.len() >= target.required_signers,
            _ => false,
        }
    }

    /// Take the completion handle. Subsequent calls return `None`.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Endorsements for every stored commitment not yet announced by this
    /// guard; marks them announced.
    pub fn take_unannounced(&mut self) -> Vec<CommitmentEndorsement> {
        let mut endorsements = Vec::new();
        for index in 0..self.commitments.len() {
            if self.announced[index] {
                continue;
            }
            if let (Some(commitment), Some(signature)) =
                (&self.commitments[index], &self.commitment_signatures[index])
            {
                endorsements.push(CommitmentEndorsement {
                    index,
                    commitment: commitment.clone(),
                    signature: *signature,
                });
                self.announced[index] = true;
            }
        }
        endorsements
    }

    /// Read-only snapshot.
    pub fn view(&self) -> SessionView {
        let (signed_by, simulated_by) = self
            .state
            .as_ref()
            .map(|s| (s.signed_by.clone(), s.simulated_by.clone()))
            .unwrap_or_default();
        SessionView {
            tx_id: self.tx_id.clone(),
            attached: self.target.is_some(),
            commitments: self.commitments.iter().map(Option::is_some).collect(),
            signed_by,
            simulated_by,
            created_at: self.created_at,
        }
    }
}
