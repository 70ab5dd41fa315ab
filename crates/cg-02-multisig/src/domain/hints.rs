//! # Signing Hints
//!
//! Data a signer needs about the other participants: their public
//! commitments and the proofs already attached to the partial transaction.
//! The own secret half travels separately as a [`CommitmentSecret`] and is
//! wiped on drop.

use shared_crypto::GuardPublicKey;
use shared_types::Commitment;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret half of a guard's per-input commitments.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CommitmentSecret(Vec<Vec<u8>>);

impl CommitmentSecret {
    /// Wrap per-input secrets.
    pub fn new(inputs: Vec<Vec<u8>>) -> Self {
        Self(inputs)
    }

    /// Secret for input `index`.
    pub fn input(&self, index: usize) -> Option<&[u8]> {
        self.0.get(index).map(Vec::as_slice)
    }

    /// Number of inputs covered.
    pub fn input_count(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Debug for CommitmentSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommitmentSecret([REDACTED; {}])", self.0.len())
    }
}

/// What a hint carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    /// Public commitment of a signer that has not signed yet.
    PublicCommitment,
    /// Real signature share already in the partial transaction.
    RealProof,
    /// Placeholder proof for a simulated signer.
    SimulatedProof,
}

/// One per-input hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// Guard the hint belongs to.
    pub signer: GuardPublicKey,
    /// Input index.
    pub input: usize,
    /// Hint kind.
    pub kind: HintKind,
    /// Public commitment bytes (empty for simulated proofs).
    pub commitment: Vec<u8>,
    /// Proof bytes (empty for public commitments).
    pub proof: Vec<u8>,
}

/// Hints handed to the prover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintsBag {
    hints: Vec<Hint>,
}

impl HintsBag {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `signer`'s public commitment, one hint per input.
    pub fn add_commitment(&mut self, signer: GuardPublicKey, commitment: &Commitment) {
        for (input, bytes) in commitment.0.iter().enumerate() {
            self.hints.push(Hint {
                signer,
                input,
                kind: HintKind::PublicCommitment,
                commitment: bytes.clone(),
                proof: Vec::new(),
            });
        }
    }

    /// Add a single hint.
    pub fn push(&mut self, hint: Hint) {
        self.hints.push(hint);
    }

    /// Merge another bag.
    pub fn extend(&mut self, other: HintsBag) {
        self.hints.extend(other.hints);
    }

    /// All hints.
    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.hints.iter()
    }

    /// Hints of `kind`.
    pub fn of_kind(&self, kind: HintKind) -> impl Iterator<Item = &Hint> {
        self.hints.iter().filter(move |h| h.kind == kind)
    }

    /// Public commitment `signer` published for `input`.
    pub fn commitment_of(&self, signer: &GuardPublicKey, input: usize) -> Option<&[u8]> {
        self.of_kind(HintKind::PublicCommitment)
            .find(|h| h.signer == *signer && h.input == input)
            .map(|h| h.commitment.as_slice())
    }

    /// Number of hints.
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}
