//! # `Signed<T>` Envelope
//!
//! The wrapper for every guard control message.
//!
//! ## Security Properties
//!
//! - **Claimed identity**: `guard_index` names the guard whose registered key
//!   must verify `signature`. Receivers additionally check that the
//!   transport-level sender is bound to (or, during the handshake, claims)
//!   that guard.
//! - **Domain separation**: the signed bytes are the canonical JSON of
//!   `(kind, payload, guard_index)`, so a signature over one message type can
//!   never be replayed as another.

use crate::entities::GuardIndex;
use crate::errors::MessageError;
use crate::ipc::{
    AgreementApproval, AgreementRequest, AgreementVote, ApprovePayload, CommitmentPayload,
    RegisterPayload, SignPayload,
};
use serde::{Deserialize, Serialize};
use shared_crypto::{GuardKeyPair, GuardPublicKey, GuardSignature};

/// A payload that can be carried in a [`Signed`] envelope.
pub trait MessagePayload: Serialize {
    /// Message type tag mixed into the signed bytes.
    const KIND: &'static str;
}

/// Payload plus the claimed sender index and its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signed<T> {
    /// The payload fields, flattened into the envelope object.
    #[serde(flatten)]
    pub payload: T,
    /// Claimed sender.
    pub guard_index: GuardIndex,
    /// Signature over [`Signed::signing_bytes`].
    pub signature: GuardSignature,
}

impl<T: MessagePayload> Signed<T> {
    /// Canonical bytes covered by the signature.
    pub fn signing_bytes(payload: &T, guard_index: GuardIndex) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(&(T::KIND, payload, guard_index))
            .map_err(|e| MessageError::Serialization(e.to_string()))
    }

    /// Sign `payload` as guard `guard_index`.
    pub fn sign(
        payload: T,
        guard_index: GuardIndex,
        keypair: &GuardKeyPair,
    ) -> Result<Self, MessageError> {
        let bytes = Self::signing_bytes(&payload, guard_index)?;
        Ok(Self {
            signature: keypair.sign(&bytes),
            payload,
            guard_index,
        })
    }

    /// Verify the signature against the claimed guard's key.
    pub fn verify(&self, key: &GuardPublicKey) -> Result<(), MessageError> {
        let bytes = Self::signing_bytes(&self.payload, self.guard_index)?;
        key.verify(&bytes, &self.signature)
            .map_err(|_| MessageError::InvalidSignature)
    }
}

/// Every message a guard sends, tagged `{type, payload}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum GuardMessage {
    /// Handshake: announce transport identity.
    Register(Signed<RegisterPayload>),
    /// Handshake: answer a registration or counter-challenge.
    Approve(Signed<ApprovePayload>),
    /// Signing: public commitment.
    Commitment(Signed<CommitmentPayload>),
    /// Signing: partial signature candidate.
    Sign(Signed<SignPayload>),
    /// Agreement: candidate proposal.
    Request(Signed<AgreementRequest>),
    /// Agreement: vote sent back to the proposer.
    Response(AgreementVote),
    /// Agreement: aggregated quorum.
    Approval(AgreementApproval),
}

impl GuardMessage {
    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialization(e.to_string()))
    }

    /// Decode from JSON text.
    pub fn from_json(value: &str) -> Result<Self, MessageError> {
        serde_json::from_str(value).map_err(|e| MessageError::Malformed(e.to_string()))
    }

    /// Wire type tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register(_) => RegisterPayload::KIND,
            Self::Approve(_) => ApprovePayload::KIND,
            Self::Commitment(_) => CommitmentPayload::KIND,
            Self::Sign(_) => SignPayload::KIND,
            Self::Request(_) => AgreementRequest::KIND,
            Self::Response(_) => "response",
            Self::Approval(_) => "approval",
        }
    }
}
