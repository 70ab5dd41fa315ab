//! # Wire Message Payloads
//!
//! Payloads exchanged between guards. Handshake and signing payloads travel
//! inside [`Signed<T>`](crate::Signed); agreement votes and approvals carry
//! their own per-guard signatures over the candidate bytes.
//!
//! Field names are camelCase on the wire.

use crate::entities::{GuardIndex, TransportId, TxId};
use crate::envelope::MessagePayload;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_crypto::{GuardPublicKey, GuardSignature};

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Announces a guard's transport identity under a fresh nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    /// Fresh registration nonce.
    pub nonce: String,
    /// Transport id the sender claims.
    pub my_id: TransportId,
}

impl MessagePayload for RegisterPayload {
    const KIND: &'static str = "register";
}

/// Answers a registration (or a counter-challenge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePayload {
    /// Echo of the nonce being answered.
    pub nonce: String,
    /// Counter-challenge the receiver must echo back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce_to_sign: Option<String>,
    /// Transport id the sender claims.
    pub my_id: TransportId,
}

impl MessagePayload for ApprovePayload {
    const KIND: &'static str = "approve";
}

// =============================================================================
// MULTI-SIGNING
// =============================================================================

/// Public half of a guard's per-input signing commitments.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment(#[serde_as(as = "Vec<Hex>")] pub Vec<Vec<u8>>);

impl Commitment {
    /// Number of inputs covered.
    pub fn input_count(&self) -> usize {
        self.0.len()
    }
}

/// Broadcast of a guard's commitment for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentPayload {
    /// Transaction being signed.
    pub tx_id: TxId,
    /// Public commitment.
    pub commitment: Commitment,
}

impl MessagePayload for CommitmentPayload {
    const KIND: &'static str = "commitment";
}

/// A peer commitment relayed inside a `sign` message, with the original
/// commitment-message signature so receivers can verify it independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentEndorsement {
    /// Guard that produced the commitment.
    pub index: GuardIndex,
    /// The commitment.
    pub commitment: Commitment,
    /// Signature of the original `commitment` message.
    pub signature: GuardSignature,
}

/// Partial signature candidate broadcast during signing.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    /// Transaction being signed.
    pub tx_id: TxId,
    /// Serialized partially signed transaction.
    #[serde_as(as = "Hex")]
    pub partial_tx_bytes: Vec<u8>,
    /// Guards whose real signature share is included.
    pub signed_by: Vec<GuardPublicKey>,
    /// Guards covered by a simulated placeholder proof.
    pub simulated_by: Vec<GuardPublicKey>,
    /// Commitments the receiver may not have seen yet.
    #[serde(default)]
    pub commitments: Vec<CommitmentEndorsement>,
}

impl MessagePayload for SignPayload {
    const KIND: &'static str = "sign";
}

// =============================================================================
// AGREEMENT
// =============================================================================

/// Proposal of a candidate transaction for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementRequest {
    /// Canonical JSON of the candidate transaction.
    pub tx_json: String,
}

impl MessagePayload for AgreementRequest {
    const KIND: &'static str = "request";
}

/// A guard's endorsement of a candidate; the signature covers the exact
/// candidate bytes (`txJson`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementVote {
    /// Candidate transaction id.
    pub tx_id: TxId,
    /// Voting guard.
    pub guard_index: GuardIndex,
    /// Signature over the candidate bytes.
    pub signature: GuardSignature,
}

/// One endorsement inside an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardVoteSignature {
    /// Endorsing guard.
    pub guard_index: GuardIndex,
    /// Signature over the candidate bytes.
    pub signature: GuardSignature,
}

/// Aggregated quorum of endorsements for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementApproval {
    /// Agreed transaction id.
    pub tx_id: TxId,
    /// Canonical JSON of the agreed transaction.
    pub tx_json: String,
    /// Quorum of endorsements.
    pub guards_signatures: Vec<GuardVoteSignature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_omits_absent_counter_challenge() {
        let payload = ApprovePayload {
            nonce: "n1".into(),
            nonce_to_sign: None,
            my_id: TransportId::from("peer-a"),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"nonce":"n1","myId":"peer-a"}"#);
    }

    #[test]
    fn test_commitment_is_hex_list() {
        let commitment = Commitment(vec![vec![0xab, 0xcd], vec![0x01]]);
        let json = serde_json::to_string(&commitment).unwrap();
        assert_eq!(json, r#"["abcd","01"]"#);
        assert_eq!(commitment.input_count(), 2);
    }

    #[test]
    fn test_sign_payload_commitments_default_empty() {
        let json = r#"{"txId":"t","partialTxBytes":"00","signedBy":[],"simulatedBy":[]}"#;
        let payload: SignPayload = serde_json::from_str(json).unwrap();
        assert!(payload.commitments.is_empty());
        assert_eq!(payload.partial_tx_bytes, vec![0]);
    }
}
