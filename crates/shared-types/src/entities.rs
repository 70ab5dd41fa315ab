//! # Core Domain Entities
//!
//! Identifiers, event triggers and chain transactions shared by the
//! agreement, signing and lifecycle subsystems.

use crate::errors::MessageError;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;

/// Position of a guard in the static, ordered guard list.
pub type GuardIndex = usize;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Chain-level transaction identifier.
    TxId
);
string_id!(
    /// Identifier of a verified cross-chain event trigger.
    EventId
);
string_id!(
    /// Chain name (`ergo`, `cardano`, ...).
    ChainId
);
string_id!(
    /// Transport-level peer identity assigned by the dialer.
    TransportId
);

/// A verified cross-chain observation requiring a compensating payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    /// Event identifier.
    pub id: EventId,
    /// Chain the lock transaction was observed on.
    pub from_chain: ChainId,
    /// Chain the payment must be made on.
    pub to_chain: ChainId,
    /// Recipient address on the target chain.
    pub to_address: String,
    /// Locked amount.
    pub amount: u64,
    /// Bridge fee retained for guard/watcher rewards.
    pub bridge_fee: u64,
    /// Network fee deducted from the payment.
    pub network_fee: u64,
    /// Lock transaction id on the source chain.
    pub source_tx_id: String,
}

impl EventTrigger {
    /// Amount delivered to the recipient.
    pub fn payment_amount(&self) -> u64 {
        self.amount
            .saturating_sub(self.bridge_fee)
            .saturating_sub(self.network_fee)
    }
}

/// Transaction purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    /// Payment to the event recipient on the target chain.
    Payment,
    /// Reward distribution on the reward chain.
    Reward,
}

impl TransactionType {
    /// Event status in which a candidate of this type may be proposed.
    pub fn pending_event_status(self) -> EventStatus {
        match self {
            Self::Payment => EventStatus::PendingPayment,
            Self::Reward => EventStatus::PendingReward,
        }
    }

    /// Event status while an agreed transaction of this type is in flight.
    pub fn in_progress_event_status(self) -> EventStatus {
        match self {
            Self::Payment => EventStatus::InPayment,
            Self::Reward => EventStatus::InReward,
        }
    }

    /// Event status once a transaction of this type is confirmed.
    pub fn completed_event_status(self) -> EventStatus {
        match self {
            Self::Payment => EventStatus::PendingReward,
            Self::Reward => EventStatus::Completed,
        }
    }
}

/// Progress of an event through payment and reward distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    /// Waiting for an agreed payment transaction.
    PendingPayment,
    /// Payment transaction agreed and in flight.
    InPayment,
    /// Payment done, waiting for an agreed reward transaction.
    PendingReward,
    /// Reward transaction agreed and in flight.
    InReward,
    /// Fully processed.
    Completed,
}

impl EventStatus {
    /// Transaction type a proposer should build for an event in this status.
    pub fn pending_tx_type(self) -> Option<TransactionType> {
        match self {
            Self::PendingPayment => Some(TransactionType::Payment),
            Self::PendingReward => Some(TransactionType::Reward),
            _ => None,
        }
    }
}

/// Event as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// The verified trigger.
    pub event: EventTrigger,
    /// Current status.
    pub status: EventStatus,
}

impl EventRecord {
    /// A freshly verified event waiting for payment.
    pub fn pending(event: EventTrigger) -> Self {
        Self {
            event,
            status: EventStatus::PendingPayment,
        }
    }
}

/// A chain transaction with inputs and outputs fixed but no signatures
/// attached (the "reduced transaction"), as produced by a Chain Adapter.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
    /// Transaction id.
    pub tx_id: TxId,
    /// Owning event.
    pub event_id: EventId,
    /// Chain the transaction is paid on.
    pub chain: ChainId,
    /// Purpose.
    pub tx_type: TransactionType,
    /// Serialized reduced transaction.
    #[serde_as(as = "Hex")]
    pub tx_bytes: Vec<u8>,
    /// Serialized input boxes, in input order.
    #[serde_as(as = "Vec<Hex>")]
    pub input_boxes: Vec<Vec<u8>>,
    /// Serialized data-input boxes.
    #[serde_as(as = "Vec<Hex>")]
    pub data_boxes: Vec<Vec<u8>>,
}

impl ChainTransaction {
    /// Canonical JSON form exchanged during agreement (`txJson`).
    ///
    /// Field order is fixed by the struct definition, so two guards holding
    /// equal transactions produce byte-identical JSON.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialization(e.to_string()))
    }

    /// Parse the canonical JSON form.
    pub fn from_json(value: &str) -> Result<Self, MessageError> {
        serde_json::from_str(value).map_err(|e| MessageError::Malformed(e.to_string()))
    }
}

/// Fully signed transaction produced by the signing protocol.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// Transaction id.
    pub tx_id: TxId,
    /// Serialized transaction with the aggregated signature attached.
    #[serde_as(as = "Hex")]
    pub bytes: Vec<u8>,
}
