//! # Simulated Chain
//!
//! In-memory [`ChainAdapter`] used by the devnet and tests.
//!
//! The chain holds a set of spendable boxes owned by the bridge lock
//! address. Candidates spend boxes in sorted id order until the required
//! value is covered and return change to the lock address, so any two guards
//! looking at the same box set build byte-identical transactions.
//!
//! Submission spends the inputs immediately and parks the transaction in a
//! mempool; `mine` moves mempool transactions into blocks. Test hooks drop
//! mempool transactions or spend boxes behind the bridge's back.

use crate::chain::ChainAdapter;
use crate::entities::{ChainId, ChainTransaction, EventId, EventTrigger, TransactionType, TxId};
use crate::errors::ChainError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Address holding bridge funds.
pub const LOCK_ADDRESS: &str = "bridge-lock";

/// Address receiving reward distributions.
pub const REWARD_ADDRESS: &str = "guard-rewards";

/// An unspent box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimBox {
    /// Box id.
    pub box_id: String,
    /// Value held.
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimOutput {
    address: String,
    value: u64,
}

/// Unsigned transaction body; its JSON encoding is the reduced transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimTxBody {
    event_id: EventId,
    tx_type: TransactionType,
    inputs: Vec<String>,
    outputs: Vec<SimOutput>,
}

#[derive(Debug)]
struct MempoolEntry {
    inputs: Vec<String>,
    created: Vec<String>,
}

#[derive(Debug, Default)]
struct ChainState {
    height: u64,
    boxes: BTreeMap<String, u64>,
    spent: HashSet<String>,
    mempool: HashMap<TxId, MempoolEntry>,
    mined: HashMap<TxId, u64>,
    fail_submissions: usize,
}

impl ChainState {
    fn is_spendable(&self, box_id: &str) -> bool {
        self.boxes.contains_key(box_id) && !self.spent.contains(box_id)
    }
}

/// In-memory chain.
#[derive(Debug)]
pub struct SimulatedChain {
    chain: ChainId,
    required_confirmations: u64,
    state: RwLock<ChainState>,
}

impl SimulatedChain {
    /// Empty chain requiring `required_confirmations` blocks of depth.
    pub fn new(chain: impl Into<ChainId>, required_confirmations: u64) -> Self {
        Self {
            chain: chain.into(),
            required_confirmations,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Add a spendable box at the lock address.
    pub fn fund(&self, box_id: &str, value: u64) {
        self.state.write().boxes.insert(box_id.to_string(), value);
    }

    /// Mine `blocks` blocks; everything in the mempool lands in the first one.
    pub fn mine(&self, blocks: u64) {
        if blocks == 0 {
            return;
        }
        let mut state = self.state.write();
        let block = state.height + 1;
        let pending: Vec<TxId> = state.mempool.keys().cloned().collect();
        for tx_id in pending {
            state.mempool.remove(&tx_id);
            state.mined.insert(tx_id, block);
        }
        state.height += blocks;
        debug!(chain = %self.chain, height = state.height, "[sim] mined blocks");
    }

    /// Evict a transaction from the mempool, releasing its inputs.
    pub fn drop_mempool(&self, tx_id: &TxId) -> bool {
        let mut state = self.state.write();
        let Some(entry) = state.mempool.remove(tx_id) else {
            return false;
        };
        for input in &entry.inputs {
            state.spent.remove(input);
        }
        for created in &entry.created {
            state.boxes.remove(created);
        }
        true
    }

    /// Spend a box outside the bridge (double spend, manual sweep).
    pub fn spend_box(&self, box_id: &str) {
        self.state.write().spent.insert(box_id.to_string());
    }

    /// Make the next `count` submissions fail as unavailable.
    pub fn fail_next_submissions(&self, count: usize) {
        self.state.write().fail_submissions = count;
    }

    /// Current height.
    pub fn height(&self) -> u64 {
        self.state.read().height
    }

    /// Total spendable value.
    pub fn spendable_value(&self) -> u64 {
        let state = self.state.read();
        state
            .boxes
            .iter()
            .filter(|(id, _)| !state.spent.contains(*id))
            .fold(0u64, |total, (_, value)| total.saturating_add(*value))
    }

    fn expected_output(event: &EventTrigger, tx_type: TransactionType) -> SimOutput {
        match tx_type {
            TransactionType::Payment => SimOutput {
                address: event.to_address.clone(),
                value: event.payment_amount(),
            },
            TransactionType::Reward => SimOutput {
                address: REWARD_ADDRESS.to_string(),
                value: event.bridge_fee,
            },
        }
    }

    fn decode_body(bytes: &[u8]) -> Result<SimTxBody, ChainError> {
        serde_json::from_slice(bytes).map_err(|e| ChainError::Malformed(e.to_string()))
    }

    fn tx_id_of(bytes: &[u8]) -> TxId {
        TxId(hex::encode(sha256(bytes)))
    }

    fn encode_box(box_id: &str, value: u64) -> Result<Vec<u8>, ChainError> {
        serde_json::to_vec(&SimBox {
            box_id: box_id.to_string(),
            value,
        })
        .map_err(|e| ChainError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChainAdapter for SimulatedChain {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    async fn build_candidate_transaction(
        &self,
        event: &EventTrigger,
        tx_type: TransactionType,
    ) -> Result<ChainTransaction, ChainError> {
        let payout = Self::expected_output(event, tx_type);
        let state = self.state.read();

        let mut selected = Vec::new();
        let mut covered = 0u64;
        for (box_id, value) in state.boxes.iter() {
            if covered >= payout.value {
                break;
            }
            if state.spent.contains(box_id) {
                continue;
            }
            covered = covered.checked_add(*value).ok_or_else(|| {
                ChainError::Malformed("spendable value overflows".into())
            })?;
            selected.push((box_id.clone(), *value));
        }
        if covered < payout.value {
            return Err(ChainError::InsufficientFunds {
                needed: payout.value,
                available: covered,
            });
        }

        let mut outputs = vec![payout.clone()];
        if covered > payout.value {
            outputs.push(SimOutput {
                address: LOCK_ADDRESS.to_string(),
                value: covered - payout.value,
            });
        }
        let body = SimTxBody {
            event_id: event.id.clone(),
            tx_type,
            inputs: selected.iter().map(|(id, _)| id.clone()).collect(),
            outputs,
        };
        let tx_bytes = serde_json::to_vec(&body).map_err(|e| ChainError::Malformed(e.to_string()))?;
        let input_boxes = selected
            .iter()
            .map(|(id, value)| Self::encode_box(id, *value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChainTransaction {
            tx_id: Self::tx_id_of(&tx_bytes),
            event_id: event.id.clone(),
            chain: self.chain.clone(),
            tx_type,
            tx_bytes,
            input_boxes,
            data_boxes: Vec::new(),
        })
    }

    async fn verify_candidate_against_event(
        &self,
        tx: &ChainTransaction,
        event: &EventTrigger,
    ) -> Result<bool, ChainError> {
        if tx.chain != self.chain || tx.event_id != event.id {
            return Ok(false);
        }
        if Self::tx_id_of(&tx.tx_bytes) != tx.tx_id {
            return Ok(false);
        }
        let body = Self::decode_body(&tx.tx_bytes)?;
        if body.event_id != event.id || body.tx_type != tx.tx_type {
            return Ok(false);
        }
        if body.outputs.first() != Some(&Self::expected_output(event, tx.tx_type)) {
            return Ok(false);
        }
        // Everything beyond the payout must return to the lock address.
        if body.outputs[1..].iter().any(|o| o.address != LOCK_ADDRESS) {
            return Ok(false);
        }

        let state = self.state.read();
        let mut input_value = 0u64;
        for input in &body.inputs {
            if !state.is_spendable(input) {
                return Ok(false);
            }
            let value = state.boxes.get(input).copied().unwrap_or_default();
            let Some(total) = input_value.checked_add(value) else {
                return Ok(false);
            };
            input_value = total;
        }
        let output_value = body
            .outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value));
        Ok(output_value == Some(input_value))
    }

    async fn submit(&self, tx: &ChainTransaction, signed: &[u8]) -> Result<TxId, ChainError> {
        if signed.is_empty() {
            return Err(ChainError::Rejected("missing signature".into()));
        }
        let body = Self::decode_body(&tx.tx_bytes)?;

        let mut state = self.state.write();
        if state.fail_submissions > 0 {
            state.fail_submissions -= 1;
            return Err(ChainError::Unavailable("node unreachable".into()));
        }
        if state.mempool.contains_key(&tx.tx_id) || state.mined.contains_key(&tx.tx_id) {
            return Ok(tx.tx_id.clone());
        }
        if let Some(input) = body.inputs.iter().find(|i| !state.is_spendable(i)) {
            return Err(ChainError::Rejected(format!("input {input} already spent")));
        }

        for input in &body.inputs {
            state.spent.insert(input.clone());
        }
        let mut created = Vec::new();
        for (index, output) in body.outputs.iter().enumerate() {
            if output.address == LOCK_ADDRESS {
                let box_id = format!("{}:{}", tx.tx_id, index);
                state.boxes.insert(box_id.clone(), output.value);
                created.push(box_id);
            }
        }
        state.mempool.insert(
            tx.tx_id.clone(),
            MempoolEntry {
                inputs: body.inputs,
                created,
            },
        );
        info!(chain = %self.chain, tx_id = %tx.tx_id, "[sim] transaction accepted to mempool");
        Ok(tx.tx_id.clone())
    }

    async fn get_confirmation_depth(&self, tx_id: &TxId) -> Result<Option<u64>, ChainError> {
        let state = self.state.read();
        if state.mempool.contains_key(tx_id) {
            return Ok(Some(0));
        }
        Ok(state
            .mined
            .get(tx_id)
            .map(|mined_at| state.height.saturating_sub(*mined_at) + 1))
    }

    async fn are_inputs_still_valid(&self, tx: &ChainTransaction) -> Result<bool, ChainError> {
        let body = Self::decode_body(&tx.tx_bytes)?;
        let state = self.state.read();
        Ok(body.inputs.iter().all(|input| state.is_spendable(input)))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<ChainTransaction, ChainError> {
        let json = std::str::from_utf8(bytes).map_err(|e| ChainError::Malformed(e.to_string()))?;
        let tx =
            ChainTransaction::from_json(json).map_err(|e| ChainError::Malformed(e.to_string()))?;
        if tx.chain != self.chain {
            return Err(ChainError::Malformed(format!(
                "transaction for chain {} given to {}",
                tx.chain, self.chain
            )));
        }
        if Self::tx_id_of(&tx.tx_bytes) != tx.tx_id {
            return Err(ChainError::Malformed("transaction id mismatch".into()));
        }
        Self::decode_body(&tx.tx_bytes)?;
        Ok(tx)
    }

    fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventTrigger {
        EventTrigger {
            id: EventId::from("ev-1"),
            from_chain: ChainId::from("cardano"),
            to_chain: ChainId::from("ergo"),
            to_address: "alice".into(),
            amount: 1_000,
            bridge_fee: 50,
            network_fee: 10,
            source_tx_id: "lock-1".into(),
        }
    }

    fn funded() -> SimulatedChain {
        let chain = SimulatedChain::new("ergo", 3);
        chain.fund("box-b", 600);
        chain.fund("box-a", 600);
        chain.fund("box-c", 5_000);
        chain
    }

    #[tokio::test]
    async fn test_candidates_are_deterministic() {
        let a = funded();
        let b = funded();
        let tx_a = a
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        let tx_b = b
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        assert_eq!(tx_a.to_json().unwrap(), tx_b.to_json().unwrap());
        // Sorted selection: box-a then box-b.
        assert_eq!(tx_a.input_boxes.len(), 2);
    }

    #[tokio::test]
    async fn test_verify_accepts_own_candidate_and_rejects_tampering() {
        let chain = funded();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        assert!(chain.verify_candidate_against_event(&tx, &event()).await.unwrap());

        let mut other_event = event();
        other_event.to_address = "mallory".into();
        other_event.id = tx.event_id.clone();
        assert!(!chain
            .verify_candidate_against_event(&tx, &other_event)
            .await
            .unwrap());

        let mut tampered = tx.clone();
        tampered.tx_bytes.push(b' ');
        assert!(!chain
            .verify_candidate_against_event(&tampered, &event())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let chain = SimulatedChain::new("ergo", 1);
        chain.fund("box-a", 10);
        let err = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { needed: 940, .. }));
    }

    #[tokio::test]
    async fn test_submit_mine_and_depth() {
        let chain = funded();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        assert_eq!(chain.get_confirmation_depth(&tx.tx_id).await.unwrap(), None);

        chain.submit(&tx, b"sig").await.unwrap();
        assert_eq!(chain.get_confirmation_depth(&tx.tx_id).await.unwrap(), Some(0));
        assert!(!chain.are_inputs_still_valid(&tx).await.unwrap());

        // Resubmission of a known transaction is accepted.
        assert_eq!(chain.submit(&tx, b"sig").await.unwrap(), tx.tx_id);

        chain.mine(3);
        assert_eq!(chain.get_confirmation_depth(&tx.tx_id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_drop_mempool_restores_inputs() {
        let chain = funded();
        let before = chain.spendable_value();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        chain.submit(&tx, b"sig").await.unwrap();
        assert!(chain.drop_mempool(&tx.tx_id));
        assert_eq!(chain.get_confirmation_depth(&tx.tx_id).await.unwrap(), None);
        assert!(chain.are_inputs_still_valid(&tx).await.unwrap());
        assert_eq!(chain.spendable_value(), before);
    }

    #[tokio::test]
    async fn test_external_spend_invalidates() {
        let chain = funded();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        chain.spend_box("box-a");
        assert!(!chain.are_inputs_still_valid(&tx).await.unwrap());
        assert!(matches!(
            chain.submit(&tx, b"sig").await,
            Err(ChainError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_submission_is_transient() {
        let chain = funded();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Reward)
            .await
            .unwrap();
        chain.fail_next_submissions(1);
        assert!(chain.submit(&tx, b"sig").await.unwrap_err().is_transient());
        assert!(chain.submit(&tx, b"sig").await.is_ok());
    }

    #[tokio::test]
    async fn test_deserialize_checks_integrity() {
        let chain = funded();
        let tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        let json = tx.to_json().unwrap();
        assert_eq!(chain.deserialize(json.as_bytes()).unwrap(), tx);

        let mut forged = tx.clone();
        forged.tx_id = TxId::from("deadbeef");
        assert!(chain
            .deserialize(forged.to_json().unwrap().as_bytes())
            .is_err());

        let other = SimulatedChain::new("cardano", 1);
        assert!(other.deserialize(json.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_overflowing_outputs_are_rejected() {
        let chain = funded();
        let mut tx = chain
            .build_candidate_transaction(&event(), TransactionType::Payment)
            .await
            .unwrap();
        let mut body = SimulatedChain::decode_body(&tx.tx_bytes).unwrap();
        body.outputs.push(SimOutput {
            address: LOCK_ADDRESS.to_string(),
            value: u64::MAX,
        });
        tx.tx_bytes = serde_json::to_vec(&body).unwrap();
        tx.tx_id = SimulatedChain::tx_id_of(&tx.tx_bytes);

        assert!(!chain.verify_candidate_against_event(&tx, &event()).await.unwrap());
    }

    #[tokio::test]
    async fn test_overflowing_funding_is_an_error() {
        let chain = SimulatedChain::new("ergo", 1);
        chain.fund("box-a", 10);
        chain.fund("box-b", u64::MAX);
        // box-a alone does not cover the payout; adding box-b overflows.
        let mut large = event();
        large.amount = u64::MAX;
        large.bridge_fee = 0;
        large.network_fee = 0;
        assert!(matches!(
            chain
                .build_candidate_transaction(&large, TransactionType::Payment)
                .await,
            Err(ChainError::Malformed(_))
        ));
        assert_eq!(chain.spendable_value(), u64::MAX);
    }
}
