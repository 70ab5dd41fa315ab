//! # Transaction Lifecycle Processor
//!
//! Drives every non-terminal transaction one step per poll, reading and
//! writing only persisted state:
//!
//! | Status        | Action                                                    |
//! |---------------|-----------------------------------------------------------|
//! | `approved`    | start a signing task, move to `in-sign`                   |
//! | `in-sign`     | past the sign timeout: `sign-failed`                      |
//! | `signed`      | submit; success `sent`, failure stays `signed`            |
//! | `sent`        | deep enough: `completed`; missing: wait, resubmit or `invalid` |
//! | `sign-failed` | reconcile against the chain                               |
//!
//! A failure on one record is logged and does not stop the cycle. Signing
//! tasks write their result back through the ledger when they finish.

use crate::domain::{transition, LifecycleConfig, LifecycleError};
use crate::ports::TransactionSigner;
use parking_lot::Mutex;
use shared_types::{
    ChainAdapter, ChainAdapters, ChainTransaction, EventId, EventStatus, LedgerStore,
    PersistedTransaction, SignedTransaction, TimeSource, TransactionStatus, TxId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};


const ACTIVE_STATUSES: [TransactionStatus; 5] = [
    TransactionStatus::Approved,
    TransactionStatus::InSign,
    TransactionStatus::Signed,
    TransactionStatus::SignFailed,
    TransactionStatus::Sent,
];

/// Dependencies for [`LifecycleService`].
pub struct LifecycleDependencies {
    /// Event and transaction storage.
    pub ledger: Arc<dyn LedgerStore>,
    /// Chain adapters by chain.
    pub chains: ChainAdapters,
    /// Signing session manager.
    pub signer: Arc<dyn TransactionSigner>,
    /// Clock.
    pub time: Arc<dyn TimeSource>,
    /// Configuration.
    pub config: LifecycleConfig,
}

/// Outcome of one processing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Records looked at.
    pub examined: usize,
    /// Records whose status changed.
    pub transitioned: usize,
    /// Records whose processing failed.
    pub failed: usize,
}

/// Writes signing results back to the ledger. Shared with spawned signing
/// tasks.
#[derive(Clone)]
struct SignatureRecorder {
    ledger: Arc<dyn LedgerStore>,
    time: Arc<dyn TimeSource>,
}

impl SignatureRecorder {
    async fn record(
        &self,
        tx_id: &TxId,
        result: Result<SignedTransaction, LifecycleError>,
    ) -> Result<bool, LifecycleError> {
        let signed = match result {
            Ok(signed) => signed,
            Err(e) => {
                // The persisted sign timeout moves the record on.
                warn!(tx_id = %tx_id, error = %e, "[cg-04] signing round failed");
                return Ok(false);
            }
        };
        let record = self
            .ledger
            .transaction_by_id(tx_id)
            .await?
            .ok_or_else(|| LifecycleError::UnknownTransaction(tx_id.clone()))?;
        if !matches!(
            record.status,
            TransactionStatus::InSign | TransactionStatus::SignFailed
        ) {
            debug!(tx_id = %tx_id, status = %record.status, "[cg-04] discarding signature");
            return Ok(false);
        }

        let from = record.status;
        let mut record = transition(record, TransactionStatus::Signed, self.time.now_millis())?;
        record.signed_bytes = Some(signed.bytes);
        self.ledger.update_transaction(record).await?;
        info!(tx_id = %tx_id, from = %from, "[cg-04] transaction signed");
        Ok(true)
    }
}

/// Transaction lifecycle processor.
pub struct LifecycleService {
    ledger: Arc<dyn LedgerStore>,
    chains: ChainAdapters,
    signer: Arc<dyn TransactionSigner>,
    time: Arc<dyn TimeSource>,
    config: LifecycleConfig,
    recorder: SignatureRecorder,
    signing: Mutex<HashMap<TxId, JoinHandle<()>>>,
}

impl LifecycleService {
    /// Create a new processor.
    pub fn new(deps: LifecycleDependencies) -> Self {
        let recorder = SignatureRecorder {
            ledger: deps.ledger.clone(),
            time: deps.time.clone(),
        };
        Self {
            ledger: deps.ledger,
            chains: deps.chains,
            signer: deps.signer,
            time: deps.time,
            config: deps.config,
            recorder,
            signing: Mutex::new(HashMap::new()),
        }
    }

    /// Advance every non-terminal transaction by one step.
    pub async fn process_transactions(&self) -> Result<CycleSummary, LifecycleError> {
        let records = self.ledger.transactions_by_status(&ACTIVE_STATUSES).await?;
        let mut summary = CycleSummary::default();

        for record in records {
            summary.examined += 1;
            let tx_id = record.tx_id.clone();
            let status = record.status;
            match self.process_record(record).await {
                Ok(true) => summary.transitioned += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!(tx_id = %tx_id, status = %status, error = %e, "[cg-04] failed to process transaction");
                }
            }
        }
        Ok(summary)
    }

    /// Write a signing result back. Returns true if the record moved to
    /// `signed`; a signature for a record outside `in-sign`/`sign-failed`
    /// is discarded.
    pub async fn on_signature(
        &self,
        tx_id: &TxId,
        result: Result<SignedTransaction, LifecycleError>,
    ) -> Result<bool, LifecycleError> {
        self.recorder.record(tx_id, result).await
    }

    /// Wait for every running signing task to finish.
    pub async fn wait_pending_signatures(&self) {
        let handles: Vec<JoinHandle<()>> = self.signing.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "[cg-04] signing task aborted");
            }
        }
    }

    /// Abort every running signing task.
    pub fn abort_signing(&self) {
        for (_, handle) in self.signing.lock().drain() {
            handle.abort();
        }
    }

    async fn process_record(&self, record: PersistedTransaction) -> Result<bool, LifecycleError> {
        match record.status {
            TransactionStatus::Approved => self.start_signing(record).await.map(|_| true),
            TransactionStatus::InSign => self.check_sign_timeout(record).await,
            TransactionStatus::Signed => self.submit(record).await,
            TransactionStatus::Sent => self.check_sent(record).await,
            TransactionStatus::SignFailed => self.reconcile_sign_failed(record).await,
            TransactionStatus::Invalid | TransactionStatus::Completed => Ok(false),
        }
    }

    /// Move to `in-sign` and hand the transaction to the signer.
    async fn start_signing(&self, record: PersistedTransaction) -> Result<(), LifecycleError> {
        let tx = record.chain_transaction()?;
        let required = record.required_sign;
        let record = transition(record, TransactionStatus::InSign, self.time.now_millis())?;
        self.ledger.update_transaction(record).await?;
        info!(tx_id = %tx.tx_id, required, "[cg-04] signing started");
        self.spawn_signing(tx, required);
        Ok(())
    }

    fn spawn_signing(&self, tx: ChainTransaction, required: usize) {
        let mut signing = self.signing.lock();
        signing.retain(|_, handle| !handle.is_finished());
        if signing.contains_key(&tx.tx_id) {
            debug!(tx_id = %tx.tx_id, "[cg-04] signing task already running");
            return;
        }

        let signer = self.signer.clone();
        let recorder = self.recorder.clone();
        let tx_id = tx.tx_id.clone();
        let handle = tokio::spawn(async move {
            let result = signer.sign(&tx, required).await;
            if let Err(e) = recorder.record(&tx.tx_id, result).await {
                warn!(tx_id = %tx.tx_id, error = %e, "[cg-04] failed to record signature");
            }
        });
        signing.insert(tx_id, handle);
    }

    async fn check_sign_timeout(&self, record: PersistedTransaction) -> Result<bool, LifecycleError> {
        let now = self.time.now_millis();
        if now.saturating_sub(record.last_status_update) <= self.config.sign_timeout_ms() {
            return Ok(false);
        }
        let tx_id = record.tx_id.clone();
        self.ledger
            .update_transaction(transition(record, TransactionStatus::SignFailed, now)?)
            .await?;
        warn!(tx_id = %tx_id, "[cg-04] signing timed out");
        Ok(true)
    }

    async fn submit(&self, record: PersistedTransaction) -> Result<bool, LifecycleError> {
        let tx = record.chain_transaction()?;
        let adapter = self.chains.get(&tx.chain)?;
        let Some(signed) = record.signed_bytes.as_deref() else {
            return Err(LifecycleError::Signing(format!(
                "{} is signed without signature bytes",
                tx.tx_id
            )));
        };

        match adapter.submit(&tx, signed).await {
            Ok(_) => {
                let now = self.time.now_millis();
                let mut record = transition(record, TransactionStatus::Sent, now)?;
                record.last_check = now;
                self.ledger.update_transaction(record).await?;
                info!(tx_id = %tx.tx_id, chain = %tx.chain, "[cg-04] transaction sent");
                Ok(true)
            }
            Err(e) if e.is_transient() => Err(e.into()),
            Err(e) => {
                // Rejected: invalid only if an input is gone, otherwise retry.
                if adapter.are_inputs_still_valid(&tx).await? {
                    return Err(e.into());
                }
                self.invalidate(record).await?;
                Ok(true)
            }
        }
    }

    async fn check_sent(&self, record: PersistedTransaction) -> Result<bool, LifecycleError> {
        let tx = record.chain_transaction()?;
        let adapter = self.chains.get(&tx.chain)?;
        let now = self.time.now_millis();

        if let Some(depth) = adapter.get_confirmation_depth(&tx.tx_id).await? {
            if depth >= adapter.required_confirmations() {
                self.complete(record).await?;
                return Ok(true);
            }
            debug!(tx_id = %tx.tx_id, depth, "[cg-04] waiting for confirmations");
            self.touch(record, now).await?;
            return Ok(false);
        }

        if now.saturating_sub(record.last_status_update) < self.config.resubmit_window_ms() {
            self.touch(record, now).await?;
            return Ok(false);
        }
        if !adapter.are_inputs_still_valid(&tx).await? {
            self.invalidate(record).await?;
            return Ok(true);
        }
        if record.signed_bytes.is_none() {
            warn!(tx_id = %tx.tx_id, "[cg-04] dropped without signature bytes, signing again");
            self.start_signing(record).await?;
            return Ok(true);
        }
        self.resubmit(adapter.as_ref(), &tx, record, now).await?;
        Ok(false)
    }

    async fn reconcile_sign_failed(
        &self,
        record: PersistedTransaction,
    ) -> Result<bool, LifecycleError> {
        let tx = record.chain_transaction()?;
        let adapter = self.chains.get(&tx.chain)?;
        let now = self.time.now_millis();

        match adapter.get_confirmation_depth(&tx.tx_id).await? {
            Some(depth) if depth >= adapter.required_confirmations() => {
                self.complete(record).await?;
            }
            Some(_) if record.signed_bytes.is_some() => {
                let mut record = transition(record, TransactionStatus::Sent, now)?;
                record.last_check = now;
                self.ledger.update_transaction(record).await?;
                info!(tx_id = %tx.tx_id, "[cg-04] found on chain after failed signing");
            }
            Some(depth) => {
                // Another guard's submission; nothing to resubmit if it drops.
                debug!(tx_id = %tx.tx_id, depth, "[cg-04] unsigned here, waiting on chain");
                self.touch(record, now).await?;
                return Ok(false);
            }
            None if adapter.are_inputs_still_valid(&tx).await? => {
                info!(tx_id = %tx.tx_id, "[cg-04] retrying signing");
                self.start_signing(record).await?;
            }
            None => self.invalidate(record).await?,
        }
        Ok(true)
    }

    async fn resubmit(
        &self,
        adapter: &dyn ChainAdapter,
        tx: &ChainTransaction,
        mut record: PersistedTransaction,
        now: u64,
    ) -> Result<(), LifecycleError> {
        let Some(signed) = record.signed_bytes.as_deref() else {
            return Err(LifecycleError::Signing(format!(
                "{} is sent without signature bytes",
                tx.tx_id
            )));
        };
        adapter.submit(tx, signed).await?;
        record.last_check = now;
        record.last_status_update = now;
        self.ledger.update_transaction(record).await?;
        info!(tx_id = %tx.tx_id, "[cg-04] transaction resubmitted");
        Ok(())
    }

    async fn touch(&self, mut record: PersistedTransaction, now: u64) -> Result<(), LifecycleError> {
        record.last_check = now;
        self.ledger.update_transaction(record).await?;
        Ok(())
    }

    async fn complete(&self, record: PersistedTransaction) -> Result<(), LifecycleError> {
        let (tx_id, event_id, tx_type) = (
            record.tx_id.clone(),
            record.event_id.clone(),
            record.tx_type,
        );
        let now = self.time.now_millis();
        let mut record = transition(record, TransactionStatus::Completed, now)?;
        record.last_check = now;
        self.ledger.update_transaction(record).await?;

        self.move_event(&event_id, tx_type.in_progress_event_status(), tx_type.completed_event_status())
            .await?;
        info!(tx_id = %tx_id, event_id = %event_id, "[cg-04] transaction completed");
        Ok(())
    }

    async fn invalidate(&self, record: PersistedTransaction) -> Result<(), LifecycleError> {
        let (tx_id, event_id, tx_type) = (
            record.tx_id.clone(),
            record.event_id.clone(),
            record.tx_type,
        );
        let record = transition(record, TransactionStatus::Invalid, self.time.now_millis())?;
        self.ledger.update_transaction(record).await?;

        self.move_event(&event_id, tx_type.in_progress_event_status(), tx_type.pending_event_status())
            .await?;
        warn!(tx_id = %tx_id, event_id = %event_id, "[cg-04] transaction invalid, event rolled back");
        Ok(())
    }

    /// Move the event to `to` only if it is still in `from`.
    async fn move_event(
        &self,
        event_id: &EventId,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<(), LifecycleError> {
        match self.ledger.event_by_id(event_id).await? {
            Some(event) if event.status == from => {
                self.ledger.set_event_status(event_id, to).await?;
                Ok(())
            }
            Some(event) => {
                debug!(event_id = %event_id, status = ?event.status, "[cg-04] event already moved on");
                Ok(())
            }
            None => {
                warn!(event_id = %event_id, "[cg-04] transaction for unknown event");
                Ok(())
            }
        }
    }
}
