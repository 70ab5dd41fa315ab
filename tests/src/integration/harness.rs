//! Devnet harness with a manual clock and background message delivery.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use node_runtime::{Devnet, GuardConfig, GuardContainer};
use shared_types::{
    ChainId, EventId, EventStatus, EventTrigger, LedgerStore, ManualTimeSource,
    PersistedTransaction, SimulatedChain, TransactionStatus, TransactionType,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const START: u64 = 1_000_000;
pub const EVENT: &str = "event-1";

pub fn event() -> EventTrigger {
    EventTrigger {
        id: EventId::from(EVENT),
        from_chain: ChainId::from("cardano"),
        to_chain: ChainId::from("ergo"),
        to_address: "alice".into(),
        amount: 10_000,
        bridge_fee: 250,
        network_fee: 50,
        source_tx_id: "lock-1".into(),
    }
}

/// Poll `check` until it holds; panics after five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub struct Harness {
    pub devnet: Devnet,
    pub clock: ManualTimeSource,
    shutdown: watch::Sender<bool>,
    delivery: Option<JoinHandle<()>>,
}

impl Harness {
    /// `guards` guards requiring `required` signatures, handshake done.
    pub async fn new(guards: usize, required: usize) -> Self {
        let harness = Self::unbound(guards, required);
        harness.devnet.register_all().await;
        harness.wait_bound().await;
        harness
    }

    /// Devnet with delivery running but no handshake yet.
    pub fn unbound(guards: usize, required: usize) -> Self {
        let mut config = GuardConfig::default();
        config.devnet.guards = guards;
        config.devnet.funding = 50_000;
        config.devnet.confirmations = 2;
        config.agreement.required_sign = required;

        let clock = ManualTimeSource::new(START);
        let devnet = Devnet::new(&config, Arc::new(clock.clone())).unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let network = devnet.network().clone();
        let delivery = tokio::spawn(async move { network.run(shutdown_rx).await });
        Self {
            devnet,
            clock,
            shutdown,
            delivery: Some(delivery),
        }
    }

    pub async fn wait_bound(&self) {
        eventually("every guard to bind every peer", || async move {
            self.guards()
                .iter()
                .all(|g| g.registry.unbound_peers().is_empty())
        })
        .await;
    }

    pub fn guards(&self) -> &[Arc<GuardContainer>] {
        self.devnet.guards()
    }

    pub fn chain(&self) -> &SimulatedChain {
        &self.devnet.chains()[0]
    }

    pub async fn seed(&self) {
        self.devnet.seed_event(event()).await.unwrap();
    }

    /// Every guard tries to propose; only the turn holder does.
    pub async fn agree(&self) {
        for guard in self.guards() {
            guard.agreement.process_pending_events().await.unwrap();
        }
    }

    /// One lifecycle cycle on every guard in `indices`.
    pub async fn cycle(&self, indices: &[usize]) {
        for index in indices {
            self.guards()[*index]
                .lifecycle
                .process_transactions()
                .await
                .unwrap();
        }
    }

    pub async fn event_status(&self, index: usize) -> EventStatus {
        self.guards()[index]
            .ledger
            .event_by_id(&EventId::from(EVENT))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    /// The transaction of `tx_type` recorded by guard `index`.
    pub async fn transaction(
        &self,
        index: usize,
        tx_type: TransactionType,
    ) -> Option<PersistedTransaction> {
        let all = [
            TransactionStatus::Approved,
            TransactionStatus::InSign,
            TransactionStatus::Signed,
            TransactionStatus::SignFailed,
            TransactionStatus::Sent,
            TransactionStatus::Invalid,
            TransactionStatus::Completed,
        ];
        self.guards()[index]
            .ledger
            .transactions_by_status(&all)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.tx_type == tx_type)
    }

    pub async fn tx_status(&self, index: usize, tx_type: TransactionType) -> Option<TransactionStatus> {
        self.transaction(index, tx_type).await.map(|t| t.status)
    }

    /// Wait until every guard in `indices` holds the transaction in `status`.
    pub async fn wait_status(&self, indices: &[usize], tx_type: TransactionType, status: TransactionStatus) {
        eventually(&format!("{tx_type:?} to reach {status}"), || async move {
            for index in indices {
                if self.tx_status(*index, tx_type).await != Some(status) {
                    return false;
                }
            }
            true
        })
        .await;
    }

    /// Wait until every guard in `indices` shows the event in `status`.
    pub async fn wait_event(&self, indices: &[usize], status: EventStatus) {
        eventually(&format!("event to reach {status:?}"), || async move {
            for index in indices {
                if self.event_status(*index).await != status {
                    return false;
                }
            }
            true
        })
        .await;
    }

    /// Agree, sign, send and confirm the transaction of `tx_type`.
    pub async fn complete(&self, indices: &[usize], tx_type: TransactionType) {
        self.agree().await;
        self.wait_status(indices, tx_type, TransactionStatus::Approved).await;

        self.cycle(indices).await;
        self.wait_status(indices, tx_type, TransactionStatus::Signed).await;

        self.cycle(indices).await;
        self.wait_status(indices, tx_type, TransactionStatus::Sent).await;

        self.chain().mine(2);
        self.cycle(indices).await;
        self.wait_status(indices, tx_type, TransactionStatus::Completed).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        self.devnet.abort_signing();
        if let Some(delivery) = self.delivery.take() {
            delivery.abort();
        }
    }
}
