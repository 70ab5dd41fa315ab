use super::*;
use crate::adapters::AgreementHandler;
use async_trait::async_trait;
use cg_01_peer_registry::PeerRegistry;
use shared_bus::InMemoryNetwork;
use shared_types::{
    EventId, EventTrigger, GuardKeyPair, ManualTimeSource, SimulatedChain, TransactionStatus,
};
use std::collections::HashMap;
use std::time::Duration;

// Mock ledger over plain maps.
#[derive(Default)]
struct MockLedger {
    events: Mutex<HashMap<EventId, EventRecord>>,
    transactions: Mutex<HashMap<TxId, PersistedTransaction>>,
}

impl MockLedger {
    fn event_status(&self, id: &str) -> EventStatus {
        self.events.lock()[&EventId::from(id)].status
    }

    fn agreed(&self) -> Vec<PersistedTransaction> {
        self.transactions.lock().values().cloned().collect()
    }
}

#[async_trait]
impl LedgerStore for MockLedger {
    async fn insert_event(&self, record: EventRecord) -> Result<(), LedgerError> {
        self.events.lock().insert(record.event.id.clone(), record);
        Ok(())
    }

    async fn event_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, LedgerError> {
        Ok(self.events.lock().get(id).cloned())
    }

    async fn events_by_status(
        &self,
        statuses: &[EventStatus],
    ) -> Result<Vec<EventRecord>, LedgerError> {
        Ok(self
            .events
            .lock()
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn set_event_status(&self, id: &EventId, status: EventStatus) -> Result<(), LedgerError> {
        let mut events = self.events.lock();
        let record = events
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn insert_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError> {
        let mut transactions = self.transactions.lock();
        if transactions.contains_key(&tx.tx_id) {
            return Err(LedgerError::Duplicate(tx.tx_id.to_string()));
        }
        transactions.insert(tx.tx_id.clone(), tx);
        Ok(())
    }

    async fn update_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError> {
        self.transactions.lock().insert(tx.tx_id.clone(), tx);
        Ok(())
    }

    async fn transaction_by_id(
        &self,
        id: &TxId,
    ) -> Result<Option<PersistedTransaction>, LedgerError> {
        Ok(self.transactions.lock().get(id).cloned())
    }

    async fn transactions_by_status(
        &self,
        statuses: &[TransactionStatus],
    ) -> Result<Vec<PersistedTransaction>, LedgerError> {
        Ok(self
            .transactions
            .lock()
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect())
    }
}

const TURN_MS: u64 = 1_000;

fn keypair(index: usize) -> GuardKeyPair {
    GuardKeyPair::from_seed([index as u8 + 1; 32])
}

fn transport(index: usize) -> TransportId {
    TransportId::from(format!("guard-{index}"))
}

fn event(amount: u64) -> EventTrigger {
    EventTrigger {
        id: EventId::from("event-1"),
        from_chain: ChainId::from("cardano"),
        to_chain: ChainId::from("ergo"),
        to_address: "recipient".into(),
        amount,
        bridge_fee: 500,
        network_fee: 100,
        source_tx_id: "lock-1".into(),
    }
}

fn funded_chain(boxes: &[(&str, u64)]) -> Arc<SimulatedChain> {
    let chain = Arc::new(SimulatedChain::new("ergo", 2));
    for (id, value) in boxes {
        chain.fund(id, *value);
    }
    chain
}

struct Guard {
    service: Arc<AgreementService>,
    ledger: Arc<MockLedger>,
    chain: Arc<SimulatedChain>,
}

struct Cluster {
    network: InMemoryNetwork,
    clock: Arc<ManualTimeSource>,
    guards: Vec<Guard>,
}

impl Cluster {
    /// `n` guards, each with its own identically funded chain view and a
    /// ledger holding `event(10_000)`. Guard 0 holds the first turn.
    async fn new(n: usize, required_sign: usize) -> Self {
        let network = InMemoryNetwork::new();
        let clock = Arc::new(ManualTimeSource::new(0));
        let keys: Vec<_> = (0..n).map(|i| keypair(i).public_key()).collect();

        let mut guards = Vec::new();
        for index in 0..n {
            let dialer = Arc::new(network.dialer(transport(index)));
            let registry = Arc::new(
                PeerRegistry::new(index, keypair(index), keys.clone(), dialer.clone()).unwrap(),
            );
            for peer in (0..n).filter(|p| *p != index) {
                registry.bind_transport(peer, transport(peer)).unwrap();
            }
            let chain = funded_chain(&[("box-a", 10_000), ("box-b", 12_000)]);
            let ledger = Arc::new(MockLedger::default());
            ledger
                .insert_event(EventRecord::pending(event(10_000)))
                .await
                .unwrap();

            let service = Arc::new(AgreementService::new(AgreementDependencies {
                directory: registry,
                dialer: dialer.clone(),
                chains: ChainAdapters::new().with(chain.clone()),
                ledger: ledger.clone(),
                time: clock.clone(),
                config: AgreementConfig {
                    required_sign,
                    turn_duration: Duration::from_millis(TURN_MS),
                    reward_chain: ChainId::from("ergo"),
                },
            }));
            dialer.subscribe(AGREEMENT_CHANNEL, Arc::new(AgreementHandler::new(service.clone())));
            guards.push(Guard {
                service,
                ledger,
                chain,
            });
        }
        Self {
            network,
            clock,
            guards,
        }
    }

    async fn candidate(&self) -> ChainTransaction {
        self.guards[0]
            .chain
            .build_candidate_transaction(&event(10_000), TransactionType::Payment)
            .await
            .unwrap()
    }
}

fn vote(tx: &ChainTransaction, from: usize) -> AgreementVote {
    AgreementVote {
        tx_id: tx.tx_id.clone(),
        guard_index: from,
        signature: keypair(from).sign(tx.to_json().unwrap().as_bytes()),
    }
}

fn request(tx: &ChainTransaction, from: usize) -> Signed<AgreementRequest> {
    Signed::sign(
        AgreementRequest {
            tx_json: tx.to_json().unwrap(),
        },
        from,
        &keypair(from),
    )
    .unwrap()
}

#[tokio::test]
async fn test_identical_inputs_yield_identical_candidates() {
    // Funding order differs; box selection does not depend on it.
    let a = funded_chain(&[("box-b", 8_000), ("box-a", 6_000)]);
    let b = funded_chain(&[("box-a", 6_000), ("box-b", 8_000)]);
    let from_a = a
        .build_candidate_transaction(&event(10_000), TransactionType::Payment)
        .await
        .unwrap();
    let from_b = b
        .build_candidate_transaction(&event(10_000), TransactionType::Payment)
        .await
        .unwrap();
    assert_eq!(from_a.to_json().unwrap(), from_b.to_json().unwrap());
}

#[tokio::test]
async fn test_agreement_over_the_network() {
    let cluster = Cluster::new(4, 3).await;
    assert_eq!(cluster.guards[0].service.guard_turn(), 0);

    assert_eq!(cluster.guards[0].service.process_pending_events().await.unwrap(), 1);
    cluster.network.flush().await;

    let expected = cluster.candidate().await;
    for guard in &cluster.guards {
        let agreed = guard.ledger.agreed();
        assert_eq!(agreed.len(), 1);
        assert_eq!(agreed[0].tx_id, expected.tx_id);
        assert_eq!(agreed[0].status, TransactionStatus::Approved);
        assert_eq!(agreed[0].required_sign, 3);
        assert_eq!(guard.ledger.event_status("event-1"), EventStatus::InPayment);
    }
}

#[tokio::test]
async fn test_quorum_is_reached_exactly_at_required_votes() {
    let cluster = Cluster::new(7, 5).await;
    let proposer = &cluster.guards[0];
    let tx = cluster.candidate().await;
    assert!(proposer.service.propose(tx.clone()).await.unwrap());

    // Own vote plus three peers: four of five.
    for peer in 1..=3 {
        proposer
            .service
            .handle_response(&transport(peer), &vote(&tx, peer))
            .await
            .unwrap();
    }
    assert_eq!(proposer.service.vote_count(&tx.tx_id), Some(4));
    assert!(proposer.ledger.agreed().is_empty());
    assert_eq!(proposer.ledger.event_status("event-1"), EventStatus::PendingPayment);

    proposer
        .service
        .handle_response(&transport(4), &vote(&tx, 4))
        .await
        .unwrap();
    assert_eq!(proposer.ledger.agreed()[0].tx_id, tx.tx_id);
    assert_eq!(proposer.ledger.event_status("event-1"), EventStatus::InPayment);
    assert_eq!(proposer.service.vote_count(&tx.tx_id), None);
}

#[tokio::test]
async fn test_invalid_votes_are_not_counted() {
    let cluster = Cluster::new(4, 4).await;
    let proposer = &cluster.guards[0];
    let tx = cluster.candidate().await;
    proposer.service.propose(tx.clone()).await.unwrap();

    let mut forged = vote(&tx, 1);
    forged.signature = keypair(2).sign(tx.to_json().unwrap().as_bytes());
    assert!(matches!(
        proposer.service.handle_response(&transport(1), &forged).await,
        Err(AgreementError::Registry(RegistryError::InvalidSignature(1)))
    ));

    // Genuine vote relayed by another guard.
    assert!(matches!(
        proposer.service.handle_response(&transport(2), &vote(&tx, 1)).await,
        Err(AgreementError::Registry(RegistryError::SenderMismatch { index: 1, .. }))
    ));

    // Same vote twice counts once.
    proposer.service.handle_response(&transport(1), &vote(&tx, 1)).await.unwrap();
    proposer.service.handle_response(&transport(1), &vote(&tx, 1)).await.unwrap();
    assert_eq!(proposer.service.vote_count(&tx.tx_id), Some(2));
}

#[tokio::test]
async fn test_request_outside_turn_is_rejected() {
    let cluster = Cluster::new(3, 2).await;
    let tx = cluster.candidate().await;

    let err = cluster.guards[2]
        .service
        .handle_request(&transport(1), &request(&tx, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementError::NotProposerTurn {
            sender: 1,
            turn_holder: 0
        }
    ));
    assert_eq!(cluster.network.pending(), 0);

    assert!(matches!(
        cluster.guards[1].service.propose(tx).await,
        Err(AgreementError::NotMyTurn { own: 1, .. })
    ));
}

#[tokio::test]
async fn test_one_endorsement_per_event() {
    let cluster = Cluster::new(3, 2).await;
    let voter = &cluster.guards[1];
    let first = cluster.candidate().await;

    // A different valid candidate spending only box-b.
    let second = funded_chain(&[("box-b", 12_000)])
        .build_candidate_transaction(&event(10_000), TransactionType::Payment)
        .await
        .unwrap();
    assert_ne!(first.tx_id, second.tx_id);

    voter.service.handle_request(&transport(0), &request(&first, 0)).await.unwrap();
    assert_eq!(cluster.network.pending(), 1);

    voter.service.handle_request(&transport(0), &request(&second, 0)).await.unwrap();
    assert_eq!(cluster.network.pending(), 1, "conflicting candidate gets no vote");

    voter.service.handle_request(&transport(0), &request(&first, 0)).await.unwrap();
    assert_eq!(cluster.network.pending(), 2, "re-delivery gets the same vote");
}

#[tokio::test]
async fn test_candidate_not_matching_event_gets_no_vote() {
    let cluster = Cluster::new(3, 2).await;
    let wrong_amount = cluster.guards[0]
        .chain
        .build_candidate_transaction(&event(9_000), TransactionType::Payment)
        .await
        .unwrap();

    let err = cluster.guards[1]
        .service
        .handle_request(&transport(0), &request(&wrong_amount, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AgreementError::InvalidCandidate(_)));
    assert!(err.is_rejection());
    assert_eq!(cluster.network.pending(), 0);
}

#[tokio::test]
async fn test_candidate_for_agreed_event_gets_no_vote() {
    let cluster = Cluster::new(3, 2).await;
    let tx = cluster.candidate().await;
    let voter = &cluster.guards[1];
    assert!(voter.service.record_agreement(&tx).await.unwrap());

    assert!(matches!(
        voter.service.handle_request(&transport(0), &request(&tx, 0)).await,
        Err(AgreementError::EventNotPending { .. })
    ));
}

#[tokio::test]
async fn test_turn_change_discards_open_proposals() {
    let cluster = Cluster::new(3, 3).await;
    let proposer = &cluster.guards[0];
    let tx = cluster.candidate().await;
    proposer.service.propose(tx.clone()).await.unwrap();

    assert_eq!(proposer.service.resend_requests().await.unwrap(), 1);

    cluster.clock.advance(TURN_MS);
    proposer.service.on_tick();
    assert_eq!(proposer.service.guard_turn(), 1);
    assert_eq!(proposer.service.vote_count(&tx.tx_id), None);
    assert_eq!(proposer.service.resend_requests().await.unwrap(), 0);
    assert_eq!(proposer.service.process_pending_events().await.unwrap(), 0);
}

#[tokio::test]
async fn test_approval_requires_quorum_of_valid_endorsements() {
    let cluster = Cluster::new(4, 3).await;
    let tx = cluster.candidate().await;
    let tx_json = tx.to_json().unwrap();
    let endorse = |from: usize, signer: usize| shared_types::GuardVoteSignature {
        guard_index: from,
        signature: keypair(signer).sign(tx_json.as_bytes()),
    };

    let weak = AgreementApproval {
        tx_id: tx.tx_id.clone(),
        tx_json: tx_json.clone(),
        // Guard 2's endorsement is forged by guard 0; guard 0 counted twice.
        guards_signatures: vec![endorse(0, 0), endorse(0, 0), endorse(2, 0)],
    };
    let receiver = &cluster.guards[3];
    assert!(matches!(
        receiver.service.handle_approval(&transport(0), &weak).await,
        Err(AgreementError::InsufficientEndorsements { valid: 1, required: 3 })
    ));
    assert!(receiver.ledger.agreed().is_empty());

    let strong = AgreementApproval {
        guards_signatures: vec![endorse(0, 0), endorse(1, 1), endorse(2, 2)],
        ..weak
    };
    receiver.service.handle_approval(&transport(0), &strong).await.unwrap();
    assert_eq!(receiver.ledger.agreed()[0].tx_id, tx.tx_id);

    // A second announcement is a no-op.
    receiver.service.handle_approval(&transport(0), &strong).await.unwrap();
    assert_eq!(receiver.ledger.agreed().len(), 1);
}

#[tokio::test]
async fn test_first_quorum_wins() {
    let cluster = Cluster::new(3, 2).await;
    let guard = &cluster.guards[0];
    let first = cluster.candidate().await;
    let second = funded_chain(&[("box-b", 12_000)])
        .build_candidate_transaction(&event(10_000), TransactionType::Payment)
        .await
        .unwrap();

    assert!(guard.service.record_agreement(&first).await.unwrap());
    assert!(!guard.service.record_agreement(&second).await.unwrap());
    let agreed = guard.ledger.agreed();
    assert_eq!(agreed.len(), 1);
    assert_eq!(agreed[0].tx_id, first.tx_id);
}

#[tokio::test]
async fn test_pending_reward_event_gets_reward_candidate() {
    let cluster = Cluster::new(3, 1).await;
    let guard = &cluster.guards[0];
    guard
        .ledger
        .set_event_status(&EventId::from("event-1"), EventStatus::PendingReward)
        .await
        .unwrap();

    // Quorum of one: the proposer's own vote agrees immediately.
    assert_eq!(guard.service.process_pending_events().await.unwrap(), 1);
    let agreed = guard.ledger.agreed();
    assert_eq!(agreed[0].tx_type, TransactionType::Reward);
    assert_eq!(guard.ledger.event_status("event-1"), EventStatus::InReward);
}

#[tokio::test]
async fn test_missed_approval_is_resent_until_event_moves_on() {
    let cluster = Cluster::new(3, 2).await;
    let proposer = &cluster.guards[0];
    cluster.network.partition(&transport(2));

    assert_eq!(proposer.service.process_pending_events().await.unwrap(), 1);
    cluster.network.flush().await;
    assert_eq!(proposer.ledger.event_status("event-1"), EventStatus::InPayment);
    assert!(cluster.guards[2].ledger.agreed().is_empty());

    // The approval outlives the proposer turn.
    cluster.network.heal(&transport(2));
    cluster.clock.advance(TURN_MS);
    assert_eq!(proposer.service.resend_requests().await.unwrap(), 1);
    cluster.network.flush().await;

    let late = &cluster.guards[2];
    assert_eq!(late.ledger.agreed()[0].tx_id, proposer.ledger.agreed()[0].tx_id);
    assert_eq!(late.ledger.event_status("event-1"), EventStatus::InPayment);

    // Once the payment completes locally there is nothing left to announce.
    proposer
        .ledger
        .set_event_status(&EventId::from("event-1"), EventStatus::PendingReward)
        .await
        .unwrap();
    assert_eq!(proposer.service.resend_requests().await.unwrap(), 0);
    assert_eq!(proposer.service.resend_requests().await.unwrap(), 0);
}
