//! Partitions, double spends and dropped transactions.

use super::harness::{Harness, START};
use shared_types::{ChainAdapter, EventStatus, TransactionStatus, TransactionType, TransportId};

const RESUBMIT_MS: u64 = 600_000;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_quorum_completes_without_one_guard() {
    let harness = Harness::new(5, 3).await;
    harness.seed().await;

    // The proposer for the current turn must stay reachable.
    let proposer = harness.guards()[0].agreement.guard_turn();
    let isolated = (proposer + 1) % 5;
    harness
        .devnet
        .network()
        .partition(&TransportId::from(format!("guard-{isolated}")));

    let reachable: Vec<usize> = (0..5).filter(|i| *i != isolated).collect();
    harness.complete(&reachable, TransactionType::Payment).await;
    harness.wait_event(&reachable, EventStatus::PendingReward).await;

    // Still partitioned, so the isolated guard never saw the approval.
    assert_eq!(harness.tx_status(isolated, TransactionType::Payment).await, None);
    assert_eq!(harness.event_status(isolated).await, EventStatus::PendingPayment);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_isolated_guard_catches_up_on_resent_approval() {
    let harness = Harness::new(3, 2).await;
    harness.seed().await;

    let proposer = harness.guards()[0].agreement.guard_turn();
    let isolated = (proposer + 1) % 3;
    let isolated_id = TransportId::from(format!("guard-{isolated}"));
    harness.devnet.network().partition(&isolated_id);

    let reachable: Vec<usize> = (0..3).filter(|i| *i != isolated).collect();
    harness.agree().await;
    harness
        .wait_status(&reachable, TransactionType::Payment, TransactionStatus::Approved)
        .await;
    assert_eq!(harness.event_status(isolated).await, EventStatus::PendingPayment);

    harness.devnet.network().heal(&isolated_id);
    harness.guards()[proposer]
        .agreement
        .resend_requests()
        .await
        .unwrap();
    harness
        .wait_status(&[isolated], TransactionType::Payment, TransactionStatus::Approved)
        .await;
    harness.wait_event(&[0, 1, 2], EventStatus::InPayment).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_payment_is_resubmitted() {
    let harness = Harness::new(3, 2).await;
    let all = [0, 1, 2];
    harness.seed().await;

    harness.agree().await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Approved).await;
    harness.cycle(&all).await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Signed).await;
    harness.cycle(&all).await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Sent).await;

    let tx_id = harness.transaction(0, TransactionType::Payment).await.unwrap().tx_id;
    assert!(harness.chain().drop_mempool(&tx_id));

    harness.clock.set(START + RESUBMIT_MS);
    harness.cycle(&[0]).await;
    assert_eq!(
        harness.chain().get_confirmation_depth(&tx_id).await.unwrap(),
        Some(0)
    );

    harness.chain().mine(2);
    harness.cycle(&all).await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Completed).await;
    harness.wait_event(&all, EventStatus::PendingReward).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_spend_rolls_event_back() {
    let harness = Harness::new(3, 2).await;
    let all = [0, 1, 2];
    harness.seed().await;

    harness.agree().await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Approved).await;
    harness.wait_event(&all, EventStatus::InPayment).await;
    harness.cycle(&all).await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Signed).await;

    // The funding box is spent behind the bridge's back before submission.
    harness.chain().spend_box("genesis-box");
    harness.cycle(&all).await;
    harness.wait_status(&all, TransactionType::Payment, TransactionStatus::Invalid).await;
    harness.wait_event(&all, EventStatus::PendingPayment).await;
}
