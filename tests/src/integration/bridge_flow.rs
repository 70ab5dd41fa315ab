//! An event from verification to completion across five guards.

use super::harness::Harness;
use shared_types::{EventStatus, TransactionStatus, TransactionType};

const ALL: [usize; 5] = [0, 1, 2, 3, 4];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_event_pays_out_and_rewards() {
    let harness = Harness::new(5, 3).await;
    harness.seed().await;
    let funds = harness.chain().spendable_value();

    harness.complete(&ALL, TransactionType::Payment).await;
    harness.wait_event(&ALL, EventStatus::PendingReward).await;

    // Every guard agreed on the same payment transaction.
    let payment = harness.transaction(0, TransactionType::Payment).await.unwrap();
    for index in ALL {
        let record = harness.transaction(index, TransactionType::Payment).await.unwrap();
        assert_eq!(record.tx_id, payment.tx_id);
        assert_eq!(record.tx_json, payment.tx_json);
        assert!(record.signed_bytes.is_some());
    }

    harness.complete(&ALL, TransactionType::Reward).await;
    harness.wait_event(&ALL, EventStatus::Completed).await;

    // Payment 9_700 and reward 250 left the lock address.
    assert_eq!(harness.chain().spendable_value(), funds - 9_700 - 250);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_processing_is_idempotent_after_completion() {
    let harness = Harness::new(3, 2).await;
    harness.seed().await;
    harness.complete(&[0, 1, 2], TransactionType::Payment).await;

    // Re-running every stage changes nothing for the completed payment.
    harness.cycle(&[0, 1, 2]).await;
    for index in 0..3 {
        assert_eq!(
            harness.tx_status(index, TransactionType::Payment).await,
            Some(TransactionStatus::Completed)
        );
        assert_eq!(harness.event_status(index).await, EventStatus::PendingReward);
    }
}
