//! Peer binding over the in-memory network.

use super::harness::{eventually, Harness};
use shared_types::TransportId;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handshake_binds_every_pair() {
    let harness = Harness::unbound(4, 3);
    for guard in harness.guards() {
        assert_eq!(guard.registry.unbound_peers().len(), 3);
    }

    harness.devnet.register_all().await;
    harness.wait_bound().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partitioned_guard_binds_after_heal() {
    let harness = Harness::unbound(3, 2);
    let isolated = TransportId::from("guard-2");
    harness.devnet.network().partition(&isolated);

    harness.devnet.register_all().await;
    let guards = harness.guards();
    eventually("guards 0 and 1 to bind each other", || async move {
        guards[0].registry.unbound_peers() == vec![2]
            && guards[1].registry.unbound_peers() == vec![2]
    })
    .await;
    assert_eq!(harness.guards()[2].registry.unbound_peers(), vec![0, 1]);

    harness.devnet.network().heal(&isolated);
    harness.guards()[2].registry.register().await.unwrap();
    harness.wait_bound().await;
}
