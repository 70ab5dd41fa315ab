//! # Peer Registry Service
//!
//! Owns this guard's identity, the static guard list and the transport
//! binding table, and runs the handshake that binds transport identities to
//! guard indices.
//!
//! ## Handshake
//!
//! ```text
//! A                                     B
//! │ register{nonceA, myId=A}  ───────▶  │  record challenge (A, nonceB)
//! │  ◀──────── approve{nonceA, nonceToSign=nonceB, myId=B}
//! │ bind B                              │
//! │ approve{nonceB, myId=A}   ───────▶  │  bind A
//! ```
//!
//! Handshake messages are accepted only if the signature verifies against
//! the claimed index's key and the transport sender equals the claimed
//! `myId`.

use crate::domain::{BindOutcome, PeerSet, RegistryError, TransportBindings};
use crate::ports::GuardDirectory;
use parking_lot::RwLock;
use shared_bus::{Dialer, HANDSHAKE_CHANNEL};
use shared_types::{
    ApprovePayload, GuardIndex, GuardKeyPair, GuardMessage, GuardPublicKey, GuardSignature,
    MessagePayload, RegisterPayload, Signed, TransportId,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Guard identity registry.
pub struct PeerRegistry {
    own_index: GuardIndex,
    keypair: GuardKeyPair,
    peers: PeerSet,
    bindings: RwLock<TransportBindings>,
    dialer: Arc<dyn Dialer>,
}

impl PeerRegistry {
    /// Create the registry for guard `own_index` of the ordered key list.
    pub fn new(
        own_index: GuardIndex,
        keypair: GuardKeyPair,
        public_keys: Vec<GuardPublicKey>,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, RegistryError> {
        let peers = PeerSet::new(public_keys);
        let listed = peers
            .get(own_index)
            .ok_or(RegistryError::UnknownGuard(own_index))?;
        if listed.public_key != keypair.public_key() {
            return Err(RegistryError::KeyMismatch(own_index));
        }
        Ok(Self {
            own_index,
            keypair,
            peers,
            bindings: RwLock::new(TransportBindings::new()),
            dialer,
        })
    }

    /// Broadcast a fresh registration nonce under the local identity.
    pub async fn register(&self) -> Result<(), RegistryError> {
        let nonce = Uuid::new_v4().to_string();
        self.bindings.write().record_registration(nonce.clone());

        let payload = RegisterPayload {
            nonce,
            my_id: self.dialer.local_id().clone(),
        };
        let message = GuardMessage::Register(self.sign_payload(payload)?);
        self.dialer
            .send_message(HANDSHAKE_CHANNEL, message.to_json()?, None)
            .await?;
        debug!(guard_index = self.own_index, "[cg-01] registration broadcast");
        Ok(())
    }

    /// Answer a registration with a counter-challenge addressed to `sender`.
    pub async fn handle_register(
        &self,
        sender: &TransportId,
        message: &Signed<RegisterPayload>,
    ) -> Result<(), RegistryError> {
        let index = self.verify_handshake(sender, message, &message.payload.my_id)?;

        let nonce_to_sign = Uuid::new_v4().to_string();
        self.bindings
            .write()
            .record_challenge(index, sender.clone(), nonce_to_sign.clone());

        let reply = ApprovePayload {
            nonce: message.payload.nonce.clone(),
            nonce_to_sign: Some(nonce_to_sign),
            my_id: self.dialer.local_id().clone(),
        };
        self.send_approve(reply, sender).await
    }

    /// Bind the sender if the echoed nonce is ours, then answer any
    /// counter-challenge so the binding becomes mutual.
    pub async fn handle_approve(
        &self,
        sender: &TransportId,
        message: &Signed<ApprovePayload>,
    ) -> Result<(), RegistryError> {
        let index = self.verify_handshake(sender, message, &message.payload.my_id)?;

        let outcome = {
            let mut bindings = self.bindings.write();
            let nonce = &message.payload.nonce;
            let matched = bindings.is_own_registration(nonce)
                || bindings.take_challenge(index, sender, nonce);
            if !matched {
                return Err(RegistryError::NonceMismatch(index));
            }
            bindings.bind(index, sender.clone())
        };

        match outcome {
            BindOutcome::New => {
                info!(guard_index = index, transport = %sender, "[cg-01] guard bound")
            }
            BindOutcome::Rebound(old) => info!(
                guard_index = index,
                old = %old,
                transport = %sender,
                "[cg-01] guard rebound to new transport"
            ),
            BindOutcome::Unchanged => {}
        }

        if let Some(nonce_to_sign) = &message.payload.nonce_to_sign {
            let reply = ApprovePayload {
                nonce: nonce_to_sign.clone(),
                nonce_to_sign: None,
                my_id: self.dialer.local_id().clone(),
            };
            self.send_approve(reply, sender).await?;
        }
        Ok(())
    }

    /// Bind a transport known out of band (static configuration).
    pub fn bind_transport(&self, index: GuardIndex, transport_id: TransportId) -> Result<(), RegistryError> {
        if index == self.own_index || self.peers.get(index).is_none() {
            return Err(RegistryError::UnknownGuard(index));
        }
        self.bindings.write().bind(index, transport_id);
        Ok(())
    }

    /// Other guards without a transport binding.
    pub fn unbound_peers(&self) -> Vec<GuardIndex> {
        let bindings = self.bindings.read();
        self.peers
            .iter()
            .map(|p| p.index)
            .filter(|i| *i != self.own_index && bindings.transport_of(*i).is_none())
            .collect()
    }

    fn sign_payload<T: MessagePayload>(&self, payload: T) -> Result<Signed<T>, RegistryError> {
        Ok(Signed::sign(payload, self.own_index, &self.keypair)?)
    }

    async fn send_approve(&self, payload: ApprovePayload, to: &TransportId) -> Result<(), RegistryError> {
        let message = GuardMessage::Approve(self.sign_payload(payload)?);
        self.dialer
            .send_message(HANDSHAKE_CHANNEL, message.to_json()?, Some(to))
            .await?;
        Ok(())
    }

    fn verify_handshake<T: MessagePayload>(
        &self,
        sender: &TransportId,
        message: &Signed<T>,
        claimed: &TransportId,
    ) -> Result<GuardIndex, RegistryError> {
        let index = message.guard_index;
        if index == self.own_index {
            return Err(RegistryError::UnknownGuard(index));
        }
        let peer = self
            .peers
            .get(index)
            .ok_or(RegistryError::UnknownGuard(index))?;
        if sender != claimed {
            return Err(RegistryError::SenderMismatch {
                index,
                expected: claimed.clone(),
                actual: sender.clone(),
            });
        }
        message
            .verify(&peer.public_key)
            .map_err(|_| RegistryError::InvalidSignature(index))?;
        Ok(index)
    }
}

impl GuardDirectory for PeerRegistry {
    fn own_index(&self) -> GuardIndex {
        self.own_index
    }

    fn guard_count(&self) -> usize {
        self.peers.len()
    }

    fn public_key(&self, index: GuardIndex) -> Option<GuardPublicKey> {
        self.peers.get(index).map(|p| p.public_key)
    }

    fn index_of(&self, key: &GuardPublicKey) -> Option<GuardIndex> {
        self.peers.index_of(key)
    }

    fn transport_of(&self, index: GuardIndex) -> Option<TransportId> {
        if index == self.own_index {
            return Some(self.dialer.local_id().clone());
        }
        self.bindings.read().transport_of(index).cloned()
    }

    fn bound_peers(&self) -> Vec<(GuardIndex, TransportId)> {
        let mut peers: Vec<_> = self
            .bindings
            .read()
            .iter()
            .filter(|(index, _)| **index != self.own_index)
            .map(|(index, transport)| (*index, transport.clone()))
            .collect();
        peers.sort_by_key(|(index, _)| *index);
        peers
    }

    fn sign_bytes(&self, bytes: &[u8]) -> GuardSignature {
        self.keypair.sign(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::HandshakeHandler;
    use shared_bus::InMemoryNetwork;

    struct Cluster {
        network: InMemoryNetwork,
        registries: Vec<Arc<PeerRegistry>>,
    }

    fn keypair(i: usize) -> GuardKeyPair {
        GuardKeyPair::from_seed([i as u8 + 1; 32])
    }

    fn cluster(n: usize) -> Cluster {
        let network = InMemoryNetwork::new();
        let keys: Vec<_> = (0..n).map(|i| keypair(i).public_key()).collect();
        let registries = (0..n)
            .map(|i| {
                let dialer = Arc::new(network.dialer(format!("peer-{i}")));
                let registry =
                    Arc::new(PeerRegistry::new(i, keypair(i), keys.clone(), dialer.clone()).unwrap());
                dialer.subscribe(
                    HANDSHAKE_CHANNEL,
                    Arc::new(HandshakeHandler::new(registry.clone())),
                );
                registry
            })
            .collect();
        Cluster {
            network,
            registries,
        }
    }

    #[test]
    fn test_rejects_foreign_key() {
        let network = InMemoryNetwork::new();
        let keys = vec![keypair(0).public_key(), keypair(1).public_key()];
        let result = PeerRegistry::new(0, keypair(5), keys, Arc::new(network.dialer("x")));
        assert!(matches!(result, Err(RegistryError::KeyMismatch(0))));
    }

    #[tokio::test]
    async fn test_register_then_approve_binds_both_sides() {
        let c = cluster(3);
        c.registries[0].register().await.unwrap();
        c.network.flush().await;

        for (i, registry) in c.registries.iter().enumerate().skip(1) {
            assert_eq!(
                registry.transport_of(0),
                Some(TransportId::from("peer-0")),
                "guard {i} bound guard 0"
            );
        }
        assert_eq!(c.registries[0].bound_peers().len(), 2);
        assert!(c.registries[0].unbound_peers().is_empty());
        // Guards 1 and 2 never talked to each other.
        assert_eq!(c.registries[1].unbound_peers(), vec![2]);
    }

    #[tokio::test]
    async fn test_non_matching_nonce_does_not_bind() {
        let c = cluster(2);
        let sender = TransportId::from("peer-1");
        let forged = Signed::sign(
            ApprovePayload {
                nonce: "never-issued".into(),
                nonce_to_sign: None,
                my_id: sender.clone(),
            },
            1,
            &keypair(1),
        )
        .unwrap();

        let result = c.registries[0].handle_approve(&sender, &forged).await;
        assert_eq!(result, Err(RegistryError::NonceMismatch(1)));
        assert_eq!(c.registries[0].transport_of(1), None);
    }

    #[tokio::test]
    async fn test_sender_must_match_claimed_id() {
        let c = cluster(2);
        let message = Signed::sign(
            RegisterPayload {
                nonce: "n".into(),
                my_id: TransportId::from("peer-1"),
            },
            1,
            &keypair(1),
        )
        .unwrap();
        let result = c.registries[0]
            .handle_register(&TransportId::from("spoofer"), &message)
            .await;
        assert!(matches!(result, Err(RegistryError::SenderMismatch { .. })));
        assert_eq!(c.network.pending(), 0);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let c = cluster(2);
        let message = Signed::sign(
            RegisterPayload {
                nonce: "n".into(),
                my_id: TransportId::from("peer-1"),
            },
            1,
            &keypair(9),
        )
        .unwrap();
        let result = c.registries[0]
            .handle_register(&TransportId::from("peer-1"), &message)
            .await;
        assert_eq!(result, Err(RegistryError::InvalidSignature(1)));
    }

    #[tokio::test]
    async fn test_restarted_guard_rebinds() {
        let c = cluster(2);
        c.registries[1].register().await.unwrap();
        c.network.flush().await;
        assert_eq!(c.registries[0].transport_of(1), Some(TransportId::from("peer-1")));

        // Guard 1 comes back under a new transport id.
        let keys = vec![keypair(0).public_key(), keypair(1).public_key()];
        let dialer = Arc::new(c.network.dialer("peer-1-restarted"));
        let restarted = Arc::new(PeerRegistry::new(1, keypair(1), keys, dialer.clone()).unwrap());
        dialer.subscribe(
            HANDSHAKE_CHANNEL,
            Arc::new(HandshakeHandler::new(restarted.clone())),
        );
        restarted.register().await.unwrap();
        c.network.flush().await;

        assert_eq!(
            c.registries[0].transport_of(1),
            Some(TransportId::from("peer-1-restarted"))
        );
        assert_eq!(restarted.transport_of(0), Some(TransportId::from("peer-0")));
    }

    #[tokio::test]
    async fn test_authenticate_requires_binding() {
        let c = cluster(2);
        let directory: Arc<dyn GuardDirectory> = c.registries[1].clone();
        let sealed = directory
            .seal(RegisterPayload {
                nonce: "x".into(),
                my_id: TransportId::from("peer-1"),
            })
            .unwrap();

        let verifier: Arc<dyn GuardDirectory> = c.registries[0].clone();
        let sender = TransportId::from("peer-1");
        assert_eq!(
            verifier.authenticate(&sender, &sealed),
            Err(RegistryError::Unbound(1))
        );

        c.registries[0].bind_transport(1, sender.clone()).unwrap();
        assert_eq!(verifier.authenticate(&sender, &sealed), Ok(1));
        assert!(matches!(
            verifier.authenticate(&TransportId::from("other"), &sealed),
            Err(RegistryError::SenderMismatch { .. })
        ));
    }
}
