//! Guard identities.

use shared_types::{GuardIndex, GuardPublicKey};

/// A guard from the static, ordered guard list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPeer {
    /// Position in the guard list.
    pub index: GuardIndex,
    /// Long-term identity key.
    pub public_key: GuardPublicKey,
}

/// The stable integer-indexed identity registry. Never mutated after
/// startup; transport bindings live in
/// [`TransportBindings`](super::TransportBindings).
#[derive(Debug, Clone)]
pub struct PeerSet {
    peers: Vec<GuardPeer>,
}

impl PeerSet {
    /// Build from the ordered public key list.
    pub fn new(public_keys: Vec<GuardPublicKey>) -> Self {
        let peers = public_keys
            .into_iter()
            .enumerate()
            .map(|(index, public_key)| GuardPeer { index, public_key })
            .collect();
        Self { peers }
    }

    /// Guard at `index`.
    pub fn get(&self, index: GuardIndex) -> Option<&GuardPeer> {
        self.peers.get(index)
    }

    /// Index of the guard holding `key`.
    pub fn index_of(&self, key: &GuardPublicKey) -> Option<GuardIndex> {
        self.peers.iter().position(|p| p.public_key == *key)
    }

    /// Number of guards.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All guards in index order.
    pub fn iter(&self) -> impl Iterator<Item = &GuardPeer> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::GuardKeyPair;

    #[test]
    fn test_indices_follow_list_order() {
        let keys: Vec<_> = (0..3u8)
            .map(|i| GuardKeyPair::from_seed([i; 32]).public_key())
            .collect();
        let set = PeerSet::new(keys.clone());
        assert_eq!(set.len(), 3);
        assert_eq!(set.index_of(&keys[2]), Some(2));
        assert_eq!(set.get(1).map(|p| p.public_key), Some(keys[1]));
        assert!(set.get(3).is_none());
    }
}
