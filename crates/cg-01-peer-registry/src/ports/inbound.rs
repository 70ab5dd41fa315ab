//! Driving port consumed by the signing and agreement subsystems.

use crate::domain::RegistryError;
use shared_types::{
    GuardIndex, GuardPublicKey, GuardSignature, MessagePayload, Signed, TransportId,
};

/// Read access to guard identities plus this guard's signing key.
pub trait GuardDirectory: Send + Sync {
    /// This guard's index.
    fn own_index(&self) -> GuardIndex;

    /// Number of guards, self included.
    fn guard_count(&self) -> usize;

    /// Key of the guard at `index`.
    fn public_key(&self, index: GuardIndex) -> Option<GuardPublicKey>;

    /// Index of the guard holding `key`.
    fn index_of(&self, key: &GuardPublicKey) -> Option<GuardIndex>;

    /// Transport bound to `index` by a completed handshake.
    fn transport_of(&self, index: GuardIndex) -> Option<TransportId>;

    /// Other guards with a transport binding, in index order.
    fn bound_peers(&self) -> Vec<(GuardIndex, TransportId)>;

    /// Sign `bytes` with this guard's identity key.
    fn sign_bytes(&self, bytes: &[u8]) -> GuardSignature;
}

impl dyn GuardDirectory {
    /// This guard's public key.
    pub fn own_public_key(&self) -> Option<GuardPublicKey> {
        self.public_key(self.own_index())
    }

    /// Wrap `payload` in a signed envelope from this guard.
    pub fn seal<T: MessagePayload>(&self, payload: T) -> Result<Signed<T>, RegistryError> {
        let guard_index = self.own_index();
        let bytes = Signed::signing_bytes(&payload, guard_index)?;
        Ok(Signed {
            signature: self.sign_bytes(&bytes),
            payload,
            guard_index,
        })
    }

    /// Check that `message` is signed by its claimed guard and arrived from
    /// the transport that guard is bound to.
    pub fn authenticate<T: MessagePayload>(
        &self,
        sender: &TransportId,
        message: &Signed<T>,
    ) -> Result<GuardIndex, RegistryError> {
        let index = message.guard_index;
        let key = self
            .public_key(index)
            .ok_or(RegistryError::UnknownGuard(index))?;
        let bound = self.transport_of(index).ok_or(RegistryError::Unbound(index))?;
        if bound != *sender {
            return Err(RegistryError::SenderMismatch {
                index,
                expected: bound,
                actual: sender.clone(),
            });
        }
        message
            .verify(&key)
            .map_err(|_| RegistryError::InvalidSignature(index))?;
        Ok(index)
    }

    /// Check a detached signature by guard `index` over `bytes`.
    pub fn verify_detached(
        &self,
        index: GuardIndex,
        bytes: &[u8],
        signature: &GuardSignature,
    ) -> Result<(), RegistryError> {
        let key = self
            .public_key(index)
            .ok_or(RegistryError::UnknownGuard(index))?;
        key.verify(bytes, signature)
            .map_err(|_| RegistryError::InvalidSignature(index))
    }
}
