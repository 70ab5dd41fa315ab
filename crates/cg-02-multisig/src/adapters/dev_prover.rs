//! # Development Prover
//!
//! Hash-based stand-in for the chain's discrete-log multi-signature prover.
//! It follows the same data flow (per-input commitments, hints extracted
//! from a partial transaction, real and simulated proofs) so the session
//! manager can be exercised end to end.
//!
//! **Not cryptographically secure.** A real proof reveals the commitment
//! secret; anyone can forge a simulated proof.

use crate::domain::{CommitmentSecret, Hint, HintKind, HintsBag, ProverError};
use crate::ports::{MultiSigProver, SignRequest};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_crypto::{sha256, tagged_hash, GuardPublicKey};
use shared_types::Commitment;
use std::collections::{BTreeMap, HashSet};

const COMMIT_TAG: &str = "cg-dev-commit";
const RESPONSE_TAG: &str = "cg-dev-response";
const SIMULATED_TAG: &str = "cg-dev-simulated";
const SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ProofKind {
    Real,
    Simulated,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevProof {
    signer: GuardPublicKey,
    input: usize,
    kind: ProofKind,
    #[serde_as(as = "Hex")]
    commitment: Vec<u8>,
    #[serde_as(as = "Hex")]
    proof: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevPartialTx {
    #[serde_as(as = "Hex")]
    tx_digest: Vec<u8>,
    proofs: Vec<DevProof>,
}

fn commit(secret: &[u8]) -> Vec<u8> {
    tagged_hash(COMMIT_TAG, &[secret]).to_vec()
}

fn respond(secret: &[u8], digest: &[u8]) -> Vec<u8> {
    tagged_hash(RESPONSE_TAG, &[secret, digest]).to_vec()
}

fn simulate(digest: &[u8], signer: &GuardPublicKey, input: usize) -> Vec<u8> {
    let index = (input as u64).to_be_bytes();
    tagged_hash(
        SIMULATED_TAG,
        &[digest, signer.as_bytes().as_slice(), index.as_slice()],
    )
    .to_vec()
}

fn check_real(digest: &[u8], commitment: &[u8], proof: &[u8]) -> bool {
    if proof.len() != SECRET_LEN * 2 {
        return false;
    }
    let (secret, response) = proof.split_at(SECRET_LEN);
    commit(secret) == commitment && respond(secret, digest) == response
}

/// Hash-based development prover.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevProver;

impl DevProver {
    /// New prover.
    pub fn new() -> Self {
        Self
    }

    /// Distinct guards with a valid real proof on every input of `signed`.
    pub fn real_signers(
        &self,
        tx_bytes: &[u8],
        input_count: usize,
        signed: &[u8],
    ) -> Result<Vec<GuardPublicKey>, ProverError> {
        let partial = Self::decode(signed)?;
        let digest = sha256(tx_bytes);
        if partial.tx_digest != digest {
            return Err(ProverError::Malformed("digest mismatch".into()));
        }
        let mut per_signer: BTreeMap<GuardPublicKey, HashSet<usize>> = BTreeMap::new();
        for proof in &partial.proofs {
            if proof.kind == ProofKind::Real
                && check_real(&digest, &proof.commitment, &proof.proof)
            {
                per_signer.entry(proof.signer).or_default().insert(proof.input);
            }
        }
        Ok(per_signer
            .into_iter()
            .filter(|(_, inputs)| inputs.len() == input_count)
            .map(|(signer, _)| signer)
            .collect())
    }

    fn decode(bytes: &[u8]) -> Result<DevPartialTx, ProverError> {
        serde_json::from_slice(bytes).map_err(|e| ProverError::Malformed(e.to_string()))
    }
}

impl MultiSigProver for DevProver {
    fn generate_commitment(
        &self,
        _tx_bytes: &[u8],
        input_count: usize,
    ) -> Result<(Commitment, CommitmentSecret), ProverError> {
        let mut rng = rand::thread_rng();
        let secrets: Vec<Vec<u8>> = (0..input_count)
            .map(|_| {
                let mut secret = vec![0u8; SECRET_LEN];
                rng.fill_bytes(&mut secret);
                secret
            })
            .collect();
        let public = secrets.iter().map(|s| commit(s)).collect();
        Ok((Commitment(public), CommitmentSecret::new(secrets)))
    }

    fn sign(&self, request: SignRequest) -> Result<Vec<u8>, ProverError> {
        if request.secret.input_count() != request.input_count {
            return Err(ProverError::InputCountMismatch {
                expected: request.input_count,
                actual: request.secret.input_count(),
            });
        }
        let digest = sha256(&request.tx_bytes);
        let mut proofs: BTreeMap<(GuardPublicKey, usize), DevProof> = BTreeMap::new();

        for hint in request.hints.iter() {
            if hint.input >= request.input_count {
                return Err(ProverError::Malformed(format!("hint for input {}", hint.input)));
            }
            let kind = match hint.kind {
                HintKind::PublicCommitment => continue,
                HintKind::RealProof => {
                    if let Some(published) = request.hints.commitment_of(&hint.signer, hint.input) {
                        if published != hint.commitment.as_slice() {
                            return Err(ProverError::CommitmentMismatch { input: hint.input });
                        }
                    }
                    if !check_real(&digest, &hint.commitment, &hint.proof) {
                        return Err(ProverError::InvalidProof(hint.input));
                    }
                    ProofKind::Real
                }
                HintKind::SimulatedProof => {
                    if hint.proof != simulate(&digest, &hint.signer, hint.input) {
                        return Err(ProverError::InvalidProof(hint.input));
                    }
                    ProofKind::Simulated
                }
            };
            proofs.insert(
                (hint.signer, hint.input),
                DevProof {
                    signer: hint.signer,
                    input: hint.input,
                    kind,
                    commitment: hint.commitment.clone(),
                    proof: hint.proof.clone(),
                },
            );
        }

        for input in 0..request.input_count {
            let secret = request
                .secret
                .input(input)
                .ok_or(ProverError::InputCountMismatch {
                    expected: request.input_count,
                    actual: request.secret.input_count(),
                })?;
            let mut proof = secret.to_vec();
            proof.extend(respond(secret, &digest));
            proofs.insert(
                (request.signer, input),
                DevProof {
                    signer: request.signer,
                    input,
                    kind: ProofKind::Real,
                    commitment: commit(secret),
                    proof,
                },
            );
        }

        for signer in &request.simulated {
            for input in 0..request.input_count {
                proofs.entry((*signer, input)).or_insert_with(|| DevProof {
                    signer: *signer,
                    input,
                    kind: ProofKind::Simulated,
                    commitment: Vec::new(),
                    proof: simulate(&digest, signer, input),
                });
            }
        }

        let partial = DevPartialTx {
            tx_digest: digest.to_vec(),
            proofs: proofs.into_values().collect(),
        };
        serde_json::to_vec(&partial).map_err(|e| ProverError::Malformed(e.to_string()))
    }

    fn extract_hints(
        &self,
        partial_tx: &[u8],
        real: &[GuardPublicKey],
        simulated: &[GuardPublicKey],
    ) -> Result<HintsBag, ProverError> {
        let partial = Self::decode(partial_tx)?;
        let mut bag = HintsBag::new();
        for proof in partial.proofs {
            let kind = match proof.kind {
                ProofKind::Real if real.contains(&proof.signer) => HintKind::RealProof,
                ProofKind::Simulated if simulated.contains(&proof.signer) => {
                    HintKind::SimulatedProof
                }
                _ => continue,
            };
            bag.push(Hint {
                signer: proof.signer,
                input: proof.input,
                kind,
                commitment: proof.commitment,
                proof: proof.proof,
            });
        }
        Ok(bag)
    }
}
