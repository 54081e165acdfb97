//! Distributed Key Generation (DKG) module
//!
//! Implements the Pedersen-VSS "New-DKG" of Gennaro, Jarecki, Krawczyk and
//! Rabin. Every participant deals a secret to everyone, the deals that collect
//! enough approvals form the QUAL set, and the joint key is the sum of the
//! QUAL members' secrets. Nobody ever holds the joint private key.

mod generator;
mod messages;
mod runner;

pub use generator::DistKeyGenerator;
pub use messages::*;
pub use runner::{run_dkg, DkgOutput};

use crate::group::encoding::{hex_point, point_to_hex};
use crate::group::{Curve, Suite};
use crate::poly::{PublicPoly, Share};
use crate::types::GroupPublic;
use crate::zkp::DlogProof;
use crate::{ParticipantIndex, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A participant's long-term key pair; deals are encrypted to its public half
#[derive(Clone)]
pub struct LongTermKey<C: Curve> {
    secret: C::Scalar,
    public: C::Point,
}

impl<C: Curve> LongTermKey<C> {
    pub fn generate<R: RngCore + CryptoRng>(suite: &Suite<C>, rng: &mut R) -> Self {
        let secret = suite.random_scalar(rng);
        Self {
            secret,
            public: suite.mul_base(&secret),
        }
    }

    pub fn public(&self) -> &C::Point {
        &self.public
    }

    pub(crate) fn secret(&self) -> &C::Scalar {
        &self.secret
    }

    /// Public key with a proof of possession of the secret
    pub fn participant_key<R: RngCore + CryptoRng>(
        &self,
        suite: &Suite<C>,
        rng: &mut R,
    ) -> Result<ParticipantKey<C>> {
        Ok(ParticipantKey {
            public: self.public,
            proof: DlogProof::prove(suite, &suite.base(), &self.secret, rng)?,
        })
    }
}

impl<C: Curve> Drop for LongTermKey<C> {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// A long-term public key as announced to the other participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ParticipantKey<C: Curve> {
    #[serde(with = "hex_point")]
    pub public: C::Point,
    pub proof: DlogProof<C>,
}

impl<C: Curve> ParticipantKey<C> {
    /// Check the proof of possession
    pub fn verify(&self, suite: &Suite<C>) -> Result<()> {
        suite.ensure_not_identity(&self.public, "Participant key")?;
        self.proof.verify(suite, &suite.base(), &self.public)
    }
}

/// Key share held by a participant after DKG
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DistKeyShare<C: Curve> {
    /// `x_i`, evaluated at `index + 1`; wiped on drop
    pub share: Share<C>,

    /// Joint commitment polynomial; its constant term is the public key
    pub commitments: PublicPoly<C>,
}

impl<C: Curve> fmt::Debug for DistKeyShare<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistKeyShare")
            .field("index", &self.share.index)
            .field("threshold", &self.threshold())
            .field("public_key", &point_to_hex(&self.public_key()))
            .finish_non_exhaustive()
    }
}

impl<C: Curve> DistKeyShare<C> {
    pub fn index(&self) -> ParticipantIndex {
        self.share.index
    }

    pub fn threshold(&self) -> usize {
        self.commitments.threshold()
    }

    /// Joint public key `K`
    pub fn public_key(&self) -> C::Point {
        self.commitments.public_key()
    }

    /// `V_i = x_i·G` of any participant
    pub fn verification_key(&self, index: ParticipantIndex) -> C::Point {
        self.commitments.eval(index)
    }

    pub fn group_public(&self, n_parties: usize) -> GroupPublic<C> {
        GroupPublic::from_commitments(n_parties, &self.commitments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Secp256k1;
    use crate::Error;
    use rand::rngs::OsRng;

    #[test]
    fn test_proof_of_possession() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let key = LongTermKey::generate(&suite, &mut OsRng);
        let announced = key.participant_key(&suite, &mut OsRng).unwrap();
        announced.verify(&suite).unwrap();

        let other = LongTermKey::generate(&suite, &mut OsRng);
        let stolen = ParticipantKey {
            public: *other.public(),
            proof: announced.proof.clone(),
        };
        assert!(matches!(
            stolen.verify(&suite),
            Err(Error::ProofVerification { .. })
        ));
    }

    #[test]
    fn test_participant_key_json() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let key = LongTermKey::generate(&suite, &mut OsRng);
        let announced = key.participant_key(&suite, &mut OsRng).unwrap();

        let json = serde_json::to_string(&announced).unwrap();
        let decoded: ParticipantKey<Secp256k1> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, announced);
        decoded.verify(&suite).unwrap();
    }

    #[test]
    fn test_key_share_debug_redacts_secret() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let poly = crate::poly::SecretPoly::<Secp256k1>::random(2, None, &mut OsRng);
        let key_share = DistKeyShare {
            share: poly.eval(1),
            commitments: poly.commit(&suite.base()),
        };
        let secret_hex = crate::group::encoding::scalar_to_hex(&key_share.share.value);

        let printed = format!("{key_share:?}");
        assert!(printed.contains("index: 1"));
        assert!(!printed.contains(&secret_hex));
        assert!(!format!("{:?}", key_share.share).contains(&secret_hex));
    }
}
