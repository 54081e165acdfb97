//! DLK: knowledge of `x` such that `X = x·Base`

use super::{challenges_match, ProofKind};
use crate::group::encoding::{encode_scalar, hex_scalar, Reader};
use crate::group::{CanonicalEncoding, Curve, Suite};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DlogProof<C: Curve> {
    #[serde(with = "hex_scalar")]
    challenge: C::Scalar,
    #[serde(with = "hex_scalar")]
    response: C::Scalar,
}

impl<C: Curve> DlogProof<C> {
    pub fn prove<R: RngCore + CryptoRng>(
        suite: &Suite<C>,
        base: &C::Point,
        secret: &C::Scalar,
        rng: &mut R,
    ) -> Result<Self> {
        let public = *base * secret;
        let mut nonce = suite.random_scalar(rng);
        let commitment = *base * nonce;

        let challenge = suite.hash_points(
            ProofKind::DiscreteLog.label(),
            &[base, &public, &commitment],
        )?;
        let response = nonce - *secret * challenge;
        nonce.zeroize();

        Ok(Self {
            challenge,
            response,
        })
    }

    pub fn verify(&self, suite: &Suite<C>, base: &C::Point, public: &C::Point) -> Result<()> {
        let commitment = *base * self.response + *public * self.challenge;
        let challenge = suite.hash_points(
            ProofKind::DiscreteLog.label(),
            &[base, public, &commitment],
        )?;

        if challenges_match(&self.challenge, &challenge) {
            Ok(())
        } else {
            Err(Error::proof(ProofKind::DiscreteLog))
        }
    }
}

impl<C: Curve> CanonicalEncoding for DlogProof<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = encode_scalar(&self.challenge);
        out.extend(encode_scalar(&self.response));
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let challenge = reader.scalar()?;
        let response = reader.scalar()?;
        reader.finish()?;
        Ok(Self {
            challenge,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{NistP256, Secp256k1};
    use rand::rngs::OsRng;

    fn check_dlog<C: Curve>() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = OsRng;
        let secret = suite.random_scalar(&mut rng);
        let public = suite.mul_base(&secret);

        let proof = DlogProof::prove(&suite, &suite.base(), &secret, &mut rng).unwrap();
        proof.verify(&suite, &suite.base(), &public).unwrap();

        let other = suite.random_point(&mut rng);
        let err = proof.verify(&suite, &suite.base(), &other).unwrap_err();
        assert!(matches!(
            err,
            Error::ProofVerification {
                kind: ProofKind::DiscreteLog,
                ..
            }
        ));

        let decoded = DlogProof::<C>::from_hex(&proof.to_hex()).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn test_dlog_secp256k1() {
        check_dlog::<Secp256k1>();
    }

    #[test]
    fn test_dlog_p256() {
        check_dlog::<NistP256>();
    }

    #[test]
    fn test_dlog_other_base() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let mut rng = OsRng;
        let secret = suite.random_scalar(&mut rng);
        let h = suite.blinding_base();

        let proof = DlogProof::prove(&suite, &h, &secret, &mut rng).unwrap();
        proof.verify(&suite, &h, &(h * secret)).unwrap();
        assert!(proof
            .verify(&suite, &suite.base(), &suite.mul_base(&secret))
            .is_err());
    }
}
