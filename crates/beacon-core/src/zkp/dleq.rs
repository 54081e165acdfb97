//! DLEQ: `X1 = x·B1` and `X2 = x·B2` share the same `x`

use super::{challenges_match, ProofKind};
use crate::group::encoding::{encode_scalar, hex_scalar, Reader};
use crate::group::{CanonicalEncoding, Curve, Suite};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DleqProof<C: Curve> {
    #[serde(with = "hex_scalar")]
    challenge: C::Scalar,
    #[serde(with = "hex_scalar")]
    response: C::Scalar,
}

impl<C: Curve> DleqProof<C> {
    /// Prove `secret·base` and `secret·target` share `secret`; returns both images
    pub fn prove<R: RngCore + CryptoRng>(
        suite: &Suite<C>,
        base: &C::Point,
        target: &C::Point,
        secret: &C::Scalar,
        rng: &mut R,
    ) -> Result<(Self, C::Point, C::Point)> {
        let base_image = *base * secret;
        let target_image = *target * secret;

        let mut nonce = suite.random_scalar(rng);
        let base_commitment = *base * nonce;
        let target_commitment = *target * nonce;

        let challenge = suite.hash_points(
            ProofKind::DlogEquality.label(),
            &[
                base,
                &base_image,
                target,
                &target_image,
                &base_commitment,
                &target_commitment,
            ],
        )?;
        let response = nonce - *secret * challenge;
        nonce.zeroize();

        Ok((
            Self {
                challenge,
                response,
            },
            base_image,
            target_image,
        ))
    }

    pub fn verify(
        &self,
        suite: &Suite<C>,
        base: &C::Point,
        base_image: &C::Point,
        target: &C::Point,
        target_image: &C::Point,
    ) -> Result<()> {
        let base_commitment = *base * self.response + *base_image * self.challenge;
        let target_commitment = *target * self.response + *target_image * self.challenge;
        let challenge = suite.hash_points(
            ProofKind::DlogEquality.label(),
            &[
                base,
                base_image,
                target,
                target_image,
                &base_commitment,
                &target_commitment,
            ],
        )?;

        if challenges_match(&self.challenge, &challenge) {
            Ok(())
        } else {
            Err(Error::proof(ProofKind::DlogEquality))
        }
    }
}

impl<C: Curve> CanonicalEncoding for DleqProof<C> {
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

    fn check_dleq<C: Curve>() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = OsRng;
        let secret = suite.random_scalar(&mut rng);
        let target = suite.random_point(&mut rng);

        let (proof, x1, x2) =
            DleqProof::prove(&suite, &suite.base(), &target, &secret, &mut rng).unwrap();
        assert_eq!(x1, suite.mul_base(&secret));
        assert_eq!(x2, target * secret);
        proof.verify(&suite, &suite.base(), &x1, &target, &x2).unwrap();

        // a different discrete log on the second base
        let forged = target * suite.random_scalar(&mut rng);
        assert!(proof
            .verify(&suite, &suite.base(), &x1, &target, &forged)
            .is_err());
    }

    #[test]
    fn test_dleq_secp256k1() {
        check_dleq::<Secp256k1>();
    }

    #[test]
    fn test_dleq_p256() {
        check_dleq::<NistP256>();
    }

    #[test]
    fn test_dleq_hex_round_trip() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let mut rng = OsRng;
        let secret = suite.random_scalar(&mut rng);
        let target = suite.random_point(&mut rng);
        let (proof, _, _) =
            DleqProof::prove(&suite, &suite.base(), &target, &secret, &mut rng).unwrap();

        let decoded = DleqProof::<Secp256k1>::from_hex(&proof.to_hex()).unwrap();
        assert_eq!(decoded, proof);
        assert!(DleqProof::<Secp256k1>::from_hex("00").is_err());
    }
}
