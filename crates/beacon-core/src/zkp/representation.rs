//! RK: knowledge of `(x1, x2)` such that `X = x1·B1 + x2·B2`

use super::{challenges_match, ProofKind};
use crate::group::encoding::{encode_scalar, hex_scalar, Reader};
use crate::group::{CanonicalEncoding, Curve, Suite};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RepresentationProof<C: Curve> {
    #[serde(with = "hex_scalar")]
    challenge: C::Scalar,
    #[serde(with = "hex_scalar")]
    response_first: C::Scalar,
    #[serde(with = "hex_scalar")]
    response_second: C::Scalar,
}

impl<C: Curve> RepresentationProof<C> {
    pub fn prove<R: RngCore + CryptoRng>(
        suite: &Suite<C>,
        bases: (&C::Point, &C::Point),
        secrets: (&C::Scalar, &C::Scalar),
        rng: &mut R,
    ) -> Result<Self> {
        let (b1, b2) = bases;
        let (x1, x2) = secrets;
        let public = *b1 * x1 + *b2 * x2;

        let mut w1 = suite.random_scalar(rng);
        let mut w2 = suite.random_scalar(rng);
        let commitment = *b1 * w1 + *b2 * w2;

        let challenge = suite.hash_points(
            ProofKind::Representation.label(),
            &[b1, b2, &public, &commitment],
        )?;
        let response_first = w1 - *x1 * challenge;
        let response_second = w2 - *x2 * challenge;
        w1.zeroize();
        w2.zeroize();

        Ok(Self {
            challenge,
            response_first,
            response_second,
        })
    }

    pub fn verify(
        &self,
        suite: &Suite<C>,
        bases: (&C::Point, &C::Point),
        public: &C::Point,
    ) -> Result<()> {
        let (b1, b2) = bases;
        let commitment =
            *b1 * self.response_first + *b2 * self.response_second + *public * self.challenge;
        let challenge = suite.hash_points(
            ProofKind::Representation.label(),
            &[b1, b2, public, &commitment],
        )?;

        if challenges_match(&self.challenge, &challenge) {
            Ok(())
        } else {
            Err(Error::proof(ProofKind::Representation))
        }
    }
}

impl<C: Curve> CanonicalEncoding for RepresentationProof<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = encode_scalar(&self.challenge);
        out.extend(encode_scalar(&self.response_first));
        out.extend(encode_scalar(&self.response_second));
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let challenge = reader.scalar()?;
        let response_first = reader.scalar()?;
        let response_second = reader.scalar()?;
        reader.finish()?;
        Ok(Self {
            challenge,
            response_first,
            response_second,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Secp256k1;
    use rand::rngs::OsRng;

    #[test]
    fn test_representation_over_pedersen_bases() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let mut rng = OsRng;
        let (g, h) = (suite.base(), suite.blinding_base());
        let a = suite.random_scalar(&mut rng);
        let b = suite.random_scalar(&mut rng);
        let commitment = g * a + h * b;

        let proof = RepresentationProof::prove(&suite, (&g, &h), (&a, &b), &mut rng).unwrap();
        proof.verify(&suite, (&g, &h), &commitment).unwrap();

        // swapped bases describe a different statement
        assert!(proof.verify(&suite, (&h, &g), &commitment).is_err());

        let err = proof.verify(&suite, (&g, &h), &(g * a)).unwrap_err();
        assert!(matches!(
            err,
            Error::ProofVerification {
                kind: ProofKind::Representation,
                ..
            }
        ));
    }

    #[test]
    fn test_representation_encoding() {
        let suite = Suite::<Secp256k1>::new().unwrap();
        let mut rng = OsRng;
        let a = suite.random_scalar(&mut rng);
        let b = suite.random_scalar(&mut rng);
        let proof = RepresentationProof::prove(
            &suite,
            (&suite.base(), &suite.blinding_base()),
            (&a, &b),
            &mut rng,
        )
        .unwrap();

        let bytes = proof.to_canonical_bytes();
        assert_eq!(bytes.len(), 96);
        assert_eq!(
            RepresentationProof::<Secp256k1>::from_canonical_bytes(&bytes).unwrap(),
            proof
        );
        assert!(RepresentationProof::<Secp256k1>::from_canonical_bytes(&bytes[..64]).is_err());
    }
}
