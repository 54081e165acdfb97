//! CE: `(A, B)` is a well-formed ElGamal encryption under `K`
//!
//! Statement: `A = r·G` and `B = r·K + x·G` for known `(r, x)`.

use super::{challenges_match, ProofKind};
use crate::group::encoding::{encode_scalar, hex_scalar, Reader};
use crate::group::{CanonicalEncoding, Curve, Suite};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CiphertextProof<C: Curve> {
    #[serde(with = "hex_scalar")]
    challenge: C::Scalar,
    #[serde(with = "hex_scalar")]
    nonce_response: C::Scalar,
    #[serde(with = "hex_scalar")]
    plaintext_response: C::Scalar,
}

impl<C: Curve> CiphertextProof<C> {
    pub fn prove<R: RngCore + CryptoRng>(
        suite: &Suite<C>,
        public_key: &C::Point,
        ciphertext: (&C::Point, &C::Point),
        nonce: &C::Scalar,
        plaintext_log: &C::Scalar,
        rng: &mut R,
    ) -> Result<Self> {
        let (a, b) = ciphertext;
        let base = suite.base();

        let mut w1 = suite.random_scalar(rng);
        let mut w2 = suite.random_scalar(rng);
        let t1 = base * w1;
        let t2 = *public_key * w1 + base * w2;

        let challenge = suite.hash_points(
            ProofKind::CiphertextCorrectness.label(),
            &[&base, public_key, a, b, &t1, &t2],
        )?;
        let nonce_response = w1 - *nonce * challenge;
        let plaintext_response = w2 - *plaintext_log * challenge;
        w1.zeroize();
        w2.zeroize();

        Ok(Self {
            challenge,
            nonce_response,
            plaintext_response,
        })
    }

    pub fn verify(
        &self,
        suite: &Suite<C>,
        public_key: &C::Point,
        ciphertext: (&C::Point, &C::Point),
    ) -> Result<()> {
        let (a, b) = ciphertext;
        let base = suite.base();

        let t1 = base * self.nonce_response + *a * self.challenge;
        let t2 = *public_key * self.nonce_response
            + base * self.plaintext_response
            + *b * self.challenge;
        let challenge = suite.hash_points(
            ProofKind::CiphertextCorrectness.label(),
            &[&base, public_key, a, b, &t1, &t2],
        )?;

        if challenges_match(&self.challenge, &challenge) {
            Ok(())
        } else {
            Err(Error::proof(ProofKind::CiphertextCorrectness))
        }
    }
}

impl<C: Curve> CanonicalEncoding for CiphertextProof<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = encode_scalar(&self.challenge);
        out.extend(encode_scalar(&self.nonce_response));
        out.extend(encode_scalar(&self.plaintext_response));
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let challenge = reader.scalar()?;
        let nonce_response = reader.scalar()?;
        let plaintext_response = reader.scalar()?;
        reader.finish()?;
        Ok(Self {
            challenge,
            nonce_response,
            plaintext_response,
        })
    }
}
