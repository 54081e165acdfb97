//! Threshold ElGamal over the joint DKG key
//!
//! A contribution encrypts a random group element `M = k·G` as
//! `(A, B) = (r·G, r·K + M)`. Ciphertexts add point-wise, so the aggregate
//! decrypts to the sum of every contributed plaintext. Decryption needs `t`
//! partial shares `D_i = x_i·A`, recombined at zero.

use crate::dkg::DistKeyShare;
use crate::group::encoding::{encode_index, encode_point, hex_point, Reader};
use crate::group::{CanonicalEncoding, Curve, Suite};
use crate::poly::recover_commit;
use crate::zkp::{CiphertextProof, DleqProof};
use crate::{Error, ParticipantIndex, Result};
use elliptic_curve::group::Group;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::ops::Add;
use zeroize::Zeroize;

/// ElGamal ciphertext `(A, B)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Ciphertext<C: Curve> {
    #[serde(with = "hex_point")]
    pub a: C::Point,
    #[serde(with = "hex_point")]
    pub b: C::Point,
}

impl<C: Curve> Ciphertext<C> {
    /// `(O, O)`, the neutral element of aggregation
    pub fn identity() -> Self {
        Self {
            a: C::Point::identity(),
            b: C::Point::identity(),
        }
    }

    pub fn is_identity(&self) -> bool {
        bool::from(self.a.is_identity() & self.b.is_identity())
    }
}

impl<C: Curve> Add for Ciphertext<C> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            a: self.a + other.a,
            b: self.b + other.b,
        }
    }
}

impl<C: Curve> Default for Ciphertext<C> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<C: Curve> CanonicalEncoding for Ciphertext<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = encode_point(&self.a);
        out.extend(encode_point(&self.b));
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let a = reader.point()?;
        let b = reader.point()?;
        reader.finish()?;
        Ok(Self { a, b })
    }
}

/// Point-wise sum; the empty sum is the identity
pub fn aggregate_ciphertexts<'a, C, I>(parts: I) -> Ciphertext<C>
where
    C: Curve,
    I: IntoIterator<Item = &'a Ciphertext<C>>,
{
    parts
        .into_iter()
        .fold(Ciphertext::identity(), |sum, part| sum + *part)
}

/// A participant's per-round submission: ciphertext plus CE proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Contribution<C: Curve> {
    pub ciphertext: Ciphertext<C>,
    pub proof: CiphertextProof<C>,
}

impl<C: Curve> CanonicalEncoding for Contribution<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.ciphertext.to_canonical_bytes();
        out.extend(self.proof.to_canonical_bytes());
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let a = reader.point()?;
        let b = reader.point()?;
        let rest = reader.rest();
        Ok(Self {
            ciphertext: Ciphertext { a, b },
            proof: CiphertextProof::from_canonical_bytes(rest)?,
        })
    }
}

/// Encrypt a fresh random plaintext under `common_key`.
///
/// Returns the contribution and the plaintext point `M = k·G`.
pub fn encrypt<C: Curve, R: RngCore + CryptoRng>(
    suite: &Suite<C>,
    common_key: &C::Point,
    rng: &mut R,
) -> Result<(Contribution<C>, C::Point)> {
    suite.ensure_not_identity(common_key, "Common key")?;

    let mut plaintext_log = suite.random_scalar(rng);
    let mut nonce = suite.random_scalar(rng);
    let plaintext = suite.mul_base(&plaintext_log);
    let ciphertext = Ciphertext {
        a: suite.mul_base(&nonce),
        b: *common_key * nonce + plaintext,
    };

    let proof = CiphertextProof::prove(
        suite,
        common_key,
        (&ciphertext.a, &ciphertext.b),
        &nonce,
        &plaintext_log,
        rng,
    );
    nonce.zeroize();
    plaintext_log.zeroize();

    Ok((
        Contribution {
            ciphertext,
            proof: proof?,
        },
        plaintext,
    ))
}

/// Check the CE proof of a contribution
pub fn verify_ciphertext<C: Curve>(
    suite: &Suite<C>,
    common_key: &C::Point,
    contribution: &Contribution<C>,
) -> Result<()> {
    let ciphertext = &contribution.ciphertext;
    contribution
        .proof
        .verify(suite, common_key, (&ciphertext.a, &ciphertext.b))
}

/// `D_i = x_i·A`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DecryptionShare<C: Curve> {
    pub index: ParticipantIndex,
    #[serde(with = "hex_point")]
    pub point: C::Point,
}

impl<C: Curve> CanonicalEncoding for DecryptionShare<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = encode_index(self.index);
        out.extend(encode_point(&self.point));
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let index = reader.index()?;
        let point = reader.point()?;
        reader.finish()?;
        Ok(Self { index, point })
    }
}

/// A decryption share with a DLEQ proof tying it to `V_i`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct VerifiableDecryptionShare<C: Curve> {
    pub share: DecryptionShare<C>,
    pub proof: DleqProof<C>,
}

impl<C: Curve> CanonicalEncoding for VerifiableDecryptionShare<C> {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.share.to_canonical_bytes();
        out.extend(self.proof.to_canonical_bytes());
        out
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let index = reader.index()?;
        let point = reader.point()?;
        Ok(Self {
            share: DecryptionShare { index, point },
            proof: DleqProof::from_canonical_bytes(reader.rest())?,
        })
    }
}

/// Partially decrypt with our key share
pub fn create_decryption_share<C: Curve, R: RngCore + CryptoRng>(
    suite: &Suite<C>,
    ciphertext: &Ciphertext<C>,
    key_share: &DistKeyShare<C>,
    rng: &mut R,
) -> Result<VerifiableDecryptionShare<C>> {
    let (proof, _, point) = DleqProof::prove(
        suite,
        &suite.base(),
        &ciphertext.a,
        &key_share.share.value,
        rng,
    )?;

    Ok(VerifiableDecryptionShare {
        share: DecryptionShare {
            index: key_share.index(),
            point,
        },
        proof,
    })
}

/// Check a decryption share against the holder's verification key
pub fn verify_decryption_share<C: Curve>(
    suite: &Suite<C>,
    ciphertext: &Ciphertext<C>,
    verification_key: &C::Point,
    share: &VerifiableDecryptionShare<C>,
) -> Result<()> {
    share.proof.verify(
        suite,
        &suite.base(),
        verification_key,
        &ciphertext.a,
        &share.share.point,
    )
}

/// Recombine `threshold` shares at zero and strip the mask: `M = B - D`.
///
/// With more than `threshold` shares the lowest indices are used.
pub fn decrypt<C: Curve>(
    ciphertext: &Ciphertext<C>,
    shares: &[DecryptionShare<C>],
    threshold: usize,
) -> Result<C::Point> {
    let points: Vec<(ParticipantIndex, C::Point)> =
        shares.iter().map(|s| (s.index, s.point)).collect();
    let mask = recover_commit::<C>(&points, threshold).map_err(|e| match e {
        e @ (Error::InsufficientShares { .. } | Error::DuplicateShareIndex(_)) => e,
        other => Error::Crypto(format!("recombination failed: {other}")),
    })?;
    Ok(ciphertext.b - mask)
}
