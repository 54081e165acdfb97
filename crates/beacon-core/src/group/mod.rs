//! Prime-order group capability
//!
//! Protocol code (VSS, DKG, ElGamal, proofs) is written against the [`Curve`]
//! trait only. A [`Suite`] is the runtime instance of a curve: it owns the
//! points every operation keeps reaching for (identity, base, and the Pedersen
//! blinding base) so they are computed once per instance.

mod backends;
pub mod encoding;

pub use backends::{NistP256, Secp256k1};
pub use encoding::CanonicalEncoding;

use crate::{Error, ParticipantIndex, Result};
use elliptic_curve::group::{Group, GroupEncoding};
use elliptic_curve::{Field, PrimeField};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Domain separation tag prefix shared by every hash-to-curve/scalar call.
const DST_PREFIX: &str = "RANDBEACON-V01";

/// Runtime identifier of a curve backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveId {
    Secp256k1,
    P256,
}

impl CurveId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveId::Secp256k1 => "secp256k1",
            CurveId::P256 => "p256",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurveId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "secp256k1" | "k256" => Ok(CurveId::Secp256k1),
            "p256" | "p-256" | "secp256r1" => Ok(CurveId::P256),
            other => Err(Error::InvalidConfig(format!("Unknown curve: {other}"))),
        }
    }
}

/// A prime-order elliptic-curve group backend.
///
/// `Point` brings addition, negation, scalar multiplication, identity,
/// equality and random sampling through [`Group`]; canonical encoding comes
/// from [`GroupEncoding`], which rejects anything that is not a curve point.
pub trait Curve: Copy + Clone + fmt::Debug + Default + PartialEq + Eq + Send + Sync + 'static {
    type Scalar: PrimeField + Zeroize;
    type Point: Group<Scalar = Self::Scalar> + GroupEncoding;

    const ID: CurveId;

    /// RFC 9380 hash-to-scalar of the concatenated messages
    fn hash_to_scalar(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Scalar>;

    /// RFC 9380 hash-to-curve of the concatenated messages
    fn hash_to_point(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Point>;
}

/// Points cached alongside a [`Suite`]
#[derive(Debug, Clone, Copy)]
struct PointCache<C: Curve> {
    identity: C::Point,
    base: C::Point,
    blinding_base: C::Point,
}

impl<C: Curve> PointCache<C> {
    fn build() -> Result<Self> {
        let dst = domain_tag::<C>("pedersen-h");
        let blinding_base = C::hash_to_point(&[b"blinding generator"], dst.as_bytes())?;
        if bool::from(blinding_base.is_identity()) {
            return Err(Error::GroupMembership(
                "Blinding generator hashed to the identity".into(),
            ));
        }

        Ok(Self {
            identity: C::Point::identity(),
            base: C::Point::generator(),
            blinding_base,
        })
    }
}

/// A group capability instance for curve `C`
#[derive(Debug, Clone, Copy)]
pub struct Suite<C: Curve> {
    cache: PointCache<C>,
}

impl<C: Curve> Suite<C> {
    /// Build a suite, deriving its cached points
    pub fn new() -> Result<Self> {
        Ok(Self {
            cache: PointCache::build()?,
        })
    }

    pub fn id(&self) -> CurveId {
        C::ID
    }

    /// The neutral element `O`
    pub fn identity(&self) -> C::Point {
        self.cache.identity
    }

    /// The standard generator `G`
    pub fn base(&self) -> C::Point {
        self.cache.base
    }

    /// Second generator `H` with no known discrete log relative to `G`
    pub fn blinding_base(&self) -> C::Point {
        self.cache.blinding_base
    }

    /// `scalar·G`
    pub fn mul_base(&self, scalar: &C::Scalar) -> C::Point {
        self.cache.base * scalar
    }

    pub fn random_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> C::Scalar {
        C::Scalar::random(rng)
    }

    pub fn random_point<R: RngCore + CryptoRng>(&self, rng: &mut R) -> C::Point {
        C::Point::random(rng)
    }

    /// Evaluation point of a participant: `x = index + 1`
    pub fn index_scalar(&self, index: ParticipantIndex) -> C::Scalar {
        index_scalar::<C>(index)
    }

    /// Domain-separated hash of a protocol label and points, in the given order
    pub fn hash_points(&self, label: &str, points: &[&C::Point]) -> Result<C::Scalar> {
        let encoded: Vec<<C::Point as GroupEncoding>::Repr> =
            points.iter().map(|p| p.to_bytes()).collect();
        let msgs: Vec<&[u8]> = encoded.iter().map(|repr| repr.as_ref()).collect();
        let dst = domain_tag::<C>(label);
        C::hash_to_scalar(&msgs, dst.as_bytes())
    }

    /// Reject the identity where a real public key is required
    pub fn ensure_not_identity(&self, point: &C::Point, what: &str) -> Result<()> {
        if bool::from(point.is_identity()) {
            return Err(Error::GroupMembership(format!("{what} is the identity")));
        }
        Ok(())
    }
}

pub(crate) fn index_scalar<C: Curve>(index: ParticipantIndex) -> C::Scalar {
    C::Scalar::from(index as u64 + 1)
}

fn domain_tag<C: Curve>(label: &str) -> String {
    format!("{DST_PREFIX}-{}-{label}", C::ID)
}
