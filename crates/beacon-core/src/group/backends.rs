//! Curve backends: secp256k1 (`k256`) and NIST P-256 (`p256`)

use super::{Curve, CurveId};
use crate::{Error, Result};
use elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use sha2::Sha256;

/// secp256k1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Secp256k1;

impl Curve for Secp256k1 {
    type Scalar = k256::Scalar;
    type Point = k256::ProjectivePoint;

    const ID: CurveId = CurveId::Secp256k1;

    fn hash_to_scalar(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Scalar> {
        k256::Secp256k1::hash_to_scalar::<ExpandMsgXmd<Sha256>>(msgs, &[dst])
            .map_err(|e| Error::Crypto(format!("hash to scalar: {e}")))
    }

    fn hash_to_point(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Point> {
        k256::Secp256k1::hash_from_bytes::<ExpandMsgXmd<Sha256>>(msgs, &[dst])
            .map_err(|e| Error::Crypto(format!("hash to curve: {e}")))
    }
}

/// NIST P-256
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NistP256;

impl Curve for NistP256 {
    type Scalar = p256::Scalar;
    type Point = p256::ProjectivePoint;

    const ID: CurveId = CurveId::P256;

    fn hash_to_scalar(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Scalar> {
        p256::NistP256::hash_to_scalar::<ExpandMsgXmd<Sha256>>(msgs, &[dst])
            .map_err(|e| Error::Crypto(format!("hash to scalar: {e}")))
    }

    fn hash_to_point(msgs: &[&[u8]], dst: &[u8]) -> Result<Self::Point> {
        p256::NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(msgs, &[dst])
            .map_err(|e| Error::Crypto(format!("hash to curve: {e}")))
    }
}
