//! Canonical byte/hex encoding of group elements and scalars
//!
//! Points use their compressed SEC1 form (identity as all zeros), scalars
//! their big-endian field representation. Decoding rejects anything that is
//! not exactly one canonical value.

use crate::{Error, ParticipantIndex, Result};
use elliptic_curve::group::GroupEncoding;
use elliptic_curve::PrimeField;

/// Fixed-width canonical encoding with a hex form
pub trait CanonicalEncoding: Sized {
    fn to_canonical_bytes(&self) -> Vec<u8>;

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self>;

    fn to_hex(&self) -> String {
        hex::encode(self.to_canonical_bytes())
    }

    fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())?;
        Self::from_canonical_bytes(&bytes)
    }
}

/// Encoded width of a point
pub fn point_len<P: GroupEncoding>() -> usize {
    P::Repr::default().as_ref().len()
}

/// Encoded width of a scalar
pub fn scalar_len<S: PrimeField>() -> usize {
    S::Repr::default().as_ref().len()
}

pub fn encode_point<P: GroupEncoding>(point: &P) -> Vec<u8> {
    point.to_bytes().as_ref().to_vec()
}

/// Decode a point. A wrong length or a non-canonical form (such as the SEC1
/// compact tag) is a serialization error; bytes of the right length that name
/// no curve point are a group membership error.
pub fn decode_point<P: GroupEncoding>(bytes: &[u8]) -> Result<P> {
    let mut repr = P::Repr::default();
    if bytes.len() != repr.as_ref().len() {
        return Err(Error::Serialization(format!(
            "Invalid point length: expected {}, got {}",
            repr.as_ref().len(),
            bytes.len()
        )));
    }
    repr.as_mut().copy_from_slice(bytes);

    let point = Option::<P>::from(P::from_bytes(&repr))
        .ok_or_else(|| Error::GroupMembership("Encoding is not a point on the curve".into()))?;
    if point.to_bytes().as_ref() != bytes {
        return Err(Error::Serialization("Non-canonical point encoding".into()));
    }
    Ok(point)
}

pub fn encode_scalar<S: PrimeField>(scalar: &S) -> Vec<u8> {
    scalar.to_repr().as_ref().to_vec()
}

pub fn decode_scalar<S: PrimeField>(bytes: &[u8]) -> Result<S> {
    let mut repr = S::Repr::default();
    if bytes.len() != repr.as_ref().len() {
        return Err(Error::Serialization(format!(
            "Invalid scalar length: expected {}, got {}",
            repr.as_ref().len(),
            bytes.len()
        )));
    }
    repr.as_mut().copy_from_slice(bytes);

    Option::<S>::from(S::from_repr(repr))
        .ok_or_else(|| Error::Serialization("Scalar is not reduced modulo the group order".into()))
}

pub fn point_to_hex<P: GroupEncoding>(point: &P) -> String {
    hex::encode(point.to_bytes())
}

pub fn point_from_hex<P: GroupEncoding>(s: &str) -> Result<P> {
    decode_point(&hex::decode(s.trim())?)
}

pub fn scalar_to_hex<S: PrimeField>(scalar: &S) -> String {
    hex::encode(scalar.to_repr())
}

pub fn scalar_from_hex<S: PrimeField>(s: &str) -> Result<S> {
    decode_scalar(&hex::decode(s.trim())?)
}

/// Participant index as a big-endian `u64`, wide enough for any `usize`
pub fn encode_index(index: ParticipantIndex) -> Vec<u8> {
    (index as u64).to_be_bytes().to_vec()
}

/// Sequential reader over a canonical composite encoding
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < len {
            return Err(Error::Serialization(format!(
                "Truncated encoding: need {len} more bytes, have {}",
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    pub(crate) fn point<P: GroupEncoding>(&mut self) -> Result<P> {
        let bytes = self.take(point_len::<P>())?;
        decode_point(bytes)
    }

    pub(crate) fn scalar<S: PrimeField>(&mut self) -> Result<S> {
        let bytes = self.take(scalar_len::<S>())?;
        decode_scalar(bytes)
    }

    /// Participant index written by [`encode_index`]
    pub(crate) fn index(&mut self) -> Result<ParticipantIndex> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        ParticipantIndex::try_from(u64::from_be_bytes(buf))
            .map_err(|_| Error::Serialization("Participant index out of range".into()))
    }

    /// Whatever is left, for a nested encoding to consume
    pub(crate) fn rest(self) -> &'a [u8] {
        self.bytes
    }

    pub(crate) fn finish(self) -> Result<()> {
        if !self.bytes.is_empty() {
            return Err(Error::Serialization(format!(
                "{} trailing bytes after encoding",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

/// Serde adapter: a point as a hex string
pub mod hex_point {
    use elliptic_curve::group::GroupEncoding;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<P, S>(point: &P, serializer: S) -> Result<S::Ok, S::Error>
    where
        P: GroupEncoding,
        S: Serializer,
    {
        serializer.serialize_str(&super::point_to_hex(point))
    }

    pub fn deserialize<'de, P, D>(deserializer: D) -> Result<P, D::Error>
    where
        P: GroupEncoding,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::point_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: a list of points as hex strings
pub mod hex_points {
    use elliptic_curve::group::GroupEncoding;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<P, S>(points: &[P], serializer: S) -> Result<S::Ok, S::Error>
    where
        P: GroupEncoding,
        S: Serializer,
    {
        serializer.collect_seq(points.iter().map(super::point_to_hex))
    }

    pub fn deserialize<'de, P, D>(deserializer: D) -> Result<Vec<P>, D::Error>
    where
        P: GroupEncoding,
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| super::point_from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Serde adapter: a scalar as a hex string
pub mod hex_scalar {
    use elliptic_curve::PrimeField;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<F, S>(scalar: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: PrimeField,
        S: Serializer,
    {
        serializer.serialize_str(&super::scalar_to_hex(scalar))
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: PrimeField,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::scalar_from_hex(&s).map_err(serde::de::Error::custom)
    }
}
