//! Core types shared by the DKG and the per-round processing

use crate::group::encoding::{hex_point, hex_points};
use crate::group::{Curve, CurveId};
use crate::poly::PublicPoly;
use crate::{Error, Result};
use elliptic_curve::group::Group;
use serde::{Deserialize, Serialize};

/// Position of a participant in the validator set, `0..n`
pub type ParticipantIndex = usize;

/// Parameters of a key generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgConfig {
    /// Number of participants
    pub n_parties: usize,

    /// Shares needed to decrypt (t-of-n)
    pub threshold: usize,

    /// Curve backend
    pub curve: CurveId,
}

impl DkgConfig {
    pub fn new(n_parties: usize, threshold: usize, curve: CurveId) -> Result<Self> {
        if n_parties == 0 {
            return Err(Error::InvalidConfig(
                "At least one participant is required".into(),
            ));
        }
        if threshold == 0 {
            return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
        }
        if threshold > n_parties {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of parties".into(),
            ));
        }
        if u32::try_from(n_parties).is_err() {
            return Err(Error::InvalidConfig("Too many participants".into()));
        }

        Ok(Self {
            n_parties,
            threshold,
            curve,
        })
    }

    /// Reject a config that names a different backend than `C`
    pub fn ensure_curve<C: Curve>(&self) -> Result<()> {
        if self.curve != C::ID {
            return Err(Error::InvalidConfig(format!(
                "Config selects {} but the protocol was instantiated over {}",
                self.curve,
                C::ID
            )));
        }
        Ok(())
    }
}

/// Public description of a generated group: what a round verifier needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", try_from = "GroupPublicRepr<C>")]
pub struct GroupPublic<C: Curve> {
    pub curve: CurveId,
    pub threshold: usize,
    pub n_parties: usize,

    /// Joint public key `K`
    #[serde(with = "hex_point")]
    pub public_key: C::Point,

    /// `V_i = share_i·G` for every index
    #[serde(with = "hex_points")]
    pub verification_keys: Vec<C::Point>,
}

/// Unchecked wire form of [`GroupPublic`]
#[derive(Deserialize)]
#[serde(bound = "")]
struct GroupPublicRepr<C: Curve> {
    curve: CurveId,
    threshold: usize,
    n_parties: usize,
    #[serde(with = "hex_point")]
    public_key: C::Point,
    #[serde(with = "hex_points")]
    verification_keys: Vec<C::Point>,
}

impl<C: Curve> TryFrom<GroupPublicRepr<C>> for GroupPublic<C> {
    type Error = Error;

    fn try_from(repr: GroupPublicRepr<C>) -> Result<Self> {
        let config = DkgConfig::new(repr.n_parties, repr.threshold, repr.curve)?;
        config.ensure_curve::<C>()?;
        if repr.verification_keys.len() != repr.n_parties {
            return Err(Error::InvalidConfig(format!(
                "Group lists {} verification keys for {} participants",
                repr.verification_keys.len(),
                repr.n_parties
            )));
        }
        if bool::from(repr.public_key.is_identity()) {
            return Err(Error::GroupMembership(
                "Group public key is the identity".into(),
            ));
        }

        Ok(Self {
            curve: repr.curve,
            threshold: repr.threshold,
            n_parties: repr.n_parties,
            public_key: repr.public_key,
            verification_keys: repr.verification_keys,
        })
    }
}

impl<C: Curve> GroupPublic<C> {
    /// Evaluate the joint commitment polynomial at every index
    pub fn from_commitments(n_parties: usize, commitments: &PublicPoly<C>) -> Self {
        Self {
            curve: C::ID,
            threshold: commitments.threshold(),
            n_parties,
            public_key: commitments.public_key(),
            verification_keys: (0..n_parties).map(|i| commitments.eval(i)).collect(),
        }
    }

    pub fn verification_key(&self, index: ParticipantIndex) -> Result<&C::Point> {
        self.verification_keys.get(index).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "No verification key for participant {index} (n = {})",
                self.n_parties
            ))
        })
    }
}
