//! DKG message types

use crate::group::Curve;
use crate::poly::{PublicPoly, Share};
use crate::vss::{self, EncryptedDeal, SessionId};
use crate::ParticipantIndex;
use serde::{Deserialize, Serialize};

/// Phase 1: a dealer's encrypted deal for one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Deal<C: Curve> {
    /// Dealer index
    pub dealer_index: ParticipantIndex,
    pub deal: EncryptedDeal<C>,
}

/// Phase 2: a verdict on a dealer's deal, broadcast to every other participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Dealer whose deal is judged
    pub dealer_index: ParticipantIndex,
    pub response: vss::Response,
}

/// Phase 3: a dealer's answer to a complaint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Justification<C: Curve> {
    /// Dealer index
    pub dealer_index: ParticipantIndex,
    pub justification: vss::Justification<C>,
}

/// Phase 4: unmasked Feldman commitments of a QUAL member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SecretCommits<C: Curve> {
    /// Dealer index
    pub index: ParticipantIndex,
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    pub commitments: PublicPoly<C>,
}

/// Phase 5: the revealed deal proving a dealer's Feldman commitments wrong
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ComplaintCommits<C: Curve> {
    /// Complainer index
    pub index: ParticipantIndex,
    pub dealer_index: ParticipantIndex,
    pub deal: vss::Deal<C>,
}

/// Phase 6: a share of a disputed dealer's polynomials, revealed so the
/// dealer's commitments can be rebuilt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ReconstructCommits<C: Curve> {
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    /// Revealing participant index
    pub index: ParticipantIndex,
    pub dealer_index: ParticipantIndex,
    pub sec_share: Share<C>,
    pub rnd_share: Share<C>,
}
