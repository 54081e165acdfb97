//! Per-round processing
//!
//! Pure filters the host calls once per round: verify and aggregate the
//! submitted contributions, then collect proven decryption shares until `t`
//! are present and recombine the round output.

use crate::elgamal::{
    aggregate_ciphertexts, decrypt, verify_ciphertext, verify_decryption_share, Ciphertext,
    Contribution, DecryptionShare, VerifiableDecryptionShare,
};
use crate::group::encoding::point_from_hex;
use crate::group::{Curve, Suite};
use crate::types::GroupPublic;
use crate::{Error, ParticipantIndex, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

/// A contribution together with the host-level identity that sent it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Submission<C: Curve> {
    pub submitter: String,
    pub contribution: Contribution<C>,
}

/// Why a submission was left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub submitter: String,
    pub reason: String,
}

/// Aggregate of the valid contributions of a round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AggregatedRound<C: Curve> {
    pub ciphertext: Ciphertext<C>,
    /// Submitters whose contribution went into the aggregate
    pub accepted: Vec<String>,
    pub rejections: Vec<Rejection>,
}

/// Verify every submission's CE proof against the common key and sum the
/// valid ciphertexts.
///
/// Invalid or repeated submissions are reported, not fatal. The call fails on
/// a malformed common key, or when fewer than `min_valid` contributions (and
/// never fewer than one) survive. Hosts normally pass the group threshold.
#[instrument(skip_all, fields(submissions = submissions.len(), min_valid = min_valid))]
pub fn verify_contributions<C: Curve>(
    suite: &Suite<C>,
    common_key_hex: &str,
    submissions: &[Submission<C>],
    min_valid: usize,
) -> Result<AggregatedRound<C>> {
    let common_key: C::Point = point_from_hex(common_key_hex)?;
    suite.ensure_not_identity(&common_key, "Common key")?;

    let mut seen = BTreeSet::new();
    let mut valid = Vec::with_capacity(submissions.len());
    let mut accepted = Vec::with_capacity(submissions.len());
    let mut rejections = Vec::new();

    for submission in submissions {
        let submitter = submission.submitter.as_str();
        if !seen.insert(submitter) {
            warn!(submitter, "Duplicate contribution rejected");
            rejections.push(Rejection {
                submitter: submitter.to_string(),
                reason: "Duplicate contribution".into(),
            });
            continue;
        }

        match verify_ciphertext(suite, &common_key, &submission.contribution) {
            Ok(()) => {
                valid.push(submission.contribution.ciphertext);
                accepted.push(submitter.to_string());
            }
            Err(e) => {
                let e = e.with_submitter(submitter);
                warn!(submitter, error = %e, "Contribution rejected");
                rejections.push(Rejection {
                    submitter: submitter.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        accepted = accepted.len(),
        rejected = rejections.len(),
        "Contributions verified"
    );
    let required = min_valid.max(1);
    if accepted.len() < required {
        warn!(
            required,
            accepted = accepted.len(),
            "Round has too few valid contributions"
        );
        return Err(Error::InsufficientContributions {
            required,
            actual: accepted.len(),
            rejections,
        });
    }

    Ok(AggregatedRound {
        ciphertext: aggregate_ciphertexts(&valid),
        accepted,
        rejections,
    })
}

/// Index-keyed set of verified decryption shares for one ciphertext
pub struct ShareCollector<C: Curve> {
    suite: Suite<C>,
    group: GroupPublic<C>,
    ciphertext: Ciphertext<C>,
    shares: BTreeMap<ParticipantIndex, DecryptionShare<C>>,
    rejections: Vec<Rejection>,
}

impl<C: Curve> ShareCollector<C> {
    /// The identity ciphertext is what an empty round aggregates to, so it is
    /// refused here.
    pub fn new(suite: Suite<C>, group: GroupPublic<C>, ciphertext: Ciphertext<C>) -> Result<Self> {
        if ciphertext.is_identity() {
            return Err(Error::GroupMembership(
                "Round ciphertext is the identity".into(),
            ));
        }
        Ok(Self {
            suite,
            group,
            ciphertext,
            shares: BTreeMap::new(),
            rejections: Vec::new(),
        })
    }

    /// Verify and store a share. A second share for an index is rejected,
    /// never overwritten.
    pub fn add(&mut self, submitter: &str, share: &VerifiableDecryptionShare<C>) -> Result<()> {
        let result = self.check(submitter, share);
        match &result {
            Ok(()) => {
                self.shares.insert(share.share.index, share.share);
            }
            Err(e) => {
                warn!(
                    submitter,
                    index = share.share.index,
                    error = %e,
                    "Decryption share rejected"
                );
                self.rejections.push(Rejection {
                    submitter: submitter.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    fn check(&self, submitter: &str, share: &VerifiableDecryptionShare<C>) -> Result<()> {
        let index = share.share.index;
        if self.shares.contains_key(&index) {
            return Err(Error::DuplicateShareIndex(index));
        }
        let verification_key = self.group.verification_key(index)?;
        verify_decryption_share(&self.suite, &self.ciphertext, verification_key, share)
            .map_err(|e| e.with_submitter(submitter))
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// At least `t` valid shares are in
    pub fn is_ready(&self) -> bool {
        self.shares.len() >= self.group.threshold
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Recombine the round output
    pub fn finalize(&self) -> Result<C::Point> {
        let shares: Vec<DecryptionShare<C>> = self.shares.values().copied().collect();
        let output = decrypt(&self.ciphertext, &shares, self.group.threshold)?;
        info!(
            shares = shares.len(),
            threshold = self.group.threshold,
            "Round output recombined"
        );
        Ok(output)
    }
}
