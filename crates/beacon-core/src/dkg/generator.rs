//! One participant's DKG state machine

use super::messages::{
    ComplaintCommits, Deal, Justification, ReconstructCommits, Response, SecretCommits,
};
use super::{DistKeyShare, LongTermKey, ParticipantKey};
use crate::group::{Curve, Suite};
use crate::poly::{PublicPoly, SecretPoly, Share};
use crate::vss::{self, Dealer, Verifier};
use crate::{Error, ParticipantIndex, Result};
use elliptic_curve::Field;
use rand_core::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Runs the DKG protocol for a single participant.
///
/// The caller routes messages: deals to their recipient, responses and
/// justifications to every other participant, and the commit-phase messages
/// to every other QUAL member.
pub struct DistKeyGenerator<C: Curve> {
    suite: Suite<C>,
    index: ParticipantIndex,
    long_term: LongTermKey<C>,
    participants: Vec<C::Point>,
    threshold: usize,

    dealer: Dealer<C>,
    /// One verifier per dealer whose deal we processed
    verifiers: BTreeMap<ParticipantIndex, Verifier<C>>,

    /// Accepted Feldman commitments per QUAL dealer
    commitments: BTreeMap<ParticipantIndex, PublicPoly<C>>,
    /// Feldman commitments shown wrong by a complaint
    disputed: BTreeMap<ParticipantIndex, PublicPoly<C>>,
    /// Shares collected to rebuild a disputed dealer's polynomial
    pending_reconstruct: BTreeMap<ParticipantIndex, Vec<ReconstructCommits<C>>>,
    /// Disputed dealers we already revealed our share for
    revealed: BTreeSet<ParticipantIndex>,
    reconstructed: BTreeSet<ParticipantIndex>,
}

impl<C: Curve> DistKeyGenerator<C> {
    /// Build the generator of the participant owning `long_term`.
    ///
    /// Fails if any participant key lacks a valid proof of possession, if the
    /// own key is not among them, or if `threshold` is out of range.
    pub fn new<R: RngCore + CryptoRng>(
        suite: Suite<C>,
        long_term: LongTermKey<C>,
        participants: &[ParticipantKey<C>],
        threshold: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let n = participants.len();
        if n == 0 || threshold == 0 || threshold > n {
            return Err(Error::InvalidConfig(format!(
                "Invalid threshold {threshold} for {n} participants"
            )));
        }

        for (i, key) in participants.iter().enumerate() {
            key.verify(&suite)
                .map_err(|e| e.with_submitter(&format!("participant {i}")))?;
        }

        let publics: Vec<C::Point> = participants.iter().map(|k| k.public).collect();
        let distinct: BTreeSet<Vec<u8>> = publics
            .iter()
            .map(crate::group::encoding::encode_point)
            .collect();
        if distinct.len() != n {
            return Err(Error::InvalidConfig("Duplicate participant keys".into()));
        }

        let index = publics
            .iter()
            .position(|p| p == long_term.public())
            .ok_or_else(|| {
                Error::InvalidConfig("Own public key not found in list of participants".into())
            })?;

        let secret = C::Scalar::random(&mut *rng);
        let dealer = Dealer::new(suite, index, publics.clone(), threshold, secret, rng)?;

        Ok(Self {
            suite,
            index,
            long_term,
            participants: publics,
            threshold,
            dealer,
            verifiers: BTreeMap::new(),
            commitments: BTreeMap::new(),
            disputed: BTreeMap::new(),
            pending_reconstruct: BTreeMap::new(),
            revealed: BTreeSet::new(),
            reconstructed: BTreeSet::new(),
        })
    }

    pub fn index(&self) -> ParticipantIndex {
        self.index
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn n_parties(&self) -> usize {
        self.participants.len()
    }

    /// Encrypted deals for every other participant, keyed by recipient.
    /// The own deal is processed here and never leaves.
    pub fn deals<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<BTreeMap<ParticipantIndex, Deal<C>>> {
        if !self.verifiers.contains_key(&self.index) {
            let own = self
                .dealer
                .deal(self.index)
                .cloned()
                .ok_or_else(|| Error::abort(self.index, "Own deal missing"))?;
            let mut verifier = self.verifier_for(self.index)?;
            let response = verifier.process_deal(own)?;
            if !response.approved {
                return Err(Error::abort(self.index, "Own deal gave a complaint"));
            }
            self.verifiers.insert(self.index, verifier);
        }

        let sealed = self.dealer.encrypted_deals(rng)?;
        Ok(sealed
            .into_iter()
            .enumerate()
            .filter(|(recipient, _)| *recipient != self.index)
            .map(|(recipient, deal)| {
                (
                    recipient,
                    Deal {
                        dealer_index: self.index,
                        deal,
                    },
                )
            })
            .collect())
    }

    fn verifier_for(&self, dealer: ParticipantIndex) -> Result<Verifier<C>> {
        Verifier::new(
            self.suite,
            self.index,
            dealer,
            self.participants.clone(),
            self.threshold,
        )
    }

    /// Verify the deal a dealer sent us; the response goes to every other participant
    pub fn process_deal(&mut self, deal: Deal<C>) -> Result<Response> {
        let dealer = deal.dealer_index;
        if dealer >= self.participants.len() {
            return Err(Error::abort(dealer, "Deal from unknown participant"));
        }
        if dealer == self.index {
            return Err(Error::abort(dealer, "Own deal delivered from outside"));
        }
        if self.verifiers.contains_key(&dealer) {
            return Err(Error::abort(dealer, "Already received deal from same index"));
        }

        let mut verifier = self.verifier_for(dealer)?;
        let response = verifier.process_encrypted_deal(self.long_term.secret(), &deal.deal)?;
        // the dealer approves its own deal
        verifier.set_response(dealer, true)?;
        self.verifiers.insert(dealer, verifier);

        Ok(Response {
            dealer_index: dealer,
            response,
        })
    }

    /// Record a response. A complaint about our own deal yields the
    /// justification to broadcast.
    pub fn process_response(&mut self, response: &Response) -> Result<Option<Justification<C>>> {
        let verifier = self
            .verifiers
            .get_mut(&response.dealer_index)
            .ok_or_else(|| Error::abort(response.response.index, "Response for an unknown deal"))?;
        verifier.process_response(&response.response)?;

        if response.dealer_index != self.index {
            return Ok(None);
        }
        let Some(justification) = self.dealer.process_response(&response.response)? else {
            return Ok(None);
        };
        verifier.process_justification(&justification)?;

        Ok(Some(Justification {
            dealer_index: self.index,
            justification,
        }))
    }

    pub fn process_justification(&mut self, justification: &Justification<C>) -> Result<()> {
        let verifier = self
            .verifiers
            .get_mut(&justification.dealer_index)
            .ok_or_else(|| {
                Error::abort(
                    justification.dealer_index,
                    "Justification received but no deal for it",
                )
            })?;
        verifier.process_justification(&justification.justification)
    }

    /// At least `t` deals are certified
    pub fn certified(&self) -> bool {
        self.qual().len() >= self.threshold
    }

    /// Sorted indices of the dealers whose deal is certified
    pub fn qual(&self) -> Vec<ParticipantIndex> {
        self.verifiers
            .iter()
            .filter(|(_, verifier)| verifier.deal_certified())
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn is_in_qual(&self, index: ParticipantIndex) -> bool {
        self.verifiers
            .get(&index)
            .map_or(false, |verifier| verifier.deal_certified())
    }

    /// Reveal our unmasked commitments to the other QUAL members
    pub fn secret_commits(&mut self) -> Result<SecretCommits<C>> {
        if !self.is_in_qual(self.index) {
            return Err(Error::abort(
                self.index,
                "Can't give secret commits if deal not certified",
            ));
        }

        let commitments = self.dealer.secret_commits().clone();
        self.commitments.insert(self.index, commitments.clone());

        Ok(SecretCommits {
            index: self.index,
            session_id: self.dealer.session_id(),
            commitments,
        })
    }

    /// Store another QUAL member's commitments, or complain if our share does
    /// not match them
    pub fn process_secret_commits(
        &mut self,
        commits: &SecretCommits<C>,
    ) -> Result<Option<ComplaintCommits<C>>> {
        let dealer = commits.index;
        if !self.is_in_qual(dealer) {
            return Err(Error::abort(dealer, "Secret commits from a non-QUAL member"));
        }
        if self.commitments.contains_key(&dealer) || self.disputed.contains_key(&dealer) {
            return Err(Error::abort(dealer, "Secret commits already received"));
        }

        let verifier = self
            .verifiers
            .get(&dealer)
            .ok_or_else(|| Error::abort(dealer, "No verifier for QUAL member"))?;
        if verifier.session_id() != Some(commits.session_id) {
            return Err(Error::abort(
                dealer,
                "Secret commits received with wrong session id",
            ));
        }
        if commits.commitments.threshold() != self.threshold {
            return Err(Error::abort(dealer, "Secret commits have the wrong threshold"));
        }
        let deal = verifier
            .deal()
            .ok_or_else(|| Error::abort(dealer, "Certified dealer without a deal"))?;

        if !commits
            .commitments
            .check(&self.suite.base(), &deal.sec_share)
        {
            warn!(
                dealer,
                participant = self.index,
                "Share does not match revealed commitments"
            );
            let complaint = ComplaintCommits {
                index: self.index,
                dealer_index: dealer,
                deal: deal.clone(),
            };
            self.disputed.insert(dealer, commits.commitments.clone());
            return Ok(Some(complaint));
        }

        self.commitments.insert(dealer, commits.commitments.clone());
        Ok(None)
    }

    /// Validate a complaint against a dealer's commitments. A valid complaint
    /// drops those commitments and, the first time, returns our own share of
    /// the dealer's polynomials for reconstruction.
    pub fn process_complaint_commits(
        &mut self,
        complaint: &ComplaintCommits<C>,
    ) -> Result<Option<ReconstructCommits<C>>> {
        let issuer = complaint.index;
        let dealer = complaint.dealer_index;
        if !self.is_in_qual(issuer) {
            return Err(Error::abort(issuer, "Complaint commits from non-QUAL member"));
        }
        if !self.is_in_qual(dealer) {
            return Err(Error::abort(issuer, "Complaint about a non-QUAL dealer"));
        }

        let verifier = self
            .verifiers
            .get(&dealer)
            .ok_or_else(|| Error::abort(issuer, "Complaint linked to unknown verifier"))?;

        // the revealed deal must pass against the Pedersen commitments...
        verifier
            .verify_deal(&complaint.deal, issuer)
            .map_err(|_| Error::abort(issuer, "Complaint reveals an invalid deal"))?;

        // ...and fail against the Feldman ones
        let feldman = self
            .disputed
            .get(&dealer)
            .or_else(|| self.commitments.get(&dealer))
            .ok_or_else(|| Error::abort(issuer, "Complaint about non received commitments"))?;
        if feldman.check(&self.suite.base(), &complaint.deal.sec_share) {
            return Err(Error::abort(issuer, "Invalid complaint, deal verifying"));
        }

        if let Some(rejected) = self.commitments.remove(&dealer) {
            self.disputed.insert(dealer, rejected);
        }
        if !self.revealed.insert(dealer) {
            return Ok(None);
        }

        let deal = verifier
            .deal()
            .ok_or_else(|| Error::abort(dealer, "Complaint linked to non certified deal"))?;
        let reveal = ReconstructCommits {
            session_id: deal.session_id,
            index: self.index,
            dealer_index: dealer,
            sec_share: deal.sec_share.clone(),
            rnd_share: deal.rnd_share.clone(),
        };
        debug!(dealer, participant = self.index, "Revealing share for reconstruction");

        self.add_reconstruct_share(reveal.clone())?;
        Ok(Some(reveal))
    }

    /// Collect a revealed share; with `t` of them the dealer's commitments are
    /// rebuilt from its full polynomial
    pub fn process_reconstruct_commits(&mut self, reveal: &ReconstructCommits<C>) -> Result<()> {
        let dealer = reveal.dealer_index;
        if self.reconstructed.contains(&dealer) {
            return Ok(());
        }
        if self.commitments.contains_key(&dealer) {
            return Err(Error::abort(
                reveal.index,
                "Commitments not invalidated by any complaints",
            ));
        }
        if reveal.index >= self.participants.len() {
            return Err(Error::abort(
                reveal.index,
                "Reconstruct commits with invalid verifier index",
            ));
        }

        let verifier = self
            .verifiers
            .get(&dealer)
            .ok_or_else(|| Error::abort(reveal.index, "Reconstruct commits for unknown dealer"))?;
        if verifier.session_id() != Some(reveal.session_id) {
            return Err(Error::abort(
                reveal.index,
                "Reconstruct commits invalid session id",
            ));
        }
        let commitments = verifier
            .commitments()
            .ok_or_else(|| Error::abort(dealer, "No commitments for dealer"))?;
        if reveal.sec_share.index != reveal.index
            || !vss::pedersen_check(&self.suite, commitments, &reveal.sec_share, &reveal.rnd_share)
        {
            return Err(Error::abort(
                reveal.index,
                "Revealed share does not match the dealer's commitments",
            ));
        }

        self.add_reconstruct_share(reveal.clone())
    }

    fn add_reconstruct_share(&mut self, reveal: ReconstructCommits<C>) -> Result<()> {
        let dealer = reveal.dealer_index;
        let pending = self.pending_reconstruct.entry(dealer).or_default();
        if pending.iter().any(|r| r.index == reveal.index) {
            return Ok(());
        }
        pending.push(reveal);

        if pending.len() < self.threshold {
            return Ok(());
        }
        let shares: Vec<Share<C>> = pending.iter().map(|r| r.sec_share.clone()).collect();
        let poly = SecretPoly::<C>::recover(&shares, self.threshold)?;
        self.commitments
            .insert(dealer, poly.commit(&self.suite.base()));
        self.reconstructed.insert(dealer);
        self.pending_reconstruct.remove(&dealer);
        debug!(dealer, participant = self.index, "Reconstructed dealer commitments");
        Ok(())
    }

    /// Make our own record of our commitments match a forged broadcast
    #[cfg(test)]
    pub(crate) fn forge_own_commitments(&mut self, commitments: PublicPoly<C>) {
        self.commitments.insert(self.index, commitments);
    }

    /// Enough QUAL members, each with commitments either revealed or rebuilt
    pub fn finished(&self) -> bool {
        let qual = self.qual();
        qual.len() >= self.threshold && qual.iter().all(|i| self.commitments.contains_key(i))
    }

    /// Sum the QUAL shares and commitment polynomials
    pub fn dist_key_share(&self) -> Result<DistKeyShare<C>> {
        if !self.certified() {
            return Err(Error::abort(self.index, "Distributed key not certified"));
        }

        let mut value = C::Scalar::ZERO;
        let mut public: Option<PublicPoly<C>> = None;
        for i in self.qual() {
            let deal = self
                .verifiers
                .get(&i)
                .and_then(|verifier| verifier.deal())
                .ok_or_else(|| Error::abort(i, "Missing deal from QUAL member"))?;
            value += deal.sec_share.value;

            let poly = self.commitments.get(&i).ok_or_else(|| {
                Error::abort(i, "Protocol not finished: commitments missing")
            })?;
            public = Some(match public {
                None => poly.clone(),
                Some(sum) => sum.add(poly)?,
            });
        }

        let commitments =
            public.ok_or_else(|| Error::abort_structural("Empty qualified set"))?;
        Ok(DistKeyShare {
            share: Share {
                index: self.index,
                value,
            },
            commitments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Secp256k1;
    use rand::rngs::OsRng;

    type C = Secp256k1;

    fn keys(suite: &Suite<C>, n: usize) -> (Vec<LongTermKey<C>>, Vec<ParticipantKey<C>>) {
        let long_terms: Vec<_> = (0..n)
            .map(|_| LongTermKey::generate(suite, &mut OsRng))
            .collect();
        let announced = long_terms
            .iter()
            .map(|k| k.participant_key(suite, &mut OsRng).unwrap())
            .collect();
        (long_terms, announced)
    }

    #[test]
    fn test_own_key_must_be_listed() {
        let suite = Suite::<C>::new().unwrap();
        let (_, announced) = keys(&suite, 3);
        let outsider = LongTermKey::generate(&suite, &mut OsRng);

        let result = DistKeyGenerator::new(suite, outsider, &announced, 2, &mut OsRng);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let suite = Suite::<C>::new().unwrap();
        let (long_terms, announced) = keys(&suite, 3);

        for t in [0, 4] {
            let result =
                DistKeyGenerator::new(suite, long_terms[0].clone(), &announced, t, &mut OsRng);
            assert!(matches!(result, Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_bad_proof_of_possession_rejected() {
        let suite = Suite::<C>::new().unwrap();
        let (long_terms, mut announced) = keys(&suite, 3);
        announced[2].proof = announced[1].proof.clone();

        let result = DistKeyGenerator::new(suite, long_terms[0].clone(), &announced, 2, &mut OsRng);
        match result {
            Err(Error::ProofVerification { submitter, .. }) => {
                assert_eq!(submitter.as_deref(), Some("participant 2"));
            }
            _ => panic!("expected a proof verification failure"),
        }
    }

    #[test]
    fn test_duplicate_deal_rejected() {
        let suite = Suite::<C>::new().unwrap();
        let (long_terms, announced) = keys(&suite, 3);
        let mut dealer =
            DistKeyGenerator::new(suite, long_terms[0].clone(), &announced, 2, &mut OsRng).unwrap();
        let mut recipient =
            DistKeyGenerator::new(suite, long_terms[1].clone(), &announced, 2, &mut OsRng).unwrap();

        let deals = dealer.deals(&mut OsRng).unwrap();
        assert_eq!(deals.len(), 2);
        assert!(!deals.contains_key(&0));

        let deal = deals[&1].clone();
        let response = recipient.process_deal(deal.clone()).unwrap();
        assert!(response.response.approved);
        assert!(matches!(
            recipient.process_deal(deal),
            Err(Error::ProtocolAbort {
                participant: Some(0),
                ..
            })
        ));
    }

    #[test]
    fn test_secret_commits_require_certification() {
        let suite = Suite::<C>::new().unwrap();
        let (long_terms, announced) = keys(&suite, 3);
        let mut generator =
            DistKeyGenerator::new(suite, long_terms[0].clone(), &announced, 2, &mut OsRng).unwrap();
        generator.deals(&mut OsRng).unwrap();

        // responses from the others are still missing
        assert!(!generator.certified());
        assert!(generator.secret_commits().is_err());
        assert!(generator.dist_key_share().is_err());
    }

    #[test]
    fn test_single_participant() {
        let suite = Suite::<C>::new().unwrap();
        let (long_terms, announced) = keys(&suite, 1);
        let mut generator =
            DistKeyGenerator::new(suite, long_terms[0].clone(), &announced, 1, &mut OsRng).unwrap();

        assert!(generator.deals(&mut OsRng).unwrap().is_empty());
        assert_eq!(generator.qual(), vec![0]);
        generator.secret_commits().unwrap();
        assert!(generator.finished());

        let share = generator.dist_key_share().unwrap();
        assert_eq!(share.public_key(), suite.mul_base(&share.share.value));
    }
}
