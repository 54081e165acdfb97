//! Local DKG driver
//!
//! Runs `n` protocol instances in one process and routes their messages. Each
//! phase consumes the complete message set of the previous one, so the runner
//! is the barrier between phases. Any processing error aborts the run.

use super::messages::{ComplaintCommits, Deal, Justification, Response, SecretCommits};
use super::{DistKeyGenerator, DistKeyShare, LongTermKey, ParticipantKey};
use crate::group::encoding::point_to_hex;
use crate::group::{Curve, Suite};
use crate::types::{DkgConfig, GroupPublic};
use crate::{Error, ParticipantIndex, Result};
use rand::rngs::OsRng;
#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use tracing::{debug, info, instrument};

/// Result of a successful DKG run
pub struct DkgOutput<C: Curve> {
    /// One share per QUAL member, in index order
    pub shares: Vec<DistKeyShare<C>>,
    pub qual: Vec<ParticipantIndex>,
    pub group: GroupPublic<C>,
}

impl<C: Curve> DkgOutput<C> {
    /// Joint public key `K`
    pub fn public_key(&self) -> C::Point {
        self.group.public_key
    }

    /// `V_i` for every participant index
    pub fn verification_keys(&self) -> &[C::Point] {
        &self.group.verification_keys
    }

    pub fn share(&self, index: ParticipantIndex) -> Option<&DistKeyShare<C>> {
        self.shares.iter().find(|share| share.index() == index)
    }
}

/// Run the distributed key generation protocol among `config.n_parties`
/// local participants
#[instrument]
pub fn run_dkg<C: Curve>(config: &DkgConfig) -> Result<DkgOutput<C>> {
    config.ensure_curve::<C>()?;
    info!(
        n_parties = config.n_parties,
        threshold = config.threshold,
        curve = %config.curve,
        "Starting DKG"
    );
    let suite = Suite::<C>::new()?;

    debug!("DKG setup: long-term keys");
    let mut generators = setup(suite, config)?;

    debug!("DKG phase 1: deals");
    let deals = collect_deals(&mut generators)?;
    let responses = process_deals(&mut generators, deals)?;

    debug!(
        complaints = responses.iter().filter(|r| !r.response.approved).count(),
        "DKG phase 2: responses"
    );
    let justifications = broadcast_responses(&mut generators, &responses)?;

    debug!(
        justifications = justifications.len(),
        "DKG phase 3: justifications"
    );
    broadcast_justifications(&mut generators, &justifications)?;
    let qual = agree_on_qual(&generators)?;

    debug!(qual = ?qual, "DKG phase 4: secret commits");
    let commits = collect_secret_commits(&mut generators, &qual)?;
    let complaints = process_secret_commits(&mut generators, &qual, &commits)?;

    debug!(complaints = complaints.len(), "DKG phase 5: complaint resolution");
    resolve_complaints(&mut generators, &qual, &complaints)?;

    let output = finalize(&generators, &qual, config.n_parties)?;
    info!(
        qual = ?output.qual,
        public_key = %point_to_hex(&output.public_key()),
        "DKG completed successfully"
    );
    Ok(output)
}

/// Long-term key pairs with their proofs of possession, generated in parallel
pub(crate) fn generate_keys<C: Curve>(
    suite: &Suite<C>,
    n: usize,
) -> Result<Vec<(LongTermKey<C>, ParticipantKey<C>)>> {
    let keygen = |_: usize| -> Result<(LongTermKey<C>, ParticipantKey<C>)> {
        let mut rng = OsRng;
        let key = LongTermKey::generate(suite, &mut rng);
        let announced = key.participant_key(suite, &mut rng)?;
        Ok((key, announced))
    };

    #[cfg(feature = "multi-thread")]
    let keys = (0..n).into_par_iter().map(keygen).collect();
    #[cfg(not(feature = "multi-thread"))]
    let keys = (0..n).map(keygen).collect();
    keys
}

/// One generator per participant, in index order
pub(crate) fn setup<C: Curve>(
    suite: Suite<C>,
    config: &DkgConfig,
) -> Result<Vec<DistKeyGenerator<C>>> {
    let keys = generate_keys(&suite, config.n_parties)?;
    let announced: Vec<ParticipantKey<C>> = keys.iter().map(|(_, a)| a.clone()).collect();

    keys.into_iter()
        .map(|(key, _)| {
            DistKeyGenerator::new(suite, key, &announced, config.threshold, &mut OsRng)
        })
        .collect()
}

fn participant<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    index: ParticipantIndex,
) -> Result<&mut DistKeyGenerator<C>> {
    generators
        .get_mut(index)
        .ok_or_else(|| Error::abort(index, "Message addressed to unknown participant"))
}

/// Every dealer's encrypted deals, paired with their recipient
pub(crate) fn collect_deals<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
) -> Result<Vec<(ParticipantIndex, Deal<C>)>> {
    let mut deals = Vec::new();
    for generator in generators.iter_mut() {
        deals.extend(generator.deals(&mut OsRng)?);
    }
    Ok(deals)
}

pub(crate) fn process_deals<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    deals: Vec<(ParticipantIndex, Deal<C>)>,
) -> Result<Vec<Response>> {
    deals
        .into_iter()
        .map(|(recipient, deal)| participant(generators, recipient)?.process_deal(deal))
        .collect()
}

/// Deliver every response to everyone but its author
pub(crate) fn broadcast_responses<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    responses: &[Response],
) -> Result<Vec<Justification<C>>> {
    let mut justifications = Vec::new();
    for response in responses {
        for generator in generators
            .iter_mut()
            .filter(|g| g.index() != response.response.index)
        {
            if let Some(justification) = generator.process_response(response)? {
                justifications.push(justification);
            }
        }
    }
    Ok(justifications)
}

pub(crate) fn broadcast_justifications<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    justifications: &[Justification<C>],
) -> Result<()> {
    for justification in justifications {
        for generator in generators
            .iter_mut()
            .filter(|g| g.index() != justification.dealer_index)
        {
            generator.process_justification(justification)?;
        }
    }
    Ok(())
}

/// Every participant must see the QUAL set of the first certified one
pub(crate) fn agree_on_qual<C: Curve>(
    generators: &[DistKeyGenerator<C>],
) -> Result<Vec<ParticipantIndex>> {
    let reference = generators
        .iter()
        .find(|g| g.certified())
        .map(|g| g.qual())
        .ok_or_else(|| Error::abort_structural("No participant certified the deals"))?;

    for generator in generators {
        if generator.qual() != reference {
            return Err(Error::abort(generator.index(), "participant not finished"));
        }
    }
    Ok(reference)
}

pub(crate) fn collect_secret_commits<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    qual: &[ParticipantIndex],
) -> Result<Vec<SecretCommits<C>>> {
    qual.iter()
        .map(|&i| participant(generators, i)?.secret_commits())
        .collect()
}

/// Deliver every QUAL member's commitments to the other QUAL members
pub(crate) fn process_secret_commits<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    qual: &[ParticipantIndex],
    commits: &[SecretCommits<C>],
) -> Result<Vec<ComplaintCommits<C>>> {
    let mut complaints = Vec::new();
    for commit in commits {
        for &i in qual.iter().filter(|&&i| i != commit.index) {
            if let Some(complaint) = participant(generators, i)?.process_secret_commits(commit)? {
                complaints.push(complaint);
            }
        }
    }
    Ok(complaints)
}

/// Every QUAL member judges every complaint, then the revealed shares are
/// spread so disputed commitments can be rebuilt
pub(crate) fn resolve_complaints<C: Curve>(
    generators: &mut [DistKeyGenerator<C>],
    qual: &[ParticipantIndex],
    complaints: &[ComplaintCommits<C>],
) -> Result<()> {
    let mut reveals = Vec::new();
    for complaint in complaints {
        for &i in qual {
            if let Some(reveal) = participant(generators, i)?.process_complaint_commits(complaint)? {
                reveals.push(reveal);
            }
        }
    }

    for reveal in &reveals {
        for &i in qual.iter().filter(|&&i| i != reveal.index) {
            participant(generators, i)?.process_reconstruct_commits(reveal)?;
        }
    }
    Ok(())
}

/// Collect the QUAL members' key shares; all must agree on the joint key
pub(crate) fn finalize<C: Curve>(
    generators: &[DistKeyGenerator<C>],
    qual: &[ParticipantIndex],
    n_parties: usize,
) -> Result<DkgOutput<C>> {
    let mut shares = Vec::with_capacity(qual.len());
    for &i in qual {
        let generator = generators
            .get(i)
            .ok_or_else(|| Error::abort(i, "Unknown QUAL member"))?;
        if !generator.finished() {
            return Err(Error::abort(i, "participant not finished"));
        }
        shares.push(generator.dist_key_share()?);
    }

    let commitments = shares
        .first()
        .map(|share| share.commitments.clone())
        .ok_or_else(|| Error::abort_structural("Empty qualified set"))?;
    if let Some(diverging) = shares.iter().find(|s| s.commitments != commitments) {
        return Err(Error::abort(
            diverging.index(),
            "Joint commitments differ between QUAL members",
        ));
    }

    Ok(DkgOutput {
        shares,
        qual: qual.to_vec(),
        group: GroupPublic::from_commitments(n_parties, &commitments),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{CurveId, NistP256, Secp256k1};
    use crate::poly::{recover_secret, PublicPoly, Share};

    fn check_threshold_property<C: Curve>(output: &DkgOutput<C>, t: usize) {
        let suite = Suite::<C>::new().unwrap();
        let shares: Vec<Share<C>> = output.shares.iter().map(|s| s.share.clone()).collect();

        for share in &output.shares {
            assert_eq!(
                output.verification_keys()[share.index()],
                suite.mul_base(&share.share.value)
            );
            assert_eq!(share.public_key(), output.public_key());
        }

        // every t-subset of consecutive indices (wrapping) recombines to the key
        for start in 0..shares.len() {
            let subset: Vec<_> = (0..t)
                .map(|k| shares[(start + k) % shares.len()].clone())
                .collect();
            let secret = recover_secret(&subset, t).unwrap();
            assert_eq!(suite.mul_base(&secret), output.public_key());
        }
    }

    #[test]
    fn test_threshold_property_5_of_3() {
        let config = DkgConfig::new(5, 3, CurveId::Secp256k1).unwrap();
        let output = run_dkg::<Secp256k1>(&config).unwrap();
        assert_eq!(output.qual, vec![0, 1, 2, 3, 4]);
        assert_eq!(output.shares.len(), 5);
        check_threshold_property(&output, 3);

        let suite = Suite::<Secp256k1>::new().unwrap();
        let shares: Vec<_> = output.shares.iter().map(|s| s.share.clone()).collect();
        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = vec![shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    let secret = recover_secret(&subset, 3).unwrap();
                    assert_eq!(suite.mul_base(&secret), output.public_key());
                }
                // two shares interpolate a line, not the key
                let pair = vec![shares[a].clone(), shares[b].clone()];
                let guess = recover_secret(&pair, 2).unwrap();
                assert_ne!(suite.mul_base(&guess), output.public_key());
            }
        }
    }

    #[test]
    fn test_run_dkg_p256() {
        let config = DkgConfig::new(3, 2, CurveId::P256).unwrap();
        let output = run_dkg::<NistP256>(&config).unwrap();
        check_threshold_property(&output, 2);
    }

    #[test]
    fn test_curve_mismatch_rejected() {
        let config = DkgConfig::new(3, 2, CurveId::P256).unwrap();
        assert!(matches!(
            run_dkg::<Secp256k1>(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    fn finish<C: Curve>(
        generators: &mut [DistKeyGenerator<C>],
        n_parties: usize,
    ) -> Result<DkgOutput<C>> {
        let qual = agree_on_qual(generators)?;
        let commits = collect_secret_commits(generators, &qual)?;
        let complaints = process_secret_commits(generators, &qual, &commits)?;
        resolve_complaints(generators, &qual, &complaints)?;
        finalize(generators, &qual, n_parties)
    }

    #[test]
    fn test_corrupted_deal_resolved_by_justification() {
        let config = DkgConfig::new(4, 3, CurveId::Secp256k1).unwrap();
        let mut generators = setup(Suite::<Secp256k1>::new().unwrap(), &config).unwrap();

        let mut deals = collect_deals(&mut generators).unwrap();
        let (_, tampered) = deals
            .iter_mut()
            .find(|(recipient, deal)| *recipient == 2 && deal.dealer_index == 1)
            .unwrap();
        tampered.deal.ciphertext[0] ^= 0xff;

        let responses = process_deals(&mut generators, deals).unwrap();
        let complaints: Vec<_> = responses.iter().filter(|r| !r.response.approved).collect();
        assert_eq!(complaints.len(), 1);
        assert_eq!(complaints[0].dealer_index, 1);
        assert_eq!(complaints[0].response.index, 2);

        let justifications = broadcast_responses(&mut generators, &responses).unwrap();
        assert_eq!(justifications.len(), 1);
        broadcast_justifications(&mut generators, &justifications).unwrap();

        let output = finish(&mut generators, 4).unwrap();
        assert_eq!(output.qual, vec![0, 1, 2, 3]);
        check_threshold_property(&output, 3);
    }

    #[test]
    fn test_tampered_session_id_resolved_by_justification() {
        let config = DkgConfig::new(4, 3, CurveId::Secp256k1).unwrap();
        let mut generators = setup(Suite::<Secp256k1>::new().unwrap(), &config).unwrap();

        let mut deals = collect_deals(&mut generators).unwrap();
        let (_, tampered) = deals
            .iter_mut()
            .find(|(recipient, deal)| *recipient == 2 && deal.dealer_index == 1)
            .unwrap();
        tampered.deal.session_id[0] ^= 0x01;

        let responses = process_deals(&mut generators, deals).unwrap();
        let complaints: Vec<_> = responses.iter().filter(|r| !r.response.approved).collect();
        assert_eq!(complaints.len(), 1);
        assert_eq!(complaints[0].dealer_index, 1);
        assert_eq!(complaints[0].response.index, 2);

        // nobody is blamed for relaying the complaint
        let justifications = broadcast_responses(&mut generators, &responses).unwrap();
        assert_eq!(justifications.len(), 1);
        assert_eq!(justifications[0].dealer_index, 1);
        broadcast_justifications(&mut generators, &justifications).unwrap();

        let output = finish(&mut generators, 4).unwrap();
        assert_eq!(output.qual, vec![0, 1, 2, 3]);
        check_threshold_property(&output, 3);
    }

    #[test]
    fn test_justification_order_does_not_matter() {
        let config = DkgConfig::new(4, 2, CurveId::Secp256k1).unwrap();
        let mut generators = setup(Suite::<Secp256k1>::new().unwrap(), &config).unwrap();

        let mut deals = collect_deals(&mut generators).unwrap();
        for (recipient, deal) in deals.iter_mut() {
            if (deal.dealer_index, *recipient) == (1, 2) || (deal.dealer_index, *recipient) == (3, 0) {
                deal.deal.ciphertext[0] ^= 0xff;
            }
        }

        let responses = process_deals(&mut generators, deals).unwrap();
        let justifications = broadcast_responses(&mut generators, &responses).unwrap();
        assert_eq!(justifications.len(), 2);

        // even indices see the justifications in broadcast order, odd ones reversed
        for generator in generators.iter_mut() {
            let mut ordered: Vec<_> = justifications.iter().collect();
            if generator.index() % 2 == 1 {
                ordered.reverse();
            }
            for justification in ordered {
                if justification.dealer_index != generator.index() {
                    generator.process_justification(justification).unwrap();
                }
            }
        }

        let qual = agree_on_qual(&generators).unwrap();
        assert_eq!(qual, vec![0, 1, 2, 3]);
        let output = finish(&mut generators, 4).unwrap();
        for generator in &generators {
            assert_eq!(
                generator.dist_key_share().unwrap().public_key(),
                output.public_key()
            );
        }
        check_threshold_property(&output, 2);
    }

    #[test]
    fn test_unfinished_qual_member_aborts_finalize() {
        let config = DkgConfig::new(4, 3, CurveId::Secp256k1).unwrap();
        let mut generators = setup(Suite::<Secp256k1>::new().unwrap(), &config).unwrap();

        let deals = collect_deals(&mut generators).unwrap();
        let responses = process_deals(&mut generators, deals).unwrap();
        let justifications = broadcast_responses(&mut generators, &responses).unwrap();
        broadcast_justifications(&mut generators, &justifications).unwrap();
        let qual = agree_on_qual(&generators).unwrap();

        // participant 0 never receives participant 3's commitments
        let commits = collect_secret_commits(&mut generators, &qual).unwrap();
        for commit in &commits {
            for generator in generators.iter_mut() {
                let index = generator.index();
                if index == commit.index || (index == 0 && commit.index == 3) {
                    continue;
                }
                assert!(generator.process_secret_commits(commit).unwrap().is_none());
            }
        }

        assert!(!generators[0].finished());
        assert!(generators[1].finished());
        match finalize(&generators, &qual, 4) {
            Err(Error::ProtocolAbort {
                participant,
                reason,
            }) => {
                assert_eq!(participant, Some(0));
                assert_eq!(reason, "participant not finished");
            }
            other => panic!("expected abort, got {:?}", other.map(|o| o.qual)),
        }
    }

    #[test]
    fn test_bad_secret_commits_reconstructed() {
        let config = DkgConfig::new(4, 2, CurveId::Secp256k1).unwrap();
        let suite = Suite::<Secp256k1>::new().unwrap();
        let mut generators = setup(suite, &config).unwrap();

        let deals = collect_deals(&mut generators).unwrap();
        let responses = process_deals(&mut generators, deals).unwrap();
        let justifications = broadcast_responses(&mut generators, &responses).unwrap();
        assert!(justifications.is_empty());
        let qual = agree_on_qual(&generators).unwrap();

        let mut commits = collect_secret_commits(&mut generators, &qual).unwrap();
        let mut forged = commits[0].commitments.commitments().to_vec();
        forged[1] += suite.base();
        let forged = PublicPoly::new(forged).unwrap();
        generators[0].forge_own_commitments(forged.clone());
        commits[0].commitments = forged;

        let complaints = process_secret_commits(&mut generators, &qual, &commits).unwrap();
        assert_eq!(complaints.len(), 3);
        assert!(complaints.iter().all(|c| c.dealer_index == 0));
        resolve_complaints(&mut generators, &qual, &complaints).unwrap();

        let output = finalize(&generators, &qual, 4).unwrap();
        assert_eq!(output.qual, vec![0, 1, 2, 3]);
        check_threshold_property(&output, 2);
    }

    #[test]
    fn test_qual_divergence_aborts() {
        let config = DkgConfig::new(4, 3, CurveId::Secp256k1).unwrap();
        let mut generators = setup(Suite::<Secp256k1>::new().unwrap(), &config).unwrap();

        let deals = collect_deals(&mut generators).unwrap();
        let responses = process_deals(&mut generators, deals).unwrap();

        // participant 0 never hears participant 1's verdict on dealer 2
        for response in &responses {
            for generator in generators.iter_mut() {
                let index = generator.index();
                if index == response.response.index {
                    continue;
                }
                if index == 0 && response.response.index == 1 && response.dealer_index == 2 {
                    continue;
                }
                assert!(generator.process_response(response).unwrap().is_none());
            }
        }

        assert!(!generators[0].is_in_qual(2));
        assert!(generators[1].is_in_qual(2));
        match agree_on_qual(&generators) {
            Err(Error::ProtocolAbort { reason, .. }) => assert_eq!(reason, "participant not finished"),
            other => panic!("expected abort, got {:?}", other.map(|_| ())),
        }
        assert!(finish(&mut generators, 4).is_err());
    }
}
