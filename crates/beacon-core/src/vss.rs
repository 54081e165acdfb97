//! Pedersen verifiable secret sharing
//!
//! A [`Dealer`] shares a secret with a polynomial `f` masked by a blinding
//! polynomial `g` and publishes `C_k = a_k·G + b_k·H`. Every recipient runs a
//! [`Verifier`] for that dealer: it checks its own deal against the
//! commitments, records everyone's approve/complain [`Response`] and applies
//! the dealer's [`Justification`]s.
//!
//! Deals travel encrypted to the recipient's long-term key: an ephemeral
//! Diffie-Hellman point, HMAC-SHA256 key derivation and ChaCha20-Poly1305.

use crate::group::encoding::{hex_point, hex_points};
use crate::group::{Curve, Suite};
use crate::poly::{PublicPoly, SecretPoly, Share};
use crate::zkp::RepresentationProof;
use crate::{Error, ParticipantIndex, Result};
use aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use elliptic_curve::group::GroupEncoding;
use hmac::{Hmac, Mac};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Binds every message of one dealer's sharing
pub type SessionId = [u8; 32];

const SESSION_LABEL: &[u8] = b"RANDBEACON-V01 vss-session";
const DEAL_KEY_LABEL: &[u8] = b"RANDBEACON-V01 deal-key";

/// Plaintext deal for a single recipient
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Deal<C: Curve> {
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    /// `f(j + 1)`
    pub sec_share: Share<C>,
    /// `g(j + 1)`
    pub rnd_share: Share<C>,
    pub threshold: usize,
    /// Pedersen commitments `a_k·G + b_k·H`
    #[serde(with = "hex_points")]
    pub commitments: Vec<C::Point>,
    /// Knowledge of `(a_0, b_0)` behind `C_0`
    pub proof: RepresentationProof<C>,
}

/// A deal sealed for its recipient
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EncryptedDeal<C: Curve> {
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    /// Ephemeral Diffie-Hellman key `E = e·G`
    #[serde(with = "hex_point")]
    pub ephemeral: C::Point,
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

/// A verifier's verdict on its deal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    /// Index of the verifier issuing the verdict
    pub index: ParticipantIndex,
    pub approved: bool,
}

/// Dealer's answer to a complaint: the complainer's deal in the clear
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Justification<C: Curve> {
    #[serde(with = "hex::serde")]
    pub session_id: SessionId,
    /// Index of the complaining verifier
    pub index: ParticipantIndex,
    pub deal: Deal<C>,
}

/// SHA-256 over the curve, the dealer key, every participant key, the
/// commitments and the threshold
pub fn session_id<C: Curve>(
    dealer: &C::Point,
    participants: &[C::Point],
    commitments: &[C::Point],
    threshold: usize,
) -> SessionId {
    let mut hasher = Sha256::new();
    hasher.update(SESSION_LABEL);
    hasher.update(C::ID.as_str().as_bytes());
    hasher.update(dealer.to_bytes());
    for participant in participants {
        hasher.update(participant.to_bytes());
    }
    for commitment in commitments {
        hasher.update(commitment.to_bytes());
    }
    hasher.update((threshold as u64).to_be_bytes());
    hasher.finalize().into()
}

/// Derive the AEAD key shared by dealer and recipient
fn deal_key<C: Curve>(
    shared: &C::Point,
    ephemeral: &C::Point,
    session_id: &SessionId,
) -> Result<Key> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(shared.to_bytes().as_ref())
        .map_err(|e| Error::Crypto(format!("deal key derivation: {e}")))?;
    mac.update(DEAL_KEY_LABEL);
    mac.update(ephemeral.to_bytes().as_ref());
    mac.update(session_id);
    let mut bytes = mac.finalize().into_bytes();
    let key = *Key::from_slice(&bytes);
    bytes.as_mut_slice().zeroize();
    Ok(key)
}

/// Seal a deal to `recipient` under a fresh ephemeral key
pub(crate) fn encrypt_deal<C: Curve, R: RngCore + CryptoRng>(
    suite: &Suite<C>,
    recipient: &C::Point,
    deal: &Deal<C>,
    rng: &mut R,
) -> Result<EncryptedDeal<C>> {
    let mut ephemeral_secret = suite.random_scalar(rng);
    let ephemeral = suite.mul_base(&ephemeral_secret);
    let shared = *recipient * ephemeral_secret;
    ephemeral_secret.zeroize();

    let key = deal_key::<C>(&shared, &ephemeral, &deal.session_id)?;
    let mut plaintext = serde_json::to_vec(deal)?;
    // the key is single-use, so a fixed nonce never repeats under it
    let ciphertext = ChaCha20Poly1305::new(&key)
        .encrypt(
            &Nonce::default(),
            Payload {
                msg: &plaintext,
                aad: &deal.session_id,
            },
        )
        .map_err(|_| Error::Crypto("Deal encryption failed".into()));
    plaintext.zeroize();

    Ok(EncryptedDeal {
        session_id: deal.session_id,
        ephemeral,
        ciphertext: ciphertext?,
    })
}

/// Open a sealed deal with the recipient's long-term secret
pub(crate) fn decrypt_deal<C: Curve>(
    suite: &Suite<C>,
    secret: &C::Scalar,
    encrypted: &EncryptedDeal<C>,
) -> Result<Deal<C>> {
    suite.ensure_not_identity(&encrypted.ephemeral, "Ephemeral deal key")?;
    let shared = encrypted.ephemeral * secret;
    let key = deal_key::<C>(&shared, &encrypted.ephemeral, &encrypted.session_id)?;

    let mut plaintext = ChaCha20Poly1305::new(&key)
        .decrypt(
            &Nonce::default(),
            Payload {
                msg: &encrypted.ciphertext,
                aad: &encrypted.session_id,
            },
        )
        .map_err(|_| Error::Crypto("Deal decryption failed".into()))?;
    let deal: serde_json::Result<Deal<C>> = serde_json::from_slice(&plaintext);
    plaintext.zeroize();
    Ok(deal?)
}

/// Shares one secret among all participants
pub struct Dealer<C: Curve> {
    suite: Suite<C>,
    index: ParticipantIndex,
    participants: Vec<C::Point>,
    session_id: SessionId,
    deals: Vec<Deal<C>>,
    /// Unmasked commitments `a_k·G`, revealed once the deal is certified
    secret_commits: PublicPoly<C>,
}

impl<C: Curve> Dealer<C> {
    pub fn new<R: RngCore + CryptoRng>(
        suite: Suite<C>,
        index: ParticipantIndex,
        participants: Vec<C::Point>,
        threshold: usize,
        secret: C::Scalar,
        rng: &mut R,
    ) -> Result<Self> {
        let n = participants.len();
        if threshold == 0 || threshold > n {
            return Err(Error::InvalidConfig(format!(
                "Threshold {threshold} out of range for {n} participants"
            )));
        }
        let dealer = *participants
            .get(index)
            .ok_or_else(|| Error::InvalidConfig(format!("Dealer index {index} out of range")))?;

        let secret_poly = SecretPoly::<C>::random(threshold, Some(secret), rng);
        let blinding_poly = SecretPoly::<C>::random(threshold, None, rng);

        let feldman = secret_poly.commit(&suite.base());
        let blinding = blinding_poly.commit(&suite.blinding_base());
        let commitments = feldman.add(&blinding)?.commitments().to_vec();

        let proof = RepresentationProof::prove(
            &suite,
            (&suite.base(), &suite.blinding_base()),
            (&secret_poly.secret(), &blinding_poly.secret()),
            rng,
        )?;
        let session_id = session_id::<C>(&dealer, &participants, &commitments, threshold);

        let deals = (0..n)
            .map(|j| Deal {
                session_id,
                sec_share: secret_poly.eval(j),
                rnd_share: blinding_poly.eval(j),
                threshold,
                commitments: commitments.clone(),
                proof: proof.clone(),
            })
            .collect();

        Ok(Self {
            suite,
            index,
            participants,
            session_id,
            deals,
            secret_commits: feldman,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Plaintext deal for `index`
    pub fn deal(&self, index: ParticipantIndex) -> Option<&Deal<C>> {
        self.deals.get(index)
    }

    /// One sealed deal per participant, in index order
    pub fn encrypted_deals<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<EncryptedDeal<C>>> {
        self.participants
            .iter()
            .zip(&self.deals)
            .map(|(recipient, deal)| encrypt_deal(&self.suite, recipient, deal, rng))
            .collect()
    }

    /// Answer a complaint about one of our deals with a justification. A
    /// response naming another session is answered like a complaint.
    pub fn process_response(&self, response: &Response) -> Result<Option<Justification<C>>> {
        let same_session = response.session_id == self.session_id;
        if response.approved && same_session {
            return Ok(None);
        }
        if !same_session {
            warn!(
                dealer = self.index,
                verifier = response.index,
                "Response carries a foreign session id"
            );
        }

        let deal = self.deals.get(response.index).ok_or_else(|| {
            Error::abort(response.index, "Response from unknown participant")
        })?;
        debug!(
            dealer = self.index,
            complainer = response.index,
            "Justifying complained deal"
        );

        Ok(Some(Justification {
            session_id: self.session_id,
            index: response.index,
            deal: deal.clone(),
        }))
    }

    pub fn secret_commits(&self) -> &PublicPoly<C> {
        &self.secret_commits
    }
}

/// One participant's view of one dealer's sharing
pub struct Verifier<C: Curve> {
    suite: Suite<C>,
    index: ParticipantIndex,
    dealer_index: ParticipantIndex,
    dealer: C::Point,
    participants: Vec<C::Point>,
    threshold: usize,
    /// Set only from a deal that passed verification
    session_id: Option<SessionId>,
    deal_received: bool,
    deal: Option<Deal<C>>,
    responses: BTreeMap<ParticipantIndex, bool>,
    bad_dealer: bool,
}

impl<C: Curve> Verifier<C> {
    pub fn new(
        suite: Suite<C>,
        index: ParticipantIndex,
        dealer_index: ParticipantIndex,
        participants: Vec<C::Point>,
        threshold: usize,
    ) -> Result<Self> {
        if index >= participants.len() {
            return Err(Error::InvalidConfig(format!(
                "Verifier index {index} out of range"
            )));
        }
        if threshold == 0 || threshold > participants.len() {
            return Err(Error::InvalidConfig(format!(
                "Threshold {threshold} out of range for {} participants",
                participants.len()
            )));
        }
        let dealer = *participants.get(dealer_index).ok_or_else(|| {
            Error::InvalidConfig(format!("Dealer index {dealer_index} out of range"))
        })?;

        Ok(Self {
            suite,
            index,
            dealer_index,
            dealer,
            participants,
            threshold,
            session_id: None,
            deal_received: false,
            deal: None,
            responses: BTreeMap::new(),
            bad_dealer: false,
        })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Our verified deal, if any
    pub fn deal(&self) -> Option<&Deal<C>> {
        self.deal.as_ref()
    }

    /// Pedersen commitments of the dealer, known once a valid deal was seen
    pub fn commitments(&self) -> Option<&[C::Point]> {
        self.deal.as_ref().map(|d| d.commitments.as_slice())
    }

    pub fn is_bad_dealer(&self) -> bool {
        self.bad_dealer
    }

    /// Decrypt and check our deal. An undecryptable or invalid deal yields a
    /// complaint rather than an error.
    pub fn process_encrypted_deal(
        &mut self,
        secret: &C::Scalar,
        encrypted: &EncryptedDeal<C>,
    ) -> Result<Response> {
        self.ensure_first_deal()?;

        let verdict = decrypt_deal(&self.suite, secret, encrypted).and_then(|deal| {
            if deal.session_id != encrypted.session_id {
                return Err(Error::abort(
                    self.dealer_index,
                    "Sealed deal names another session",
                ));
            }
            self.verify_deal(&deal, self.index).map(|_| deal)
        });
        self.settle_own_deal(verdict, encrypted.session_id)
    }

    /// Check a deal handed over in the clear (the dealer's own share)
    pub fn process_deal(&mut self, deal: Deal<C>) -> Result<Response> {
        self.ensure_first_deal()?;

        let claimed = deal.session_id;
        let verdict = self.verify_deal(&deal, self.index).map(|_| deal);
        self.settle_own_deal(verdict, claimed)
    }

    fn ensure_first_deal(&mut self) -> Result<()> {
        if self.deal_received {
            return Err(Error::abort(self.dealer_index, "Deal already processed"));
        }
        self.deal_received = true;
        Ok(())
    }

    /// A complaint echoes the session id the deal claimed, which is all we
    /// know until a justification arrives.
    fn settle_own_deal(
        &mut self,
        verdict: Result<Deal<C>>,
        claimed: SessionId,
    ) -> Result<Response> {
        let approved = match verdict {
            Ok(deal) => {
                self.session_id = Some(deal.session_id);
                self.deal = Some(deal);
                true
            }
            Err(e) => {
                warn!(
                    dealer = self.dealer_index,
                    verifier = self.index,
                    error = %e,
                    "Complaining about deal"
                );
                false
            }
        };

        let response = Response {
            session_id: claimed,
            index: self.index,
            approved,
        };
        self.responses.insert(self.index, approved);
        Ok(response)
    }

    /// Check a deal meant for `recipient` against the dealer's commitments
    pub fn verify_deal(&self, deal: &Deal<C>, recipient: ParticipantIndex) -> Result<()> {
        let dealer = self.dealer_index;
        if let Some(expected) = self.session_id {
            if deal.session_id != expected {
                return Err(Error::abort(dealer, "Deal session id mismatch"));
            }
        }
        if deal.threshold != self.threshold || deal.commitments.len() != self.threshold {
            return Err(Error::abort(dealer, "Deal has the wrong threshold"));
        }
        let recomputed =
            session_id::<C>(&self.dealer, &self.participants, &deal.commitments, self.threshold);
        if recomputed != deal.session_id {
            return Err(Error::abort(dealer, "Deal session id does not match its commitments"));
        }
        if deal.sec_share.index != recipient || deal.rnd_share.index != recipient {
            return Err(Error::abort(dealer, "Deal addressed to another participant"));
        }

        let constant = deal.commitments[0];
        deal.proof.verify(
            &self.suite,
            (&self.suite.base(), &self.suite.blinding_base()),
            &constant,
        )?;

        if !pedersen_check(&self.suite, &deal.commitments, &deal.sec_share, &deal.rnd_share) {
            return Err(Error::abort(dealer, "Deal share does not match commitments"));
        }
        Ok(())
    }

    /// Record another verifier's response. An approval of a session other
    /// than ours counts as a complaint: the dealer has to justify that deal.
    pub fn process_response(&mut self, response: &Response) -> Result<()> {
        if response.index >= self.participants.len() {
            return Err(Error::abort(response.index, "Response from unknown participant"));
        }
        let mut approved = response.approved;
        if approved && self.session_id.is_some_and(|own| own != response.session_id) {
            warn!(
                dealer = self.dealer_index,
                verifier = response.index,
                "Approval names another session, counted as a complaint"
            );
            approved = false;
        }
        self.set_response(response.index, approved)
    }

    /// Record a verdict without a message (the dealer implicitly approves its own deal)
    pub fn set_response(&mut self, index: ParticipantIndex, approved: bool) -> Result<()> {
        if self.responses.contains_key(&index) {
            return Err(Error::abort(index, "Response already recorded"));
        }
        self.responses.insert(index, approved);
        Ok(())
    }

    /// Apply a justification. A valid one turns the complaint into an approval;
    /// an invalid one disqualifies the dealer. Without a verified deal of our
    /// own, the justified deal is bound to the dealer only through its
    /// recomputed session id.
    pub fn process_justification(&mut self, justification: &Justification<C>) -> Result<()> {
        if self
            .session_id
            .is_some_and(|own| own != justification.session_id)
        {
            return Err(Error::abort(self.dealer_index, "Justification session id mismatch"));
        }
        if !self.responses.contains_key(&justification.index) {
            return Err(Error::abort(
                self.dealer_index,
                "Justification without a response",
            ));
        }

        let verdict = if justification.deal.session_id != justification.session_id {
            Err(Error::abort(
                self.dealer_index,
                "Justified deal names another session",
            ))
        } else {
            self.verify_deal(&justification.deal, justification.index)
        };
        match verdict {
            Ok(()) => {
                self.responses.insert(justification.index, true);
                if justification.index == self.index {
                    if self.session_id.is_none() {
                        self.session_id = Some(justification.session_id);
                    }
                    self.deal = Some(justification.deal.clone());
                }
                debug!(
                    dealer = self.dealer_index,
                    complainer = justification.index,
                    "Complaint resolved by justification"
                );
            }
            Err(e) => {
                warn!(
                    dealer = self.dealer_index,
                    complainer = justification.index,
                    error = %e,
                    "Invalid justification, dealer disqualified"
                );
                self.bad_dealer = true;
            }
        }
        Ok(())
    }

    pub fn approvals(&self) -> usize {
        self.responses.values().filter(|approved| **approved).count()
    }

    /// Every response is in, none is an outstanding complaint, at least `t`
    /// approve, and the dealer was never caught cheating
    pub fn deal_certified(&self) -> bool {
        !self.bad_dealer
            && self.deal.is_some()
            && self.responses.len() == self.participants.len()
            && self.responses.values().all(|approved| *approved)
            && self.approvals() >= self.threshold
    }
}

/// `f(x)·G + g(x)·H == sum C_k x^k`
pub(crate) fn pedersen_check<C: Curve>(
    suite: &Suite<C>,
    commitments: &[C::Point],
    sec_share: &Share<C>,
    rnd_share: &Share<C>,
) -> bool {
    if sec_share.index != rnd_share.index || commitments.is_empty() {
        return false;
    }
    let Ok(poly) = PublicPoly::<C>::new(commitments.to_vec()) else {
        return false;
    };
    let expected = poly.eval(sec_share.index);
    let actual = suite.base() * sec_share.value + suite.blinding_base() * rnd_share.value;
    expected == actual
}
