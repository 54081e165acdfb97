//! # Beacon Core
//!
//! Threshold cryptography for a verifiable randomness beacon.
//!
//! This crate provides:
//! - A prime-order group capability with secp256k1 and P-256 backends
//! - Pedersen-VSS distributed key generation (DKG)
//! - Threshold ElGamal encryption, partial decryption and recombination
//! - DLK, RK, DLEQ and CE zero-knowledge proofs
//!
//! ## Protocol Overview
//!
//! Key generation runs once per validator set. Every round, each participant
//! encrypts a random group element under the joint key and proves the
//! ciphertext well formed. The ciphertexts are summed, a quorum of `t`
//! key holders publish proven decryption shares, and Lagrange recombination
//! yields the sum of every contributed plaintext.
//!
//! ## Example
//!
//! ```rust,ignore
//! use beacon_core::{dkg, elgamal, CurveId, DkgConfig, Secp256k1, Suite};
//!
//! let config = DkgConfig::new(5, 3, CurveId::Secp256k1)?;
//! let output = dkg::run_dkg::<Secp256k1>(&config)?;
//!
//! let suite = Suite::<Secp256k1>::new()?;
//! let (contribution, _plaintext) = elgamal::encrypt(&suite, &output.public_key(), &mut rng)?;
//! ```

pub mod dkg;
pub mod elgamal;
pub mod error;
pub mod group;
pub mod poly;
pub mod round;
pub mod types;
pub mod vss;
pub mod zkp;

pub use dkg::{DistKeyShare, DkgOutput};
pub use elgamal::{Ciphertext, DecryptionShare};
pub use error::{Error, Result};
pub use group::{CanonicalEncoding, Curve, CurveId, NistP256, Secp256k1, Suite};
pub use types::{DkgConfig, GroupPublic, ParticipantIndex};
pub use zkp::ProofKind;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
