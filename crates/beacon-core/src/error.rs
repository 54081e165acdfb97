//! Error types for beacon operations

use crate::round::Rejection;
use crate::zkp::ProofKind;
use crate::ParticipantIndex;
use thiserror::Error;

/// Result type alias for beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during key generation, encryption and decryption
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameters (threshold, party count, curve selection)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A point does not lie on the configured curve or is forbidden in its position
    #[error("Group membership error: {0}")]
    GroupMembership(String),

    /// The distributed key generation run cannot continue
    #[error("DKG aborted{}: {reason}", participant_suffix(.participant))]
    ProtocolAbort {
        /// Participant the fault is attributed to, when known
        participant: Option<ParticipantIndex>,
        reason: String,
    },

    /// A zero-knowledge proof did not verify
    #[error("{kind} proof verification failed (submitter: {})", .submitter.as_deref().unwrap_or("unknown"))]
    ProofVerification {
        kind: ProofKind,
        /// Host-level identity of whoever submitted the proof
        submitter: Option<String>,
    },

    /// Threshold requirements not met
    #[error("Insufficient shares: required {required}, got {actual}")]
    InsufficientShares { required: usize, actual: usize },

    /// Too few contributions of a round survived verification
    #[error(
        "Insufficient valid contributions: required {required}, got {actual} (rejected: {})",
        rejected_submitters(.rejections)
    )]
    InsufficientContributions {
        required: usize,
        actual: usize,
        rejections: Vec<Rejection>,
    },

    /// Two decryption shares claim the same index
    #[error("Duplicate share index: {0}")]
    DuplicateShareIndex(ParticipantIndex),

    /// Malformed encoding
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

fn participant_suffix(participant: &Option<ParticipantIndex>) -> String {
    match participant {
        Some(index) => format!(" (participant {index})"),
        None => String::new(),
    }
}

fn rejected_submitters(rejections: &[Rejection]) -> String {
    if rejections.is_empty() {
        return "none".into();
    }
    rejections
        .iter()
        .map(|r| r.submitter.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Abort attributed to a specific participant
    pub(crate) fn abort(participant: ParticipantIndex, reason: impl Into<String>) -> Self {
        Error::ProtocolAbort {
            participant: Some(participant),
            reason: reason.into(),
        }
    }

    /// Abort with no single participant to blame
    pub(crate) fn abort_structural(reason: impl Into<String>) -> Self {
        Error::ProtocolAbort {
            participant: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn proof(kind: ProofKind) -> Self {
        Error::ProofVerification {
            kind,
            submitter: None,
        }
    }

    /// Attach the submitter identity to a proof failure; other errors pass through.
    pub fn with_submitter(self, submitter: &str) -> Self {
        match self {
            Error::ProofVerification { kind, .. } => Error::ProofVerification {
                kind,
                submitter: Some(submitter.to_string()),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_display_names_participant() {
        let err = Error::abort(3, "deal already processed");
        assert_eq!(
            err.to_string(),
            "DKG aborted (participant 3): deal already processed"
        );

        let err = Error::abort_structural("QUAL sets diverge");
        assert_eq!(err.to_string(), "DKG aborted: QUAL sets diverge");
    }

    #[test]
    fn test_with_submitter() {
        let err = Error::proof(ProofKind::CiphertextCorrectness).with_submitter("validator-7");
        assert_eq!(
            err.to_string(),
            "CE proof verification failed (submitter: validator-7)"
        );

        let other = Error::DuplicateShareIndex(2).with_submitter("validator-7");
        assert!(matches!(other, Error::DuplicateShareIndex(2)));
    }

    #[test]
    fn test_insufficient_contributions_lists_rejections() {
        let err = Error::InsufficientContributions {
            required: 2,
            actual: 0,
            rejections: vec![
                Rejection {
                    submitter: "validator-0".into(),
                    reason: "CE proof verification failed".into(),
                },
                Rejection {
                    submitter: "validator-1".into(),
                    reason: "Duplicate contribution".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Insufficient valid contributions: required 2, got 0 (rejected: validator-0, validator-1)"
        );
    }
}
