//! Error type for engine operations.

use thiserror::Error;

use crate::violation::Violation;

/// Errors returned by the validation engine.
///
/// Only [`GuardError::Rejected`] leaves a trace in the player's ledger;
/// the other variants are precondition failures that record nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    /// The player id has no registered state.
    #[error("player {0} is not registered")]
    UnknownPlayer(u32),

    /// The buffer is too short to contain a packet header.
    #[error("packet of {len} bytes is too short for a header")]
    TruncatedPacket {
        /// Length of the rejected buffer.
        len: usize,
    },

    /// A validation rule rejected the input; the violation carried here
    /// was appended to the player's ledger.
    #[error("{0}")]
    Rejected(Violation),
}

impl GuardError {
    /// The recorded violation, when this error represents one.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            GuardError::Rejected(violation) => Some(violation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationKind;

    #[test]
    fn test_error_display() {
        let err = GuardError::UnknownPlayer(12);
        assert_eq!(err.to_string(), "player 12 is not registered");

        let err = GuardError::TruncatedPacket { len: 10 };
        assert!(err.to_string().contains("10 bytes"));
    }

    #[test]
    fn test_violation_accessor() {
        let violation = Violation {
            player_id: 1,
            kind: ViolationKind::Health,
            severity: 3,
            timestamp: 0,
            details: "Health: 120.00, Max: 100.00".to_string(),
        };
        let err = GuardError::Rejected(violation.clone());
        assert_eq!(err.violation(), Some(&violation));
        assert_eq!(GuardError::UnknownPlayer(1).violation(), None);
    }
}
