//! Violation records and their classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capacity of the fixed details buffer at the C ABI, including the
/// terminating NUL. Longer messages are truncated at that boundary.
pub const DETAILS_CAPACITY: usize = 256;

/// Classification of a failed check.
///
/// The discriminant values are shared with game hosts and client tooling
/// and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ViolationKind {
    /// No violation; reserved placeholder value.
    None = 0,
    /// Movement faster than the configured speed ceiling.
    Speed = 1,
    /// Damage outside the accepted range.
    Damage = 2,
    /// Action attempted from an impossible position or range.
    Position = 3,
    /// Health change breaking the cap or heal-rate rules.
    Health = 4,
    /// Packet sequence number replayed or out of order.
    Sequence = 5,
    /// Packet checksum or signature mismatch.
    Signature = 6,
    /// Packet timestamp outside the accepted clock skew.
    Timestamp = 7,
    /// Packet or action rate above the per-second budget.
    RateLimit = 8,
}

impl ViolationKind {
    /// Numeric code as exchanged with hosts.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Maps a host-side code back to a kind.
    pub fn from_code(code: u32) -> Option<ViolationKind> {
        match code {
            0 => Some(ViolationKind::None),
            1 => Some(ViolationKind::Speed),
            2 => Some(ViolationKind::Damage),
            3 => Some(ViolationKind::Position),
            4 => Some(ViolationKind::Health),
            5 => Some(ViolationKind::Sequence),
            6 => Some(ViolationKind::Signature),
            7 => Some(ViolationKind::Timestamp),
            8 => Some(ViolationKind::RateLimit),
            _ => None,
        }
    }
}

/// A recorded check failure, appended to the offending player's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Player the violation was recorded against.
    pub player_id: u32,
    /// What rule was broken.
    pub kind: ViolationKind,
    /// Host hint from 1 (noise) to 3 (hard evidence).
    pub severity: u32,
    /// When the violation was observed, in milliseconds since the epoch.
    pub timestamp: u64,
    /// Human-readable context, ASCII-safe.
    pub details: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "player {}: {:?} (severity {}): {}",
            self.player_id, self.kind, self.severity, self.details
        )
    }
}
