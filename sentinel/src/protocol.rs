//! Wire format and host-facing data types.
//!
//! A guarded packet travels as `header || payload`. The header is exactly
//! [`PacketHeader::SIZE`] bytes, little-endian, with no padding; both the
//! checksum and the signature cover the payload only. The header's own
//! `player_id` field is informational: the validating call selects the
//! session key from its `player_id` parameter, never from the wire.
//!
//! Parsing and writing are explicit field-by-field operations. The header
//! must never be produced by copying a struct's memory: an in-memory
//! representation carries alignment padding the wire image does not.

use serde::{Deserialize, Serialize};

use crate::crypto::SIGNATURE_LEN;

/// Authentication header prepended to every guarded packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Sender's player id (informational on the wire).
    pub player_id: u32,
    /// Per-direction, strictly increasing packet counter.
    pub sequence: u32,
    /// Sender's clock at send time, in milliseconds since the epoch.
    pub timestamp: u64,
    /// FNV-1a hash of the payload.
    pub checksum: u32,
    /// Keyed signature of the payload.
    pub signature: [u8; SIGNATURE_LEN],
}

impl PacketHeader {
    /// Size of the encoded header in bytes.
    pub const SIZE: usize = 52;

    /// Decodes a header from the first [`Self::SIZE`] bytes of `buf`.
    ///
    /// Returns `None` when the buffer is too short.
    pub fn read_from(buf: &[u8]) -> Option<PacketHeader> {
        if buf.len() < Self::SIZE {
            return None;
        }

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&buf[20..52]);

        Some(PacketHeader {
            player_id: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            sequence: u32::from_le_bytes(buf[4..8].try_into().ok()?),
            timestamp: u64::from_le_bytes(buf[8..16].try_into().ok()?),
            checksum: u32::from_le_bytes(buf[16..20].try_into().ok()?),
            signature,
        })
    }

    /// Encodes the header into the first [`Self::SIZE`] bytes of `buf`.
    ///
    /// Returns `false` (writing nothing) when the buffer is too short.
    pub fn write_to(&self, buf: &mut [u8]) -> bool {
        if buf.len() < Self::SIZE {
            return false;
        }

        buf[0..4].copy_from_slice(&self.player_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..52].copy_from_slice(&self.signature);
        true
    }
}

/// A game action reported by a client, as handed over by the host server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    /// Target entity of the action, where applicable.
    pub entity_id: i32,
    /// Claimed actor position X.
    pub pos_x: f32,
    /// Claimed actor position Y.
    pub pos_y: f32,
    /// Claimed actor position Z.
    pub pos_z: f32,
    /// Claimed actor health.
    pub health: f32,
    /// Claimed damage dealt; zero or negative means no attack.
    pub damage: f32,
    /// Host-defined action discriminator.
    pub action_type: u32,
}
