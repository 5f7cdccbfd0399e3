//! # Sentinel
//!
//! Server-side anti-cheat validation engine for multiplayer games. The
//! host game server feeds it client traffic and reported actions; the
//! engine authenticates packets, checks the physics claims behind each
//! action against conservative upper bounds, and keeps a per-player
//! ledger of everything it rejected.
//!
//! ## Core Components
//!
//! ### Packet Pipeline
//! Every inbound packet passes a fixed sequence of gates: sliding-window
//! rate limit, header parse, replay-protecting sequence check, clock-skew
//! check, payload checksum and keyed signature. The first failing gate
//! both records a violation and rejects the packet. The same engine
//! signs outbound packets with the per-player session key.
//!
//! ### Action Validators
//! Position, damage and health validators compare reported values against
//! per-player limits with explicit tolerances so network jitter does not
//! produce false positives. Validators carry state across calls (last
//! position, last health) and never advance that state on a rejection.
//!
//! ### Player Registry
//! A single thread-safe registry binds session keys, tracked physics
//! state, sequence counters and the violation ledger to player ids.
//! Any number of host threads may call into the engine concurrently;
//! one internal mutex serializes all access.
//!
//! ## Design Philosophy
//!
//! ### Conservative Bounds, Not Simulation
//! The validators are not a physics engine. They apply upper bounds with
//! deliberate slack (speed tolerance, health epsilon, minimum flagged
//! distance) and leave judgment calls to the host: every rejection is
//! recorded with a severity hint, and the host decides when a ledger
//! justifies action.
//!
//! ### Wire-Exact Primitives
//! The checksum, signature and stream-cipher constructions are shared
//! with game clients byte-for-byte. They are lightweight by design and
//! are documented as protocol components, not as cryptography; replacing
//! any of them requires a coordinated protocol version bump.
//!
//! ### Explicit Engine Handles
//! [`Guard`] is an ordinary value; independent engines can coexist in one
//! process (separate test fixtures, sharded deployments). The companion
//! `sentinel-ffi` crate layers the flat C ABI with its process-wide
//! default engine on top of this crate.
//!
//! ## Usage Example
//!
//! ```rust
//! use sentinel::{Guard, PacketHeader};
//!
//! let guard = Guard::new(b"server key");
//! guard.register_player(7, Some(&[0u8; 32]));
//!
//! // Sign an outbound payload and frame it as header || payload.
//! let payload = [0u8; 16];
//! let header = guard.sign_packet(7, &payload).unwrap();
//! let mut packet = vec![0u8; PacketHeader::SIZE + payload.len()];
//! header.write_to(&mut packet);
//! packet[PacketHeader::SIZE..].copy_from_slice(&payload);
//!
//! // The inbound path authenticates the exact same framing.
//! let received = guard.validate_packet(7, &packet).unwrap();
//! assert_eq!(received.sequence, 1);
//!
//! // Physics claims are validated against per-player limits.
//! assert!(guard.validate_position(7, 0.1, 0.0, 0.0, 0.016).is_ok());
//! assert_eq!(guard.violation_count(7), 0);
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod player;
pub mod protocol;
pub mod violation;

pub use config::GuardConfig;
pub use engine::{Guard, PlayerSnapshot, ViolationHook};
pub use error::GuardError;
pub use protocol::{GameAction, PacketHeader};
pub use violation::{Violation, ViolationKind};
