//! Integration tests for the validation engine
//!
//! These tests exercise complete flows through the public API: packets are
//! signed, framed and validated the way a real host would do it, and the
//! time-window behaviors run against the actual clock.

use sentinel::crypto;
use sentinel::{GameAction, Guard, GuardConfig, GuardError, PacketHeader, ViolationKind};
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn new_guard() -> Guard {
    let _ = env_logger::try_init();
    Guard::new(b"integration server key")
}

/// Frames a signed header and its payload the way the wire expects:
/// `header || payload`, with the payload being the exact signed bytes.
fn frame(header: &PacketHeader, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; PacketHeader::SIZE + payload.len()];
    assert!(header.write_to(&mut packet));
    packet[PacketHeader::SIZE..].copy_from_slice(payload);
    packet
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// PACKET PIPELINE TESTS
mod packet_pipeline_tests {
    use super::*;

    /// Signs a packet, frames it, and validates it through the same engine
    #[test]
    fn signature_round_trip() {
        let guard = new_guard();
        let session_key: Vec<u8> = (0u8..32).collect();
        guard.register_player(7, Some(&session_key));

        let payload = [0u8; 16];
        let header = guard.sign_packet(7, &payload).unwrap();
        let packet = frame(&header, &payload);
        assert_eq!(packet.len(), 68);

        let received = guard.validate_packet(7, &packet).unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.player_id, 7);
        assert_eq!(guard.violation_count(7), 0);
    }

    /// Replaying an accepted packet unchanged must be flagged as a
    /// sequence violation
    #[test]
    fn replay_is_rejected() {
        let guard = new_guard();
        guard.register_player(7, Some(&[1u8; 32]));

        let payload = b"state update";
        let header = guard.sign_packet(7, payload).unwrap();
        let packet = frame(&header, payload);

        assert!(guard.validate_packet(7, &packet).is_ok());

        let err = guard.validate_packet(7, &packet).unwrap_err();
        let violation = err.violation().expect("replay must be recorded");
        assert_eq!(violation.kind, ViolationKind::Sequence);
        assert_eq!(violation.severity, 2);
        assert_eq!(guard.violation_count(7), 1);
    }

    /// Out-of-order delivery (lower sequence than the last accepted) is
    /// rejected without advancing the counter
    #[test]
    fn stale_sequence_is_rejected() {
        let guard = new_guard();
        guard.register_player(3, Some(&[2u8; 32]));

        let first = frame(&guard.sign_packet(3, b"a").unwrap(), b"a");
        let second = frame(&guard.sign_packet(3, b"b").unwrap(), b"b");

        assert!(guard.validate_packet(3, &second).is_ok());
        assert!(guard.validate_packet(3, &first).is_err());
        assert_eq!(guard.snapshot(3).unwrap().inbound_sequence, 2);
    }

    /// A forged timestamp outside the ±5 s window fails even with a valid
    /// signature
    #[test]
    fn timestamp_skew_is_rejected() {
        let guard = new_guard();
        let key = [3u8; 32];
        guard.register_player(5, Some(&key));

        let payload = b"time traveler";
        let header = PacketHeader {
            player_id: 5,
            sequence: 1,
            timestamp: epoch_ms() + 10_000,
            checksum: crypto::fnv1a(payload),
            signature: crypto::sign(payload, &key),
        };
        let packet = frame(&header, payload);

        let err = guard.validate_packet(5, &packet).unwrap_err();
        assert_eq!(err.violation().unwrap().kind, ViolationKind::Timestamp);

        // The rejection must not have consumed the sequence number.
        assert_eq!(guard.snapshot(5).unwrap().inbound_sequence, 0);
    }

    /// A flipped payload byte fails the checksum gate before the signature
    /// gate is even consulted
    #[test]
    fn corrupted_payload_is_rejected() {
        let guard = new_guard();
        guard.register_player(6, Some(&[4u8; 32]));

        let payload = b"intact payload!!";
        let header = guard.sign_packet(6, payload).unwrap();
        let mut packet = frame(&header, payload);
        packet[PacketHeader::SIZE] ^= 0xFF;

        let err = guard.validate_packet(6, &packet).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, ViolationKind::Signature);
        assert_eq!(violation.severity, 3);
        assert_eq!(violation.details, "Checksum mismatch");
    }

    /// A packet signed under the wrong session key passes the checksum but
    /// fails signature verification
    #[test]
    fn wrong_session_key_is_rejected() {
        let guard = new_guard();
        guard.register_player(8, Some(&[5u8; 32]));

        let payload = b"who am I";
        let header = PacketHeader {
            player_id: 8,
            sequence: 1,
            timestamp: epoch_ms(),
            checksum: crypto::fnv1a(payload),
            signature: crypto::sign(payload, &[99u8; 32]),
        };
        let packet = frame(&header, payload);

        let err = guard.validate_packet(8, &packet).unwrap_err();
        assert_eq!(err.violation().unwrap().details, "Signature verification failed");
    }

    /// Truncated buffers and unknown players fail without touching any
    /// ledger
    #[test]
    fn preconditions_record_nothing() {
        let guard = new_guard();
        guard.register_player(9, Some(&[6u8; 32]));

        let err = guard.validate_packet(9, &[0u8; 51]).unwrap_err();
        assert_eq!(err, GuardError::TruncatedPacket { len: 51 });
        assert_eq!(guard.violation_count(9), 0);

        let err = guard.validate_packet(1000, &[0u8; 100]).unwrap_err();
        assert_eq!(err, GuardError::UnknownPlayer(1000));
    }

    /// The first inbound packet may carry any sequence value
    #[test]
    fn first_packet_sequence_is_free() {
        let guard = new_guard();
        let key = [7u8; 32];
        guard.register_player(11, Some(&key));

        let payload = b"hello";
        let header = PacketHeader {
            player_id: 11,
            sequence: 9_000_000,
            timestamp: epoch_ms(),
            checksum: crypto::fnv1a(payload),
            signature: crypto::sign(payload, &key),
        };

        assert!(guard.validate_packet(11, &frame(&header, payload)).is_ok());
        assert_eq!(guard.snapshot(11).unwrap().inbound_sequence, 9_000_000);
    }
}

/// RATE LIMIT TESTS
mod rate_limit_tests {
    use super::*;

    /// The 101st packet within one second trips the limiter; after a quiet
    /// second the window resets and traffic flows again
    #[test]
    fn packet_rate_window_resets() {
        let guard = new_guard();
        guard.register_player(9, Some(&[8u8; 32]));

        let payload = b"tick";
        for i in 0..100 {
            let header = guard.sign_packet(9, payload).unwrap();
            let packet = frame(&header, payload);
            assert!(
                guard.validate_packet(9, &packet).is_ok(),
                "packet {} should pass",
                i
            );
        }

        let header = guard.sign_packet(9, payload).unwrap();
        let packet = frame(&header, payload);
        let err = guard.validate_packet(9, &packet).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, ViolationKind::RateLimit);
        assert_eq!(violation.severity, 1);

        // The rejected packet must not have advanced the sequence.
        assert_eq!(guard.snapshot(9).unwrap().inbound_sequence, 100);

        sleep(Duration::from_millis(1100));

        let header = guard.sign_packet(9, payload).unwrap();
        let packet = frame(&header, payload);
        assert!(guard.validate_packet(9, &packet).is_ok());
        assert_eq!(guard.violation_count(9), 1);
    }

    /// A custom rate budget from the engine config is honored
    #[test]
    fn configured_rate_limit_applies() {
        let _ = env_logger::try_init();
        let config = GuardConfig {
            rate_limit: 3,
            ..GuardConfig::default()
        };
        let guard = Guard::with_config(b"key", config);
        guard.register_player(1, Some(&[9u8; 32]));

        let payload = b"x";
        for _ in 0..3 {
            let packet = frame(&guard.sign_packet(1, payload).unwrap(), payload);
            assert!(guard.validate_packet(1, &packet).is_ok());
        }
        let packet = frame(&guard.sign_packet(1, payload).unwrap(), payload);
        assert!(guard.validate_packet(1, &packet).is_err());
    }
}

/// VALIDATOR SCENARIO TESTS
mod validator_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// Teleport-scale movement is flagged and the tracked position stays
    /// where it was
    #[test]
    fn speed_hack_scenario() {
        let guard = new_guard();
        guard.register_player(3, None);
        guard.update_player_position(3, 0.0, 0.0, 0.0);

        let err = guard.validate_position(3, 100.0, 0.0, 0.0, 0.1).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, ViolationKind::Speed);
        assert_eq!(violation.severity, 2);

        let snapshot = guard.snapshot(3).unwrap();
        assert_eq!(snapshot.position, (0.0, 0.0, 0.0));
        assert_eq!(snapshot.violation_count, 1);
    }

    /// Ordinary movement within the allowance passes and advances state
    #[test]
    fn legal_movement_passes() {
        let guard = new_guard();
        guard.register_player(3, None);
        guard.update_player_position(3, 0.0, 0.0, 0.0);

        // 2 units in 0.1 s is 20 u/s, inside the 22.5 u/s allowance.
        assert!(guard.validate_position(3, 2.0, 0.0, 0.0, 0.1).is_ok());
        let position = guard.snapshot(3).unwrap().position;
        assert_approx_eq!(position.0, 2.0, 0.0001);
        assert_approx_eq!(position.1, 0.0, 0.0001);
    }

    /// A heal jump of more than 50 while alive is flagged at severity 2
    #[test]
    fn health_jump_scenario() {
        let guard = new_guard();
        guard.register_player(5, None);

        let err = guard.validate_health(5, 10.0, 80.0, 100.0).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, ViolationKind::Health);
        assert_eq!(violation.severity, 2);
    }

    /// A full action report flows through position and damage checks
    #[test]
    fn action_within_limits_passes() {
        let guard = new_guard();
        guard.register_player(4, None);
        guard.update_player_position(4, 10.0, 0.0, 10.0);

        let action = GameAction {
            entity_id: 77,
            pos_x: 10.1,
            pos_y: 0.0,
            pos_z: 10.0,
            health: 95.0,
            damage: 40.0,
            action_type: 1,
        };
        assert!(guard.validate_action(4, &action).is_ok());
        assert_eq!(guard.violation_count(4), 0);
    }
}

/// ENGINE LIFECYCLE TESTS
mod engine_tests {
    use super::*;

    /// Two engines in one process share nothing
    #[test]
    fn engines_are_independent() {
        let a = new_guard();
        let b = Guard::new(b"other server key");

        a.register_player(1, Some(&[1u8; 32]));
        assert!(a.is_registered(1));
        assert!(!b.is_registered(1));

        assert!(a.validate_damage(1, 2, -1.0, 0.0).is_err());
        assert_eq!(a.violation_count(1), 1);
        assert_eq!(b.violation_count(1), 0);
    }

    /// Session keys are engine-local: a packet signed by one engine does
    /// not verify under another engine's generated key
    #[test]
    fn generated_keys_do_not_cross_engines() {
        let a = new_guard();
        let b = Guard::new(b"other server key");
        a.register_player(1, None);
        b.register_player(1, None);

        let payload = b"cross talk";
        let packet = frame(&a.sign_packet(1, payload).unwrap(), payload);

        assert!(a.validate_packet(1, &packet).is_ok());
        let err = b.validate_packet(1, &packet).unwrap_err();
        assert_eq!(err.violation().unwrap().kind, ViolationKind::Signature);
    }

    /// Unregistering ends all tracking for the id
    #[test]
    fn unregister_drops_all_state() {
        let guard = new_guard();
        guard.register_player(2, None);
        assert!(guard.validate_health(2, 100.0, 200.0, 100.0).is_err());
        assert_eq!(guard.violation_count(2), 1);

        guard.unregister_player(2);
        assert_eq!(guard.violation_count(2), 0);
        assert_eq!(guard.snapshot(2), None);
        assert_eq!(
            guard.validate_position(2, 0.0, 0.0, 0.0, 0.016),
            Err(GuardError::UnknownPlayer(2))
        );
    }
}

/// CONCURRENCY TESTS
mod concurrency_tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// Hammering one engine from several host threads must neither lose
    /// violations nor corrupt per-player state
    #[test]
    fn concurrent_validation_is_consistent() {
        let guard = Arc::new(new_guard());
        for player_id in 0..4u32 {
            guard.register_player(player_id, Some(&[player_id as u8; 32]));
        }

        let mut handles = Vec::new();
        for player_id in 0..4u32 {
            let guard = Arc::clone(&guard);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    // Every iteration: one violation, one legal check.
                    let _ = guard.validate_damage(player_id, 1, -1.0, 0.0);
                    assert!(guard.validate_damage(player_id, 1, 10.0, 5.0).is_ok());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for player_id in 0..4u32 {
            assert_eq!(guard.violation_count(player_id), 50);
        }
    }
}
