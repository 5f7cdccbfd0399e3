//! Per-player state tracked by the engine.

use std::collections::VecDeque;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::clock::now_ms;
use crate::config::{GuardConfig, SESSION_KEY_LEN};
use crate::violation::Violation;

/// Everything the engine remembers about one registered player.
///
/// Instances live inside the engine's registry and are only ever touched
/// while its lock is held. Sequence counters are split by direction: the
/// inbound counter advances when a client packet is accepted, the outbound
/// counter stamps packets the server signs for this player.
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Player identifier; also the registry key.
    pub player_id: u32,
    /// Per-player signing secret, at most [`SESSION_KEY_LEN`] bytes.
    pub session_key: Vec<u8>,
    /// Last accepted or resynced position.
    pub last_position: (f32, f32, f32),
    /// When the position last changed, in epoch milliseconds.
    pub last_position_time: u64,
    /// Last accepted or resynced health value.
    pub last_health: f32,
    /// Highest sequence accepted from this player.
    pub last_inbound_sequence: u32,
    /// Sequence stamped on the most recent packet signed for this player.
    pub last_outbound_sequence: u32,
    /// When the last inbound packet was accepted, in epoch milliseconds.
    pub last_packet_time: u64,
    /// Start of the current packet rate window.
    pub packet_window_start: u64,
    /// Packets seen in the current window, valid or not.
    pub packet_count_in_window: u32,
    /// Start of the current named-action rate window.
    pub action_window_start: u64,
    /// Named actions seen in the current window.
    pub action_count_in_window: u32,
    /// Speed ceiling in world units per second.
    pub max_speed: f32,
    /// Damage ceiling per hit.
    pub max_damage: f32,
    /// Attack range ceiling in world units.
    pub max_attack_range: f32,
    /// Item pickup range ceiling in world units.
    pub max_pickup_range: f32,
    /// Packet and action budget per rate window.
    pub rate_limit: u32,
    /// Recorded violations, oldest first.
    pub violations: VecDeque<Violation>,
}

impl PlayerState {
    /// Creates fresh state for `player_id` with the limits from `config`.
    ///
    /// A provided session key is truncated to [`SESSION_KEY_LEN`] bytes;
    /// without one (or with an empty slice) a random key of exactly that
    /// length is generated from the operating system's entropy source.
    pub fn new(player_id: u32, session_key: Option<&[u8]>, config: &GuardConfig) -> Self {
        let session_key = match session_key {
            Some(key) if !key.is_empty() => key[..key.len().min(SESSION_KEY_LEN)].to_vec(),
            _ => generate_session_key(),
        };

        let now = now_ms();
        Self {
            player_id,
            session_key,
            last_position: (0.0, 0.0, 0.0),
            last_position_time: now,
            last_health: 100.0,
            last_inbound_sequence: 0,
            last_outbound_sequence: 0,
            last_packet_time: 0,
            packet_window_start: now,
            packet_count_in_window: 0,
            action_window_start: now,
            action_count_in_window: 0,
            max_speed: config.max_speed,
            max_damage: config.max_damage,
            max_attack_range: config.max_attack_range,
            max_pickup_range: config.max_pickup_range,
            rate_limit: config.rate_limit,
            violations: VecDeque::new(),
        }
    }
}

fn generate_session_key() -> Vec<u8> {
    let mut key = vec![0u8; SESSION_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}
