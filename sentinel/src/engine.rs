//! Engine registry and validation pipeline.
//!
//! [`Guard`] owns every piece of mutable state behind a single mutex: the
//! player registry, the captured server key and the violation hook. Each
//! public operation locks exactly once, finds the player, runs its checks
//! and returns; there are no suspension points and no internal threads.
//!
//! The check routines themselves (`check_packet`, `check_position`, ...)
//! are lock-free functions over a `&mut PlayerState`. Public wrappers lock,
//! delegate, and turn a check failure into a recorded [`Violation`]. Keeping
//! the checks out from under the locking layer lets the composite
//! [`Guard::validate_action`] run several of them under one lock without
//! recursive locking, and keeps them directly testable.

use std::collections::HashMap;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::now_ms;
use crate::config::{
    GuardConfig, DEFAULT_DELTA_TIME, HEALTH_EPSILON, HEALTH_JUMP_LIMIT, MAX_LEDGER_LEN,
    MAX_SERVER_KEY_LEN, MIN_FLAGGED_DISTANCE, POSITION_TOLERANCE, RATE_WINDOW_MS,
    TIMESTAMP_TOLERANCE_MS,
};
use crate::crypto;
use crate::error::GuardError;
use crate::player::PlayerState;
use crate::protocol::{GameAction, PacketHeader};
use crate::violation::{Violation, ViolationKind};

/// Callback invoked for every recorded violation.
///
/// Runs with the registry lock held; the hook must not call back into the
/// engine.
pub type ViolationHook = Box<dyn Fn(&Violation) + Send + Sync>;

/// Read-only view of a player's tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Last accepted or resynced position.
    pub position: (f32, f32, f32),
    /// Last accepted or resynced health.
    pub health: f32,
    /// Highest sequence accepted from the player.
    pub inbound_sequence: u32,
    /// Sequence stamped on the most recent outbound packet.
    pub outbound_sequence: u32,
    /// Current length of the violation ledger.
    pub violation_count: usize,
}

/// A failed check, before it is written to the ledger.
struct Fault {
    kind: ViolationKind,
    severity: u32,
    details: String,
}

/// Packet check outcome that is not a success.
enum PacketFault {
    /// Buffer shorter than a header; returned without recording.
    Truncated { len: usize },
    /// A pipeline rule tripped; recorded against the player.
    Fault(Fault),
}

/// A process-local anti-cheat engine.
///
/// All methods take `&self` and are safe to call from any number of host
/// threads; a single internal mutex serializes them.
pub struct Guard {
    inner: Mutex<Registry>,
}

struct Registry {
    // Captured at construction and truncated to MAX_SERVER_KEY_LEN; not
    // consulted by any current check (signatures use session keys).
    #[allow(dead_code)]
    server_key: Vec<u8>,
    config: GuardConfig,
    players: HashMap<u32, PlayerState>,
    hook: Option<ViolationHook>,
}

impl Guard {
    /// Creates an engine with default limits, capturing at most
    /// [`MAX_SERVER_KEY_LEN`] bytes of `server_key`.
    pub fn new(server_key: &[u8]) -> Guard {
        Guard::with_config(server_key, GuardConfig::default())
    }

    /// Creates an engine whose future registrations use `config`.
    pub fn with_config(server_key: &[u8], config: GuardConfig) -> Guard {
        let key_len = server_key.len().min(MAX_SERVER_KEY_LEN);
        info!("Guard engine initialized ({} byte server key)", key_len);
        Guard {
            inner: Mutex::new(Registry {
                server_key: server_key[..key_len].to_vec(),
                config,
                players: HashMap::new(),
                hook: None,
            }),
        }
    }

    /// Registers `player_id`, replacing any existing state for that id.
    ///
    /// A provided session key is truncated to 32 bytes; `None` (or an
    /// empty slice) generates a random 32-byte key.
    pub fn register_player(&self, player_id: u32, session_key: Option<&[u8]>) {
        let mut registry = self.inner.lock();
        let state = PlayerState::new(player_id, session_key, &registry.config);
        info!("Registered player {}", player_id);
        registry.players.insert(player_id, state);
    }

    /// Removes the player's state. No-op when the id is unknown.
    pub fn unregister_player(&self, player_id: u32) {
        let mut registry = self.inner.lock();
        if registry.players.remove(&player_id).is_some() {
            info!("Unregistered player {}", player_id);
        }
    }

    /// Returns true when `player_id` is currently registered.
    pub fn is_registered(&self, player_id: u32) -> bool {
        self.inner.lock().players.contains_key(&player_id)
    }

    /// Number of currently registered players.
    pub fn player_count(&self) -> usize {
        self.inner.lock().players.len()
    }

    /// Returns a read-only view of the player's tracked state.
    pub fn snapshot(&self, player_id: u32) -> Option<PlayerSnapshot> {
        let registry = self.inner.lock();
        registry.players.get(&player_id).map(|player| PlayerSnapshot {
            position: player.last_position,
            health: player.last_health,
            inbound_sequence: player.last_inbound_sequence,
            outbound_sequence: player.last_outbound_sequence,
            violation_count: player.violations.len(),
        })
    }

    /// Installs a callback invoked for every recorded violation, replacing
    /// any previous hook.
    pub fn set_violation_hook(&self, hook: ViolationHook) {
        self.inner.lock().hook = Some(hook);
    }

    /// Authenticates an inbound packet (`header || payload`) for
    /// `player_id` and returns the decoded header.
    ///
    /// Checks run in a fixed order (rate window, length, sequence,
    /// timestamp, checksum, signature) and the first failure aborts the
    /// rest. Rate, sequence, timestamp, checksum and signature failures
    /// are recorded; an unknown player or a truncated buffer is not.
    /// Only full acceptance advances the inbound sequence.
    pub fn validate_packet(&self, player_id: u32, data: &[u8]) -> Result<PacketHeader, GuardError> {
        let mut registry = self.inner.lock();
        let now = now_ms();

        let player = registry
            .players
            .get_mut(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_packet(player, data, now) {
            Ok(header) => {
                debug!("Accepted packet {} from player {}", header.sequence, player_id);
                Ok(header)
            }
            Err(PacketFault::Truncated { len }) => Err(GuardError::TruncatedPacket { len }),
            Err(PacketFault::Fault(fault)) => Err(registry.record(player_id, fault)),
        }
    }

    /// Fills in the authentication header for an outbound payload signed
    /// on behalf of `player_id`.
    ///
    /// The header signs `data` exactly as passed; the caller must transmit
    /// `header || data` so the receiving side verifies the same bytes.
    pub fn sign_packet(&self, player_id: u32, data: &[u8]) -> Result<PacketHeader, GuardError> {
        let mut registry = self.inner.lock();
        let player = registry
            .players
            .get_mut(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        player.last_outbound_sequence = player.last_outbound_sequence.wrapping_add(1);
        Ok(PacketHeader {
            player_id,
            sequence: player.last_outbound_sequence,
            timestamp: now_ms(),
            checksum: crypto::fnv1a(data),
            signature: crypto::sign(data, &player.session_key),
        })
    }

    /// Checks a claimed movement to `(x, y, z)` over `delta_time` seconds.
    ///
    /// On success the tracked position is updated; on a speed violation it
    /// is left untouched, so a cheater cannot ratchet forward through
    /// rejected steps.
    pub fn validate_position(
        &self,
        player_id: u32,
        x: f32,
        y: f32,
        z: f32,
        delta_time: f32,
    ) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        registry.validate_position(player_id, x, y, z, delta_time)
    }

    /// Checks a damage report against the per-hit and range ceilings.
    pub fn validate_damage(
        &self,
        player_id: u32,
        target_id: i32,
        damage: f32,
        distance: f32,
    ) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        registry.validate_damage(player_id, target_id, damage, distance)
    }

    /// Checks a health transition against the hard cap and the sudden-heal
    /// rule; on success the tracked health becomes `new_health`.
    pub fn validate_health(
        &self,
        player_id: u32,
        old_health: f32,
        new_health: f32,
        max_health: f32,
    ) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        registry.validate_health(player_id, old_health, new_health, max_health)
    }

    /// Runs the composite checks for a reported game action under a single
    /// lock acquisition.
    ///
    /// The position check always runs; the damage check runs when the
    /// action claims positive damage. Every sub-check records its own
    /// violation even after an earlier one failed. On failure the returned
    /// error carries the last violation recorded for this player.
    pub fn validate_action(&self, player_id: u32, action: &GameAction) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        let mut last_error = None;

        if let Err(err) = registry.validate_position(
            player_id,
            action.pos_x,
            action.pos_y,
            action.pos_z,
            DEFAULT_DELTA_TIME,
        ) {
            last_error = Some(err);
        }

        if action.damage > 0.0 {
            // The action carries no target position, so attack reach is
            // measured on the XZ plane from the world origin. Wire-level
            // peers depend on this exact measure; changing it is a
            // protocol break.
            let distance = (action.pos_x * action.pos_x + action.pos_z * action.pos_z).sqrt();
            if let Err(err) =
                registry.validate_damage(player_id, action.entity_id, action.damage, distance)
            {
                last_error = Some(err);
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Checks that an item pickup happens within reach of the player.
    /// No tracked state changes.
    pub fn validate_pickup(
        &self,
        player_id: u32,
        player_pos: (f32, f32, f32),
        item_pos: (f32, f32, f32),
    ) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        let player = registry
            .players
            .get(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_pickup(player, player_pos, item_pos) {
            Ok(()) => Ok(()),
            Err(fault) => Err(registry.record(player_id, fault)),
        }
    }

    /// Counts a named game action against the player's one-second action
    /// window; over budget records a rate-limit violation.
    ///
    /// This window is separate from the packet window: a host typically
    /// meters expensive actions (crafting, trading, spawning) here while
    /// the packet pipeline meters raw traffic.
    pub fn validate_action_rate(&self, player_id: u32, action: &str) -> Result<(), GuardError> {
        let mut registry = self.inner.lock();
        let now = now_ms();

        let player = registry
            .players
            .get_mut(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_action_rate(player, action, now) {
            Ok(()) => Ok(()),
            Err(fault) => Err(registry.record(player_id, fault)),
        }
    }

    /// Resynchronizes the tracked position without validation, e.g. after
    /// a server-initiated teleport. No-op when the id is unknown.
    pub fn update_player_position(&self, player_id: u32, x: f32, y: f32, z: f32) {
        let mut registry = self.inner.lock();
        if let Some(player) = registry.players.get_mut(&player_id) {
            player.last_position = (x, y, z);
            player.last_position_time = now_ms();
        }
    }

    /// Resynchronizes the tracked health without validation, e.g. after a
    /// respawn. No-op when the id is unknown.
    pub fn update_player_health(&self, player_id: u32, health: f32) {
        let mut registry = self.inner.lock();
        if let Some(player) = registry.players.get_mut(&player_id) {
            player.last_health = health;
        }
    }

    /// Number of violations currently on the player's ledger. Zero for an
    /// unknown player.
    pub fn violation_count(&self, player_id: u32) -> usize {
        let registry = self.inner.lock();
        registry
            .players
            .get(&player_id)
            .map_or(0, |player| player.violations.len())
    }

    /// The most recent violation on the player's ledger, if any.
    pub fn last_violation(&self, player_id: u32) -> Option<Violation> {
        let registry = self.inner.lock();
        registry
            .players
            .get(&player_id)
            .and_then(|player| player.violations.back().cloned())
    }

    /// Empties the player's ledger. Idempotent; no-op for an unknown id.
    pub fn clear_violations(&self, player_id: u32) {
        let mut registry = self.inner.lock();
        if let Some(player) = registry.players.get_mut(&player_id) {
            player.violations.clear();
        }
    }
}

impl Registry {
    fn validate_position(
        &mut self,
        player_id: u32,
        x: f32,
        y: f32,
        z: f32,
        delta_time: f32,
    ) -> Result<(), GuardError> {
        let now = now_ms();
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_position(player, x, y, z, delta_time, now) {
            Ok(()) => Ok(()),
            Err(fault) => Err(self.record(player_id, fault)),
        }
    }

    fn validate_damage(
        &mut self,
        player_id: u32,
        target_id: i32,
        damage: f32,
        distance: f32,
    ) -> Result<(), GuardError> {
        let player = self
            .players
            .get(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_damage(player, damage, distance) {
            Ok(()) => {
                debug!(
                    "Accepted damage report from player {} against entity {}",
                    player_id, target_id
                );
                Ok(())
            }
            Err(fault) => Err(self.record(player_id, fault)),
        }
    }

    fn validate_health(
        &mut self,
        player_id: u32,
        old_health: f32,
        new_health: f32,
        max_health: f32,
    ) -> Result<(), GuardError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(GuardError::UnknownPlayer(player_id))?;

        match check_health(player, old_health, new_health, max_health) {
            Ok(()) => Ok(()),
            Err(fault) => Err(self.record(player_id, fault)),
        }
    }

    /// Appends a violation to the player's ledger, notifies the hook and
    /// returns the error to hand back to the caller.
    fn record(&mut self, player_id: u32, fault: Fault) -> GuardError {
        let violation = Violation {
            player_id,
            kind: fault.kind,
            severity: fault.severity,
            timestamp: now_ms(),
            details: fault.details,
        };
        warn!("{}", violation);

        if let Some(player) = self.players.get_mut(&player_id) {
            player.violations.push_back(violation.clone());
            if player.violations.len() > MAX_LEDGER_LEN {
                player.violations.pop_front();
            }
            let count = player.violations.len();
            if count >= self.config.kick_threshold as usize {
                warn!(
                    "Player {} has {} violations, consider removing them",
                    player_id, count
                );
            }
        }

        if let Some(hook) = &self.hook {
            hook(&violation);
        }

        GuardError::Rejected(violation)
    }
}

fn check_packet(player: &mut PlayerState, data: &[u8], now: u64) -> Result<PacketHeader, PacketFault> {
    // The window counts every arriving frame, parseable or not; flooding
    // with garbage must not be cheaper than flooding with valid traffic.
    if now.saturating_sub(player.packet_window_start) > RATE_WINDOW_MS {
        player.packet_window_start = now;
        player.packet_count_in_window = 0;
    }
    player.packet_count_in_window += 1;
    if player.packet_count_in_window > player.rate_limit {
        return Err(PacketFault::Fault(Fault {
            kind: ViolationKind::RateLimit,
            severity: 1,
            details: "Rate limit exceeded".to_string(),
        }));
    }

    let header = PacketHeader::read_from(data)
        .ok_or(PacketFault::Truncated { len: data.len() })?;

    // A replayed or reordered packet never advances the counter. The very
    // first packet may carry any sequence, including zero.
    if header.sequence <= player.last_inbound_sequence && player.last_inbound_sequence > 0 {
        return Err(PacketFault::Fault(Fault {
            kind: ViolationKind::Sequence,
            severity: 2,
            details: "Invalid sequence number".to_string(),
        }));
    }

    let skew = now as i64 - header.timestamp as i64;
    if skew.abs() > TIMESTAMP_TOLERANCE_MS {
        return Err(PacketFault::Fault(Fault {
            kind: ViolationKind::Timestamp,
            severity: 2,
            details: "Invalid timestamp".to_string(),
        }));
    }

    let payload = &data[PacketHeader::SIZE..];
    if crypto::fnv1a(payload) != header.checksum {
        return Err(PacketFault::Fault(Fault {
            kind: ViolationKind::Signature,
            severity: 3,
            details: "Checksum mismatch".to_string(),
        }));
    }
    if !crypto::verify(payload, &player.session_key, &header.signature) {
        return Err(PacketFault::Fault(Fault {
            kind: ViolationKind::Signature,
            severity: 3,
            details: "Signature verification failed".to_string(),
        }));
    }

    player.last_inbound_sequence = header.sequence;
    player.last_packet_time = now;
    Ok(header)
}

fn check_position(
    player: &mut PlayerState,
    x: f32,
    y: f32,
    z: f32,
    delta_time: f32,
    now: u64,
) -> Result<(), Fault> {
    let delta_time = if delta_time <= 0.0 { DEFAULT_DELTA_TIME } else { delta_time };

    let (last_x, last_y, last_z) = player.last_position;
    let (dx, dy, dz) = (x - last_x, y - last_y, z - last_z);
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();
    let speed = distance / delta_time;
    let max_allowed = player.max_speed * (1.0 + POSITION_TOLERANCE);

    if speed > max_allowed && distance > MIN_FLAGGED_DISTANCE {
        return Err(Fault {
            kind: ViolationKind::Speed,
            severity: 2,
            details: format!(
                "Speed: {:.2}, Max: {:.2}, Dist: {:.2}",
                speed, max_allowed, distance
            ),
        });
    }

    player.last_position = (x, y, z);
    player.last_position_time = now;
    Ok(())
}

fn check_damage(player: &PlayerState, damage: f32, distance: f32) -> Result<(), Fault> {
    if damage < 0.0 || damage > player.max_damage {
        return Err(Fault {
            kind: ViolationKind::Damage,
            severity: 3,
            details: format!("Damage: {:.2}, Max: {:.2}", damage, player.max_damage),
        });
    }

    if distance > player.max_attack_range {
        return Err(Fault {
            kind: ViolationKind::Position,
            severity: 2,
            details: format!("Attack distance: {:.2}", distance),
        });
    }

    Ok(())
}

fn check_health(
    player: &mut PlayerState,
    old_health: f32,
    new_health: f32,
    max_health: f32,
) -> Result<(), Fault> {
    if new_health > max_health + HEALTH_EPSILON {
        return Err(Fault {
            kind: ViolationKind::Health,
            severity: 3,
            details: format!("Health: {:.2}, Max: {:.2}", new_health, max_health),
        });
    }

    // Dead players may be revived to any value; for the living, a heal
    // beyond the step limit is flagged.
    if new_health > old_health + HEALTH_JUMP_LIMIT && old_health > 0.0 {
        return Err(Fault {
            kind: ViolationKind::Health,
            severity: 2,
            details: format!("Health jump: {:.2} -> {:.2}", old_health, new_health),
        });
    }

    player.last_health = new_health;
    Ok(())
}

fn check_pickup(
    player: &PlayerState,
    player_pos: (f32, f32, f32),
    item_pos: (f32, f32, f32),
) -> Result<(), Fault> {
    let (dx, dy, dz) = (
        item_pos.0 - player_pos.0,
        item_pos.1 - player_pos.1,
        item_pos.2 - player_pos.2,
    );
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();

    if distance > player.max_pickup_range {
        return Err(Fault {
            kind: ViolationKind::Position,
            severity: 2,
            details: format!("Pickup range: {:.1}", distance),
        });
    }

    Ok(())
}

fn check_action_rate(player: &mut PlayerState, action: &str, now: u64) -> Result<(), Fault> {
    if now.saturating_sub(player.action_window_start) > RATE_WINDOW_MS {
        player.action_window_start = now;
        player.action_count_in_window = 0;
    }
    player.action_count_in_window += 1;

    if player.action_count_in_window > player.rate_limit {
        return Err(Fault {
            kind: ViolationKind::RateLimit,
            severity: 1,
            details: format!("Action: {}, Count: {}", action, player.action_count_in_window),
        });
    }

    Ok(())
}
