//! C ABI for the sentinel validation engine.
//!
//! This crate builds the `sentinel_guard` shared library that game hosts
//! load over a flat C surface. The exported functions keep their
//! historical `dg_` prefix and calling conventions so existing hosts link
//! without changes: integer-returning calls yield `1` on success and `0`
//! on failure, and `dg_init` also returns `0` when the engine was already
//! initialized.
//!
//! The surface drives one process-wide default engine created by
//! [`dg_init`] and destroyed by [`dg_shutdown`]. Hosts that want several
//! independent engines in one process use the `sentinel` crate directly.
//!
//! All pointer parameters are checked for NULL and invalid calls degrade
//! to failure returns or no-ops; passing a non-NULL pointer with a wrong
//! length is still undefined behavior, as in any C API.

use std::slice;

use parking_lot::Mutex;

use sentinel::violation::DETAILS_CAPACITY;
use sentinel::{Guard, Violation, ViolationKind};

/// Default engine slot driven by `dg_init`/`dg_shutdown`.
static ENGINE: Mutex<Option<Guard>> = Mutex::new(None);

/// Wire-compatible packet header as exchanged with hosts.
///
/// The in-memory struct carries alignment padding; on the wire the header
/// is the packed 52-byte little-endian image produced by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub player_id: u32,
    pub sequence: u32,
    pub timestamp: u64,
    pub checksum: u32,
    pub signature: [u8; 32],
}

impl PacketHeader {
    fn from_core(header: &sentinel::PacketHeader) -> PacketHeader {
        PacketHeader {
            player_id: header.player_id,
            sequence: header.sequence,
            timestamp: header.timestamp,
            checksum: header.checksum,
            signature: header.signature,
        }
    }
}

/// A reported game action, as laid out by C hosts.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GameAction {
    pub entity_id: i32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub health: f32,
    pub damage: f32,
    pub action_type: u32,
}

impl GameAction {
    fn to_core(self) -> sentinel::GameAction {
        sentinel::GameAction {
            entity_id: self.entity_id,
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            pos_z: self.pos_z,
            health: self.health,
            damage: self.damage,
            action_type: self.action_type,
        }
    }
}

/// A recorded violation, as laid out by C hosts. `details` is a
/// NUL-terminated string, truncated to fit the buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ViolationReport {
    pub player_id: u32,
    pub violation_type: u32,
    pub severity: u32,
    pub timestamp: u64,
    pub details: [u8; DETAILS_CAPACITY],
}

impl ViolationReport {
    fn from_core(violation: &Violation) -> ViolationReport {
        let mut details = [0u8; DETAILS_CAPACITY];
        let bytes = violation.details.as_bytes();
        let len = bytes.len().min(DETAILS_CAPACITY - 1);
        details[..len].copy_from_slice(&bytes[..len]);

        ViolationReport {
            player_id: violation.player_id,
            violation_type: violation.kind.code(),
            severity: violation.severity,
            timestamp: violation.timestamp,
            details,
        }
    }
}

/// Creates the default engine from at most 64 bytes of `server_key`.
///
/// Returns `1` on success and `0` when an engine already exists (the
/// existing engine is left untouched).
///
/// # Safety
///
/// `server_key` must point to `key_len` readable bytes, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_init(server_key: *const u8, key_len: u32) -> i32 {
    let _ = env_logger::try_init();

    let key: &[u8] = if server_key.is_null() {
        &[]
    } else {
        slice::from_raw_parts(server_key, key_len as usize)
    };

    let mut slot = ENGINE.lock();
    if slot.is_some() {
        return 0;
    }
    *slot = Some(Guard::new(key));
    1
}

/// Destroys the default engine and every registered player.
#[no_mangle]
pub extern "C" fn dg_shutdown() {
    if ENGINE.lock().take().is_some() {
        log::info!("Guard engine shut down");
    }
}

/// Registers (or re-registers) a player.
///
/// A NULL or empty `session_key` asks the engine to generate a random
/// 32-byte key; a provided key is truncated to 32 bytes.
///
/// # Safety
///
/// `session_key` must point to `key_len` readable bytes, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_register_player(
    player_id: u32,
    session_key: *const u8,
    key_len: u32,
) -> i32 {
    let key = if session_key.is_null() || key_len == 0 {
        None
    } else {
        Some(slice::from_raw_parts(session_key, key_len as usize))
    };

    let slot = ENGINE.lock();
    match slot.as_ref() {
        Some(guard) => {
            guard.register_player(player_id, key);
            1
        }
        None => 0,
    }
}

/// Removes a player. No-op for unknown ids or before `dg_init`.
#[no_mangle]
pub extern "C" fn dg_unregister_player(player_id: u32) {
    if let Some(guard) = ENGINE.lock().as_ref() {
        guard.unregister_player(player_id);
    }
}

/// Authenticates an inbound packet (`header || payload`).
///
/// On success `out_header` receives the decoded header and the call
/// returns `1`. On any failure past the rate limiter the parsed header is
/// still copied out (when the buffer is long enough) so the host can log
/// what the client claimed; the call returns `0`.
///
/// # Safety
///
/// `data` must point to `len` readable bytes; `out_header` must be a
/// valid destination or NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_validate_packet(
    player_id: u32,
    data: *const u8,
    len: u32,
    out_header: *mut PacketHeader,
) -> i32 {
    if data.is_null() || out_header.is_null() {
        return 0;
    }
    let data = slice::from_raw_parts(data, len as usize);

    let slot = ENGINE.lock();
    let guard = match slot.as_ref() {
        Some(guard) => guard,
        None => return 0,
    };

    match guard.validate_packet(player_id, data) {
        Ok(header) => {
            *out_header = PacketHeader::from_core(&header);
            1
        }
        Err(sentinel::GuardError::Rejected(violation))
            if violation.kind != ViolationKind::RateLimit =>
        {
            if let Some(header) = sentinel::PacketHeader::read_from(data) {
                *out_header = PacketHeader::from_core(&header);
            }
            0
        }
        Err(_) => 0,
    }
}

/// Fills `header` for an outbound payload signed on behalf of the player.
/// The caller must transmit `header || data`.
///
/// # Safety
///
/// `data` must point to `len` readable bytes; `header` must be a valid
/// destination.
#[no_mangle]
pub unsafe extern "C" fn dg_sign_packet(
    player_id: u32,
    data: *const u8,
    len: u32,
    header: *mut PacketHeader,
) -> i32 {
    if data.is_null() || header.is_null() {
        return 0;
    }
    let payload = slice::from_raw_parts(data, len as usize);

    let slot = ENGINE.lock();
    let guard = match slot.as_ref() {
        Some(guard) => guard,
        None => return 0,
    };

    match guard.sign_packet(player_id, payload) {
        Ok(signed) => {
            *header = PacketHeader::from_core(&signed);
            1
        }
        Err(_) => 0,
    }
}

/// Validates a claimed movement; see the engine documentation for the
/// speed and tolerance rules.
#[no_mangle]
pub extern "C" fn dg_validate_position(
    player_id: u32,
    x: f32,
    y: f32,
    z: f32,
    delta_time: f32,
) -> i32 {
    match ENGINE.lock().as_ref() {
        Some(guard) => guard
            .validate_position(player_id, x, y, z, delta_time)
            .map_or(0, |_| 1),
        None => 0,
    }
}

/// Validates a damage report against the per-hit and range ceilings.
#[no_mangle]
pub extern "C" fn dg_validate_damage(
    player_id: u32,
    target_id: i32,
    damage: f32,
    distance: f32,
) -> i32 {
    match ENGINE.lock().as_ref() {
        Some(guard) => guard
            .validate_damage(player_id, target_id, damage, distance)
            .map_or(0, |_| 1),
        None => 0,
    }
}

/// Validates a health transition.
#[no_mangle]
pub extern "C" fn dg_validate_health(
    player_id: u32,
    old_health: f32,
    new_health: f32,
    max_health: f32,
) -> i32 {
    match ENGINE.lock().as_ref() {
        Some(guard) => guard
            .validate_health(player_id, old_health, new_health, max_health)
            .map_or(0, |_| 1),
        None => 0,
    }
}

/// Runs the composite action checks. On failure, when `report` is
/// non-NULL and a violation was recorded, the last violation for this
/// player is copied out.
///
/// # Safety
///
/// `action` must point to a valid `GameAction` or be NULL; `report` must
/// be a valid destination or NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_validate_action(
    player_id: u32,
    action: *const GameAction,
    report: *mut ViolationReport,
) -> i32 {
    if action.is_null() {
        return 0;
    }
    let action = (*action).to_core();

    let slot = ENGINE.lock();
    let guard = match slot.as_ref() {
        Some(guard) => guard,
        None => return 0,
    };

    match guard.validate_action(player_id, &action) {
        Ok(()) => 1,
        Err(err) => {
            if !report.is_null() {
                if let Some(violation) = err.violation() {
                    *report = ViolationReport::from_core(violation);
                }
            }
            0
        }
    }
}

/// Resynchronizes the tracked position without validation.
#[no_mangle]
pub extern "C" fn dg_update_player_position(player_id: u32, x: f32, y: f32, z: f32) {
    if let Some(guard) = ENGINE.lock().as_ref() {
        guard.update_player_position(player_id, x, y, z);
    }
}

/// Resynchronizes the tracked health without validation.
#[no_mangle]
pub extern "C" fn dg_update_player_health(player_id: u32, health: f32) {
    if let Some(guard) = ENGINE.lock().as_ref() {
        guard.update_player_health(player_id, health);
    }
}

/// Number of violations on the player's ledger; `0` for unknown players
/// or before `dg_init`.
#[no_mangle]
pub extern "C" fn dg_get_violation_count(player_id: u32) -> u32 {
    match ENGINE.lock().as_ref() {
        Some(guard) => guard.violation_count(player_id) as u32,
        None => 0,
    }
}

/// Copies the most recent violation into `report`. Returns `0` when the
/// ledger is empty or the player is unknown.
///
/// # Safety
///
/// `report` must be a valid destination or NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_get_last_violation(
    player_id: u32,
    report: *mut ViolationReport,
) -> i32 {
    if report.is_null() {
        return 0;
    }

    let slot = ENGINE.lock();
    let guard = match slot.as_ref() {
        Some(guard) => guard,
        None => return 0,
    };

    match guard.last_violation(player_id) {
        Some(violation) => {
            *report = ViolationReport::from_core(&violation);
            1
        }
        None => 0,
    }
}

/// Empties the player's ledger. Idempotent.
#[no_mangle]
pub extern "C" fn dg_clear_violations(player_id: u32) {
    if let Some(guard) = ENGINE.lock().as_ref() {
        guard.clear_violations(player_id);
    }
}

/// FNV-1a checksum over `data`, as used for packet payloads. Works
/// without an initialized engine; NULL data hashes as empty input.
///
/// # Safety
///
/// `data` must point to `len` readable bytes, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_compute_checksum(data: *const u8, len: u32) -> u32 {
    if data.is_null() {
        return sentinel::crypto::fnv1a(&[]);
    }
    sentinel::crypto::fnv1a(slice::from_raw_parts(data, len as usize))
}

/// Encrypts `data` in place with the XOR+rotate stream cipher. No-op for
/// NULL pointers or an empty key.
///
/// # Safety
///
/// `data` must point to `len` writable bytes and `key` to `key_len`
/// readable bytes, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn dg_encrypt_data(
    data: *mut u8,
    len: u32,
    key: *const u8,
    key_len: u32,
) {
    if data.is_null() || key.is_null() || key_len == 0 {
        return;
    }
    let data = slice::from_raw_parts_mut(data, len as usize);
    let key = slice::from_raw_parts(key, key_len as usize);
    sentinel::crypto::encrypt(data, key);
}

/// Decrypts `data` in place; inverse of [`dg_encrypt_data`].
///
/// # Safety
///
/// Same requirements as [`dg_encrypt_data`].
#[no_mangle]
pub unsafe extern "C" fn dg_decrypt_data(
    data: *mut u8,
    len: u32,
    key: *const u8,
    key_len: u32,
) {
    if data.is_null() || key.is_null() || key_len == 0 {
        return;
    }
    let data = slice::from_raw_parts_mut(data, len as usize);
    let key = slice::from_raw_parts(key, key_len as usize);
    sentinel::crypto::decrypt(data, key);
}
