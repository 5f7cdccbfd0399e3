//! Tunable limits and protocol constants.
//!
//! The constants in this module fall into two groups. Protocol tolerances
//! (`POSITION_TOLERANCE`, `TIMESTAMP_TOLERANCE_MS`, ...) are fixed: both
//! sides of the wire assume them and they cannot vary per deployment.
//! Per-player limits (speed, damage, rate budgets) have defaults here but
//! are carried in [`GuardConfig`] so a host can tune them, typically by
//! deserializing a `[guard]` section of its own configuration file.

use serde::{Deserialize, Serialize};

/// Default maximum travel speed, in world units per second.
pub const DEFAULT_MAX_SPEED: f32 = 15.0;

/// Default maximum damage a single hit may claim.
pub const DEFAULT_MAX_DAMAGE: f32 = 500.0;

/// Default inbound packet budget per one-second window.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Default maximum range at which an attack may land.
pub const DEFAULT_MAX_ATTACK_RANGE: f32 = 100.0;

/// Default maximum range at which an item pickup is accepted.
pub const DEFAULT_MAX_PICKUP_RANGE: f32 = 5.0;

/// Ledger length at which the engine starts advising the host to remove
/// the player.
pub const DEFAULT_KICK_THRESHOLD: u32 = 10;

/// Multiplicative slack applied on top of `max_speed` before movement is
/// flagged; absorbs interpolation jitter and minor clock drift.
pub const POSITION_TOLERANCE: f32 = 0.5;

/// Movement shorter than this distance is never flagged, whatever the
/// implied speed; tiny corrections over tiny time steps are all noise.
pub const MIN_FLAGGED_DISTANCE: f32 = 1.0;

/// Accepted clock skew between a packet timestamp and server time.
pub const TIMESTAMP_TOLERANCE_MS: i64 = 5000;

/// Length of the sliding rate-limit window.
pub const RATE_WINDOW_MS: u64 = 1000;

/// Largest single-step heal accepted while the player is alive.
pub const HEALTH_JUMP_LIMIT: f32 = 50.0;

/// Slack over `max_health` tolerated before an overheal is flagged.
pub const HEALTH_EPSILON: f32 = 0.1;

/// Fallback simulation step (one 60 Hz tick) when the caller passes a
/// zero or negative delta.
pub const DEFAULT_DELTA_TIME: f32 = 0.016;

/// Length of generated session keys; provided keys are truncated to this.
pub const SESSION_KEY_LEN: usize = 32;

/// Server keys beyond this length are truncated.
pub const MAX_SERVER_KEY_LEN: usize = 64;

/// Violations kept per player before the oldest entries are dropped.
pub const MAX_LEDGER_LEN: usize = 4096;

/// Limits applied to every player registered after the engine is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Speed ceiling in world units per second.
    pub max_speed: f32,
    /// Damage ceiling per hit.
    pub max_damage: f32,
    /// Inbound packets (and named actions) allowed per second.
    pub rate_limit: u32,
    /// Attack range ceiling in world units.
    pub max_attack_range: f32,
    /// Item pickup range ceiling in world units.
    pub max_pickup_range: f32,
    /// Ledger length that triggers the removal advisory.
    pub kick_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            max_damage: DEFAULT_MAX_DAMAGE,
            rate_limit: DEFAULT_RATE_LIMIT,
            max_attack_range: DEFAULT_MAX_ATTACK_RANGE,
            max_pickup_range: DEFAULT_MAX_PICKUP_RANGE,
            kick_threshold: DEFAULT_KICK_THRESHOLD,
        }
    }
}
