//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (probes, relay, event sinks, storage, clock) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware directly.

use crate::config::ControlConfig;
use crate::error::{ActuatorError, SensorError};
use crate::scheduler::JobId;
use crate::sensors::SensorId;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per configured probe per tick.
pub trait SensorPort {
    /// Fresh reading in °C.  Failures are per-probe and non-fatal.
    fn read_sensor(&mut self, id: SensorId) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain ↔ heater relay)
// ───────────────────────────────────────────────────────────────

/// The heater relay.  The adapter owns the authoritative state; the
/// domain re-reads it at the start of every tick.
pub trait RelayPort {
    /// Current relay output (`true` = heater energised).
    fn relay_state(&mut self) -> Result<bool, ActuatorError>;

    /// Drive the relay.  Fire-and-forget: no acknowledgement beyond the
    /// driver's own result, and the domain never retries within a tick.
    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.  Never goes backwards.
pub trait ClockPort {
    /// Milliseconds since an arbitrary epoch (boot).
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists control configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped,
/// so a bad write can never disable the fail-safe (e.g. a zero timeout).
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ControlConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<ControlConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ControlConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the event loop)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a job comes due.
///
/// The main loop implements this by collecting fired jobs and dispatching
/// them to the [`AppService`](super::service::AppService); the scheduler
/// itself knows nothing about ports or the domain.
pub trait SchedulerDelegate {
    fn on_job_fired(&mut self, job: JobId);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Raw blob-store failures inside a [`ConfigPort`] adapter.  They surface
/// to callers as [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Caller's buffer is smaller than the stored value.
    BufferTooSmall,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            StorageError::Full => Self::StorageFull,
            StorageError::BufferTooSmall => Self::Corrupted,
            StorageError::IoError => Self::IoError,
        }
    }
}
