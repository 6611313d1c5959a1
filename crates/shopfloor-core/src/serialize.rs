//! Binary snapshots of an engine.
//!
//! Provides binary serialization via `bitcode` with a versioned header and
//! per-subsystem hashing for desync debugging. A snapshot carries the config
//! and the full [`EngineState`]; the event bus, its listeners and the command
//! queue are not part of it.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::fixed::Day;
use crate::sim::StateHash;
use crate::state::EngineState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a shopfloor engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5F10_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot config is invalid: {0}")]
    InvalidConfig(#[from] crate::config::ConfigError),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every serialized snapshot. Enables format detection
/// and version checking before the payload is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Simulation day at the time the snapshot was taken.
    pub day: Day,
}

impl SnapshotHeader {
    pub fn new(day: Day) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            day,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Decode just enough of a snapshot to report its header.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    // bitcode has no partial decode, so this reads the whole payload.
    let snapshot: EngineSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    config: EngineConfig,
    state: EngineState,
}

// ---------------------------------------------------------------------------
// SubsystemHashes
// ---------------------------------------------------------------------------

/// Per-subsystem state hashes. When two engines diverge, comparing these
/// points at the component that differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemHashes {
    pub clock: u64,
    pub resources: u64,
    pub pipeline: u64,
    pub workforce: u64,
    pub orders: u64,
    pub finance: u64,
}

impl SubsystemHashes {
    /// Names of the subsystems that differ between `self` and `other`.
    pub fn diff(&self, other: &SubsystemHashes) -> Vec<&'static str> {
        [
            ("clock", self.clock, other.clock),
            ("resources", self.resources, other.resources),
            ("pipeline", self.pipeline, other.pipeline),
            ("workforce", self.workforce, other.workforce),
            ("orders", self.orders, other.orders),
            ("finance", self.finance, other.finance),
        ]
        .into_iter()
        .filter(|(_, a, b)| a != b)
        .map(|(name, _, _)| name)
        .collect()
    }
}

/// Hash a component through its bitcode encoding.
fn hash_encoded<T: Serialize>(value: &T) -> u64 {
    let mut h = StateHash::new();
    match bitcode::serialize(value) {
        Ok(bytes) => h.write(&bytes),
        Err(_) => h.write_u64(u64::MAX),
    }
    h.finish()
}

// ---------------------------------------------------------------------------
// Engine serialization methods
// ---------------------------------------------------------------------------

impl Engine {
    /// Serialize the config and state to a binary blob via bitcode.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.state.day),
            config: self.config().clone(),
            state: self.state.clone(),
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild an engine from [`Engine::serialize`] output.
    ///
    /// The header is validated before the engine is built. Listeners and
    /// suppressions must be registered again on the new engine.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: EngineSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;
        Ok(Engine::from_state(snapshot.config, snapshot.state)?)
    }

    pub fn subsystem_hashes(&self) -> SubsystemHashes {
        let state = &self.state;
        let mut clock = StateHash::new();
        clock.write_u32(state.day);
        clock.write_bool(state.started);
        clock.write_bool(state.bankrupt);
        clock.write_fixed64(state.game_pace);
        clock.write_u64(state.rng.state());

        SubsystemHashes {
            clock: clock.finish(),
            resources: hash_encoded(&(&state.resources, &state.catalog, &state.inventory)),
            pipeline: hash_encoded(&state.pipeline),
            workforce: hash_encoded(&state.workforce),
            orders: hash_encoded(&state.orders),
            finance: hash_encoded(&state.finance),
        }
    }
}
