//! Real-time driving and state hashing.
//!
//! The engine advances one simulated day per `Tick`. A game loop that only
//! knows wall-clock time calls [`crate::engine::Engine::advance`] with the
//! elapsed milliseconds; the engine accumulates them and runs as many whole
//! days as fit, carrying the remainder forward.

use crate::error::CommandError;
use crate::fixed::{Day, Fixed64};

// ---------------------------------------------------------------------------
// Tick summary and advance result
// ---------------------------------------------------------------------------

/// Headline numbers from one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickSummary {
    /// The day that was simulated (the counter has already moved past it).
    pub day: Day,
    pub units_produced: u32,
    pub units_defective: u32,
    pub orders_completed: u32,
    pub orders_failed: u32,
    pub payroll: Fixed64,
    pub installments: Fixed64,
    pub state_hash: u64,
}

/// Result of an `Engine::advance()` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdvanceResult {
    /// One entry per day simulated, oldest first.
    pub ticks: Vec<TickSummary>,
    /// Set when a tick was refused (for example after bankruptcy). The
    /// accumulator is discarded when this happens.
    pub halted: Option<CommandError>,
}

impl AdvanceResult {
    pub fn ticks_run(&self) -> usize {
        self.ticks.len()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic hash of simulation state for desync and replay checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[u8::from(v)]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
