//! Player commands and a queue for batching them.
//!
//! Every state change goes through a [`Command`] applied by
//! [`crate::engine::Engine::apply`]. Presentation layers that collect input
//! between frames can push commands onto a [`CommandQueue`] and flush it in
//! one go; the queue optionally keeps a history for debugging and replay.

use serde::{Deserialize, Serialize};

use crate::fixed::{Day, Fixed64, Money};
use crate::id::{MachineId, OrderId, ProductKind, ResourceKind, WorkerId};
use crate::machine::MachineSpec;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    // -- Resources and products --
    BuyResource { kind: ResourceKind, amount: u32 },
    SellProduct { product: ProductKind, amount: u32 },
    SetProductPrice { product: ProductKind, price: Money },
    UnlockProduct { product: ProductKind },

    // -- Machines --
    AssignMachine { machine: MachineId, product: ProductKind },
    UnassignMachine { machine: MachineId },
    UpgradeMachine { machine: MachineId },
    RepairMachine { machine: MachineId },
    FixDefect { machine: MachineId },
    DiscardDefect { machine: MachineId },
    ApplyBooster { machine: MachineId, days: u32 },
    BuyMachine { spec: MachineSpec },

    // -- Orders --
    AcceptOrder { order: OrderId },
    RejectOrder { order: OrderId },
    ShipOrder { order: OrderId },
    NegotiateDeadline { order: OrderId },
    CancelOrder { order: OrderId },

    // -- Workforce --
    HireWorker { worker: WorkerId },
    AssignWorker { worker: WorkerId, machine: MachineId },
    UnassignWorker { worker: WorkerId },
    MotivateWorker { worker: WorkerId, amount: u32 },
    TrainWorker { worker: WorkerId },

    // -- Finance --
    TakeLoan { amount: Money, days: u32, rate: Fixed64 },

    // -- Clock --
    StartSimulation,
    AdjustGamePace { pace: Fixed64 },
    Tick,
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::BuyResource { .. } => "BuyResource",
            Command::SellProduct { .. } => "SellProduct",
            Command::SetProductPrice { .. } => "SetProductPrice",
            Command::UnlockProduct { .. } => "UnlockProduct",
            Command::AssignMachine { .. } => "AssignMachine",
            Command::UnassignMachine { .. } => "UnassignMachine",
            Command::UpgradeMachine { .. } => "UpgradeMachine",
            Command::RepairMachine { .. } => "RepairMachine",
            Command::FixDefect { .. } => "FixDefect",
            Command::DiscardDefect { .. } => "DiscardDefect",
            Command::ApplyBooster { .. } => "ApplyBooster",
            Command::BuyMachine { .. } => "BuyMachine",
            Command::AcceptOrder { .. } => "AcceptOrder",
            Command::RejectOrder { .. } => "RejectOrder",
            Command::ShipOrder { .. } => "ShipOrder",
            Command::NegotiateDeadline { .. } => "NegotiateDeadline",
            Command::CancelOrder { .. } => "CancelOrder",
            Command::HireWorker { .. } => "HireWorker",
            Command::AssignWorker { .. } => "AssignWorker",
            Command::UnassignWorker { .. } => "UnassignWorker",
            Command::MotivateWorker { .. } => "MotivateWorker",
            Command::TrainWorker { .. } => "TrainWorker",
            Command::TakeLoan { .. } => "TakeLoan",
            Command::StartSimulation => "StartSimulation",
            Command::AdjustGamePace { .. } => "AdjustGamePace",
            Command::Tick => "Tick",
        }
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting to be applied, plus an optional bounded history.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// Applied commands: (day, command).
    history: Vec<(Day, Command)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Take all pending commands in submission order, recording them in
    /// history under `day`.
    pub fn drain(&mut self, day: Day) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|cmd| (day, cmd.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Day, Command)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
