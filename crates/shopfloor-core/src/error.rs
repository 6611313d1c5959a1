//! Why a command was rejected.
//!
//! A rejected command never mutates state. Callers get the reason back so the
//! presentation layer can explain it.

use crate::fixed::{Day, Money};
use crate::id::{MachineId, OrderId, ProductKind, ResourceKind, Stage, WorkerId};

/// Broad category of a [`CommandError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The game state does not allow it right now (money, stock, deadlines).
    Validation,
    /// The command names an entity that does not exist.
    NotFound,
    /// The entity exists but is in the wrong state for this command.
    StateConflict,
    /// The command itself is nonsensical. Indicates a caller bug.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    // -- Validation --
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Money, available: Money },
    #[error("insufficient {kind:?}: need {needed}, have {available}")]
    InsufficientStock {
        kind: ResourceKind,
        needed: u32,
        available: u32,
    },
    #[error("{kind:?} storage holds {capacity}, buying {requested} more than {held} exceeds it")]
    CapacityExceeded {
        kind: ResourceKind,
        held: u32,
        requested: u32,
        capacity: u32,
    },
    #[error("insufficient {product:?} in inventory: need {needed}, have {available}")]
    InsufficientInventory {
        product: ProductKind,
        needed: u32,
        available: u32,
    },
    #[error("order deadline (day {deadline}) has already passed (day {day})")]
    DeadlineExpired { deadline: Day, day: Day },
    #[error("price {price} outside allowed range [{min}, {max}]")]
    PriceOutOfRange { price: Money, min: Money, max: Money },
    #[error("loan limit reached ({max} active)")]
    LoanLimitReached { max: u32 },

    // -- NotFound --
    #[error("machine {0:?} not found")]
    MachineNotFound(MachineId),
    #[error("worker {0:?} not found")]
    WorkerNotFound(WorkerId),
    #[error("order {0:?} not found")]
    OrderNotFound(OrderId),

    // -- StateConflict --
    #[error("machine is a {actual:?} machine, command needs {expected:?}")]
    WrongStage { expected: Stage, actual: Stage },
    #[error("machine is busy")]
    MachineBusy,
    #[error("machine is idle")]
    MachineIdle,
    #[error("machine has no defect to resolve")]
    NoDefect,
    #[error("machine is holding a defective unit")]
    DefectPending,
    #[error("machine is under maintenance")]
    UnderMaintenance,
    #[error("product {0:?} is locked")]
    ProductLocked(ProductKind),
    #[error("product {0:?} is already unlocked")]
    ProductAlreadyUnlocked(ProductKind),
    #[error("worker is not hired")]
    WorkerNotHired,
    #[error("worker is already hired")]
    WorkerAlreadyHired,
    #[error("worker is already assigned to that machine")]
    AlreadyAssigned,
    #[error("worker is not assigned to any machine")]
    NotAssigned,
    #[error("worker motivation is already at maximum")]
    MotivationMaxed,
    #[error("worker skill is already at maximum level {0}")]
    SkillMaxed(u32),
    #[error("order is not open for this command")]
    OrderNotOpen,
    #[error("order has no open complaint")]
    NoComplaint,
    #[error("simulation has not been started")]
    NotStarted,
    #[error("simulation is already running")]
    AlreadyStarted,
    #[error("factory is bankrupt")]
    Bankrupt,

    // -- Malformed --
    #[error("malformed command: {0}")]
    Malformed(&'static str),
}

impl CommandError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            CommandError::InsufficientFunds { .. }
            | CommandError::InsufficientStock { .. }
            | CommandError::CapacityExceeded { .. }
            | CommandError::InsufficientInventory { .. }
            | CommandError::DeadlineExpired { .. }
            | CommandError::PriceOutOfRange { .. }
            | CommandError::LoanLimitReached { .. } => ErrorClass::Validation,
            CommandError::MachineNotFound(_)
            | CommandError::WorkerNotFound(_)
            | CommandError::OrderNotFound(_) => ErrorClass::NotFound,
            CommandError::Malformed(_) => ErrorClass::Malformed,
            CommandError::WrongStage { .. }
            | CommandError::MachineBusy
            | CommandError::MachineIdle
            | CommandError::NoDefect
            | CommandError::DefectPending
            | CommandError::UnderMaintenance
            | CommandError::ProductLocked(_)
            | CommandError::ProductAlreadyUnlocked(_)
            | CommandError::WorkerNotHired
            | CommandError::WorkerAlreadyHired
            | CommandError::AlreadyAssigned
            | CommandError::NotAssigned
            | CommandError::MotivationMaxed
            | CommandError::SkillMaxed(_)
            | CommandError::OrderNotOpen
            | CommandError::NoComplaint
            | CommandError::NotStarted
            | CommandError::AlreadyStarted
            | CommandError::Bankrupt => ErrorClass::StateConflict,
        }
    }
}

/// Check that `cash` covers `cost`.
pub(crate) fn ensure_funds(cash: Money, cost: Money) -> Result<(), CommandError> {
    if cost > cash {
        return Err(CommandError::InsufficientFunds {
            needed: cost,
            available: cash,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(
            CommandError::InsufficientFunds {
                needed: Money::from_num(10),
                available: Money::ZERO
            }
            .class(),
            ErrorClass::Validation
        );
        assert_eq!(
            CommandError::MachineNotFound(MachineId::default()).class(),
            ErrorClass::NotFound
        );
        assert_eq!(CommandError::MachineBusy.class(), ErrorClass::StateConflict);
        assert_eq!(CommandError::Malformed("zero").class(), ErrorClass::Malformed);
    }

    #[test]
    fn ensure_funds_checks_balance() {
        assert!(ensure_funds(Money::from_num(500), Money::from_num(500)).is_ok());
        assert!(matches!(
            ensure_funds(Money::from_num(499), Money::from_num(500)),
            Err(CommandError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn display_mentions_amounts() {
        let err = CommandError::InsufficientStock {
            kind: ResourceKind::Glass,
            needed: 3,
            available: 1,
        };
        assert_eq!(err.to_string(), "insufficient Glass: need 3, have 1");
    }
}
