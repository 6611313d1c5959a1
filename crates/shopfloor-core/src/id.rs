use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a machine in the fleet.
    pub struct MachineId;

    /// Identifies a worker, whether still a candidate or already hired.
    pub struct WorkerId;

    /// Identifies a customer order.
    pub struct OrderId;

    /// Identifies an outstanding loan.
    pub struct LoanId;
}

/// Raw materials bought from suppliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Metal,
    Plastic,
    Electronics,
    Glass,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Metal,
        ResourceKind::Plastic,
        ResourceKind::Electronics,
        ResourceKind::Glass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Finished goods the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Phone,
    Laptop,
    Tablet,
}

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [ProductKind::Phone, ProductKind::Laptop, ProductKind::Tablet];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A machine's role in the production chain. Also the skill a worker trains in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Assembly,
    Packaging,
    Quality,
}

impl Stage {
    /// Stages in the order a unit travels through them.
    pub const ALL: [Stage; 3] = [Stage::Assembly, Stage::Packaging, Stage::Quality];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stages after this one, nearest first.
    pub fn downstream(self) -> &'static [Stage] {
        match self {
            Stage::Assembly => &[Stage::Packaging, Stage::Quality],
            Stage::Packaging => &[Stage::Quality],
            Stage::Quality => &[],
        }
    }

    /// Human-readable label used when naming new machines.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Assembly => "Assembly Line",
            Stage::Packaging => "Packaging Unit",
            Stage::Quality => "Quality Control",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_stages_in_order() {
        assert_eq!(Stage::Assembly.downstream(), &[Stage::Packaging, Stage::Quality]);
        assert_eq!(Stage::Packaging.downstream(), &[Stage::Quality]);
        assert!(Stage::Quality.downstream().is_empty());
    }

    #[test]
    fn indices_match_all_order() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        for (i, kind) in ProductKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&ResourceKind::Electronics).unwrap();
        assert_eq!(json, "\"electronics\"");
        let stage: Stage = serde_json::from_str("\"quality\"").unwrap();
        assert_eq!(stage, Stage::Quality);
    }

    #[test]
    fn null_ids_are_default() {
        assert_eq!(MachineId::default(), MachineId::default());
        use slotmap::Key;
        assert!(OrderId::default().is_null());
    }
}
