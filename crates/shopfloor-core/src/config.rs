//! Balance constants and starting scenario for an engine.
//!
//! Every tunable number the simulation reads lives here so a game (or a test)
//! can rebalance without touching the engine. [`EngineConfig::default`] is the
//! stock campaign.

use serde::{Deserialize, Serialize};

use crate::fixed::{f64_to_fixed64, Day, Fixed64, Money};
use crate::id::{ProductKind, ResourceKind, Stage};

// ---------------------------------------------------------------------------
// Catalog definitions
// ---------------------------------------------------------------------------

/// Starting definition of a raw resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub kind: ResourceKind,
    pub name: String,
    pub icon: String,
    pub quantity: u32,
    pub capacity: u32,
    pub unit_cost: Money,
}

/// Catalog entry for a finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDef {
    pub kind: ProductKind,
    pub name: String,
    pub icon: String,
    pub price: Money,
    /// Days of base work per unit at speed 1, efficiency 1.
    pub production_time: u32,
    pub requires: Vec<(ResourceKind, u32)>,
    pub unlocked: bool,
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Purchase price of a new machine per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinePricing {
    pub assembly: Money,
    pub packaging: Money,
    pub quality: Money,
}

impl MachinePricing {
    pub fn price(&self, stage: Stage) -> Money {
        match stage {
            Stage::Assembly => self.assembly,
            Stage::Packaging => self.packaging,
            Stage::Quality => self.quality,
        }
    }
}

/// Per-level and per-unit fees charged by player commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub upgrade_per_level: Money,
    pub rework_per_level: Money,
    pub booster_per_level: Money,
    pub repair_per_level: Money,
    /// Signing cost as a multiple of the worker's daily salary.
    pub hire_salary_multiple: u32,
    pub motivate_per_point: Money,
    pub train_per_skill_level: Money,
    /// Unlock price as a multiple of the product's sale price.
    pub unlock_price_multiple: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Multiplier on `production_time × 100` per stage, indexed by [`Stage::index`].
    pub stage_time_factor: [Fixed64; 3],
    /// Progress a machine at speed 1, efficiency 1 makes per day. Scenarios
    /// raise it to 100 so `production_time` reads as days of work.
    pub progress_per_day: Fixed64,
    pub booster_multiplier: Fixed64,
    pub base_defect_chance: Fixed64,
    pub min_defect_chance: Fixed64,
    /// How much one point of quality factor lowers the defect chance.
    pub quality_slope: Fixed64,
    pub worker_speed_coefficient: Fixed64,
    pub worker_quality_coefficient: Fixed64,
    /// Bonus multiplier when a worker's skill matches the machine's stage.
    pub matched_skill_relevance: Fixed64,
    pub unmatched_skill_relevance: Fixed64,
    pub upgrade_efficiency_step: Fixed64,
    pub upgrade_speed_step: Fixed64,
    /// Efficiency lost per completed cycle.
    pub wear_per_cycle: Fixed64,
    /// Wear never drops efficiency below this share of rated efficiency.
    pub min_efficiency_ratio: Fixed64,
    pub maintenance_days: Day,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfig {
    pub initial_orders: u32,
    pub spawn_chance: Fixed64,
    /// Cap on available plus active orders.
    pub max_open_orders: u32,
    pub max_quantity: u32,
    pub min_lead_days: Day,
    /// Deadline slack is drawn from `0..lead_spread_days`.
    pub lead_spread_days: Day,
    pub reward_margin: Fixed64,
    /// Extra reward per day of slack below the maximum.
    pub urgency_step: Fixed64,
    /// Days a complaint stays open before auto-cancelling. Zero disables
    /// complaints: late orders fail immediately.
    pub complaint_window_days: Day,
    pub renegotiate_extension_days: Day,
    pub renegotiate_penalty: Fixed64,
    pub cancel_penalty: Fixed64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkforceConfig {
    pub initial_candidates: u32,
    pub candidate_spawn_chance: Fixed64,
    pub candidate_pool_cap: u32,
    pub decay_min: Fixed64,
    /// Daily decay is `decay_min + U[0, decay_span)`.
    pub decay_span: Fixed64,
    pub morale_smoothing: Fixed64,
    pub tired_below: Fixed64,
    pub unmotivated_below: Fixed64,
    pub motivation_per_point: Fixed64,
    pub train_motivation_boost: Fixed64,
    pub max_skill_level: u32,
    pub max_candidate_skill: u32,
    pub base_salary: Money,
    pub salary_per_skill_level: Money,
    pub candidate_min_motivation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceConfig {
    pub max_active_loans: u32,
    /// If set, a tick ending with cash below this value bankrupts the factory.
    pub bankruptcy_floor: Option<Money>,
    pub days_per_year: u32,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything needed to construct an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub seed: u64,
    pub starting_day: Day,
    pub starting_cash: Money,
    pub starting_morale: Fixed64,
    pub game_pace: Fixed64,
    pub max_game_pace: Fixed64,
    /// Wall-clock milliseconds per simulated day for [`crate::engine::Engine::advance`].
    pub day_length_ms: u64,
    /// Upper bound of a product's price as a multiple of its material cost.
    pub max_price_markup: u32,
    pub resources: Vec<ResourceDef>,
    pub products: Vec<ProductDef>,
    pub starting_fleet: Vec<Stage>,
    pub machine_prices: MachinePricing,
    pub fees: FeeSchedule,
    pub pipeline: PipelineConfig,
    pub orders: OrderConfig,
    pub workforce: WorkforceConfig,
    pub finance: FinanceConfig,
}

/// Problems found by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("resource {0:?} is defined more than once")]
    DuplicateResource(ResourceKind),
    #[error("resource {0:?} is not defined")]
    MissingResource(ResourceKind),
    #[error("product {0:?} is defined more than once")]
    DuplicateProduct(ProductKind),
    #[error("product {0:?} is not defined")]
    MissingProduct(ProductKind),
    #[error("resource {kind:?} starts with {quantity} units but holds at most {capacity}")]
    OverCapacity {
        kind: ResourceKind,
        quantity: u32,
        capacity: u32,
    },
    #[error("{field} must be a probability in [0, 1], got {value}")]
    InvalidProbability { field: &'static str, value: f64 },
    #[error("invalid value for {field}: {detail}")]
    InvalidValue { field: &'static str, detail: String },
}

impl EngineConfig {
    /// Check cross-field invariants. The engine refuses configs that fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = [false; 4];
        for def in &self.resources {
            if seen[def.kind.index()] {
                return Err(ConfigError::DuplicateResource(def.kind));
            }
            seen[def.kind.index()] = true;
            if def.quantity > def.capacity {
                return Err(ConfigError::OverCapacity {
                    kind: def.kind,
                    quantity: def.quantity,
                    capacity: def.capacity,
                });
            }
        }
        if let Some(kind) = ResourceKind::ALL.iter().find(|k| !seen[k.index()]) {
            return Err(ConfigError::MissingResource(*kind));
        }

        let mut seen = [false; 3];
        for def in &self.products {
            if seen[def.kind.index()] {
                return Err(ConfigError::DuplicateProduct(def.kind));
            }
            seen[def.kind.index()] = true;
            if def.production_time == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "products.production_time",
                    detail: format!("{:?} must take at least one day", def.kind),
                });
            }
        }
        if let Some(kind) = ProductKind::ALL.iter().find(|k| !seen[k.index()]) {
            return Err(ConfigError::MissingProduct(*kind));
        }

        for (field, value) in [
            ("orders.spawn_chance", self.orders.spawn_chance),
            ("workforce.candidate_spawn_chance", self.workforce.candidate_spawn_chance),
            ("workforce.morale_smoothing", self.workforce.morale_smoothing),
            ("pipeline.base_defect_chance", self.pipeline.base_defect_chance),
            ("pipeline.min_defect_chance", self.pipeline.min_defect_chance),
            ("orders.renegotiate_penalty", self.orders.renegotiate_penalty),
            ("orders.cancel_penalty", self.orders.cancel_penalty),
        ] {
            if value < Fixed64::ZERO || value > Fixed64::ONE {
                return Err(ConfigError::InvalidProbability {
                    field,
                    value: value.to_num::<f64>(),
                });
            }
        }

        if self.game_pace <= Fixed64::ZERO || self.game_pace > self.max_game_pace {
            return Err(ConfigError::InvalidValue {
                field: "game_pace",
                detail: format!("must be in (0, {}]", self.max_game_pace),
            });
        }
        if self.pipeline.progress_per_day <= Fixed64::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.progress_per_day",
                detail: "must be positive".to_string(),
            });
        }
        if self.day_length_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "day_length_ms",
                detail: "must be positive".to_string(),
            });
        }
        if self.orders.max_quantity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orders.max_quantity",
                detail: "must be positive".to_string(),
            });
        }
        if self.workforce.max_candidate_skill == 0
            || self.workforce.max_candidate_skill > self.workforce.max_skill_level
        {
            return Err(ConfigError::InvalidValue {
                field: "workforce.max_candidate_skill",
                detail: format!("must be in 1..={}", self.workforce.max_skill_level),
            });
        }
        if self.workforce.candidate_min_motivation > 100 {
            return Err(ConfigError::InvalidValue {
                field: "workforce.candidate_min_motivation",
                detail: "must be at most 100".to_string(),
            });
        }
        if self.finance.days_per_year == 0 {
            return Err(ConfigError::InvalidValue {
                field: "finance.days_per_year",
                detail: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn resource(kind: ResourceKind, name: &str, icon: &str, quantity: u32, capacity: u32, cost: u32) -> ResourceDef {
    ResourceDef {
        kind,
        name: name.to_string(),
        icon: icon.to_string(),
        quantity,
        capacity,
        unit_cost: Money::from_num(cost),
    }
}

fn product(
    kind: ProductKind,
    name: &str,
    icon: &str,
    price: u32,
    production_time: u32,
    requires: [u32; 4],
) -> ProductDef {
    ProductDef {
        kind,
        name: name.to_string(),
        icon: icon.to_string(),
        price: Money::from_num(price),
        production_time,
        requires: ResourceKind::ALL
            .iter()
            .zip(requires)
            .filter(|(_, amount)| *amount > 0)
            .map(|(kind, amount)| (*kind, amount))
            .collect(),
        unlocked: true,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x5107_F100,
            starting_day: 1,
            starting_cash: Money::from_num(50_000),
            starting_morale: Fixed64::from_num(80),
            game_pace: Fixed64::ONE,
            max_game_pace: Fixed64::from_num(4),
            day_length_ms: 10_000,
            max_price_markup: 4,
            resources: vec![
                resource(ResourceKind::Metal, "Metal", "🔧", 100, 200, 10),
                resource(ResourceKind::Plastic, "Plastic", "📦", 100, 200, 5),
                resource(ResourceKind::Electronics, "Electronics", "💾", 80, 150, 20),
                resource(ResourceKind::Glass, "Glass", "🔍", 50, 100, 15),
            ],
            products: vec![
                product(ProductKind::Phone, "Smartphone", "📱", 300, 3, [2, 3, 5, 1]),
                product(ProductKind::Laptop, "Laptop", "💻", 500, 5, [5, 4, 7, 2]),
                product(ProductKind::Tablet, "Tablet", "📲", 350, 4, [3, 3, 4, 3]),
            ],
            starting_fleet: vec![Stage::Assembly, Stage::Packaging],
            machine_prices: MachinePricing {
                assembly: Money::from_num(3000),
                packaging: Money::from_num(2500),
                quality: Money::from_num(4000),
            },
            fees: FeeSchedule {
                upgrade_per_level: Money::from_num(1000),
                rework_per_level: Money::from_num(100),
                booster_per_level: Money::from_num(150),
                repair_per_level: Money::from_num(200),
                hire_salary_multiple: 5,
                motivate_per_point: Money::from_num(50),
                train_per_skill_level: Money::from_num(200),
                unlock_price_multiple: 100,
            },
            pipeline: PipelineConfig {
                stage_time_factor: [
                    Fixed64::ONE,
                    f64_to_fixed64(0.5),
                    f64_to_fixed64(0.5),
                ],
                progress_per_day: Fixed64::ONE,
                booster_multiplier: Fixed64::from_num(3),
                base_defect_chance: f64_to_fixed64(0.15),
                min_defect_chance: f64_to_fixed64(0.01),
                quality_slope: f64_to_fixed64(0.12),
                worker_speed_coefficient: f64_to_fixed64(0.1),
                worker_quality_coefficient: f64_to_fixed64(0.15),
                matched_skill_relevance: f64_to_fixed64(1.5),
                unmatched_skill_relevance: Fixed64::ONE,
                upgrade_efficiency_step: f64_to_fixed64(0.1),
                upgrade_speed_step: f64_to_fixed64(0.2),
                wear_per_cycle: f64_to_fixed64(0.01),
                min_efficiency_ratio: f64_to_fixed64(0.5),
                maintenance_days: 1,
            },
            orders: OrderConfig {
                initial_orders: 3,
                spawn_chance: f64_to_fixed64(0.3),
                max_open_orders: 5,
                max_quantity: 5,
                min_lead_days: 5,
                lead_spread_days: 10,
                reward_margin: f64_to_fixed64(1.2),
                urgency_step: f64_to_fixed64(0.02),
                complaint_window_days: 0,
                renegotiate_extension_days: 3,
                renegotiate_penalty: f64_to_fixed64(0.2),
                cancel_penalty: f64_to_fixed64(0.5),
            },
            workforce: WorkforceConfig {
                initial_candidates: 3,
                candidate_spawn_chance: f64_to_fixed64(0.2),
                candidate_pool_cap: 5,
                decay_min: f64_to_fixed64(0.5),
                decay_span: Fixed64::ONE,
                morale_smoothing: f64_to_fixed64(0.1),
                tired_below: Fixed64::from_num(40),
                unmotivated_below: Fixed64::from_num(20),
                motivation_per_point: Fixed64::from_num(10),
                train_motivation_boost: Fixed64::from_num(5),
                max_skill_level: 5,
                max_candidate_skill: 3,
                base_salary: Money::from_num(100),
                salary_per_skill_level: Money::from_num(50),
                candidate_min_motivation: 70,
            },
            finance: FinanceConfig {
                max_active_loans: 1,
                bankruptcy_floor: None,
                days_per_year: 365,
            },
        }
    }
}
