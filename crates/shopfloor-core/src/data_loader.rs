//! JSON config loading.
//!
//! Balance files are written by hand, so the on-disk schema uses plain `f64`
//! numbers instead of the engine's fixed-point encoding. Every field is
//! optional: whatever a file leaves out keeps its [`EngineConfig::default`]
//! value. Resources and products are patched by kind.
//!
//! [`ConfigData`] is also what the `shopfloor-data` crate parses RON and TOML
//! files into, so all three formats share one schema.

use serde::Deserialize;

use crate::config::{ConfigError, EngineConfig, ProductDef, ResourceDef};
use crate::fixed::{Day, Fixed64, Money};
use crate::id::{ProductKind, ResourceKind, Stage};

/// Errors that can occur when loading config data.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("{field} is not a finite number: {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Partial config as it appears in a data file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigData {
    pub seed: Option<u64>,
    pub starting_day: Option<Day>,
    pub starting_cash: Option<f64>,
    pub starting_morale: Option<f64>,
    pub game_pace: Option<f64>,
    pub max_game_pace: Option<f64>,
    pub day_length_ms: Option<u64>,
    pub max_price_markup: Option<u32>,
    pub resources: Vec<ResourceData>,
    pub products: Vec<ProductData>,
    pub starting_fleet: Option<Vec<Stage>>,
    pub machine_prices: MachinePricesData,
    pub fees: FeesData,
    pub pipeline: PipelineData,
    pub orders: OrdersData,
    pub workforce: WorkforceData,
    pub finance: FinanceData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceData {
    pub kind: ResourceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductData {
    pub kind: ProductKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub production_time: Option<u32>,
    /// Replaces the whole recipe when present.
    #[serde(default)]
    pub requires: Option<Vec<(ResourceKind, u32)>>,
    #[serde(default)]
    pub unlocked: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachinePricesData {
    pub assembly: Option<f64>,
    pub packaging: Option<f64>,
    pub quality: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeesData {
    pub upgrade_per_level: Option<f64>,
    pub rework_per_level: Option<f64>,
    pub booster_per_level: Option<f64>,
    pub repair_per_level: Option<f64>,
    pub hire_salary_multiple: Option<u32>,
    pub motivate_per_point: Option<f64>,
    pub train_per_skill_level: Option<f64>,
    pub unlock_price_multiple: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineData {
    pub stage_time_factor: Option<[f64; 3]>,
    pub progress_per_day: Option<f64>,
    pub booster_multiplier: Option<f64>,
    pub base_defect_chance: Option<f64>,
    pub min_defect_chance: Option<f64>,
    pub quality_slope: Option<f64>,
    pub worker_speed_coefficient: Option<f64>,
    pub worker_quality_coefficient: Option<f64>,
    pub matched_skill_relevance: Option<f64>,
    pub unmatched_skill_relevance: Option<f64>,
    pub upgrade_efficiency_step: Option<f64>,
    pub upgrade_speed_step: Option<f64>,
    pub wear_per_cycle: Option<f64>,
    pub min_efficiency_ratio: Option<f64>,
    pub maintenance_days: Option<Day>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrdersData {
    pub initial_orders: Option<u32>,
    pub spawn_chance: Option<f64>,
    pub max_open_orders: Option<u32>,
    pub max_quantity: Option<u32>,
    pub min_lead_days: Option<Day>,
    pub lead_spread_days: Option<Day>,
    pub reward_margin: Option<f64>,
    pub urgency_step: Option<f64>,
    pub complaint_window_days: Option<Day>,
    pub renegotiate_extension_days: Option<Day>,
    pub renegotiate_penalty: Option<f64>,
    pub cancel_penalty: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkforceData {
    pub initial_candidates: Option<u32>,
    pub candidate_spawn_chance: Option<f64>,
    pub candidate_pool_cap: Option<u32>,
    pub decay_min: Option<f64>,
    pub decay_span: Option<f64>,
    pub morale_smoothing: Option<f64>,
    pub tired_below: Option<f64>,
    pub unmotivated_below: Option<f64>,
    pub motivation_per_point: Option<f64>,
    pub train_motivation_boost: Option<f64>,
    pub max_skill_level: Option<u32>,
    pub max_candidate_skill: Option<u32>,
    pub base_salary: Option<f64>,
    pub salary_per_skill_level: Option<f64>,
    pub candidate_min_motivation: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceData {
    pub max_active_loans: Option<u32>,
    pub bankruptcy_floor: Option<f64>,
    pub days_per_year: Option<u32>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Fixed-point conversion that refuses NaN, infinities and values outside
/// the I32F32 range instead of saturating.
fn to_fixed(field: &'static str, value: f64) -> Result<Fixed64, DataLoadError> {
    Fixed64::checked_from_num(value).ok_or(DataLoadError::NotFinite { field, value })
}

fn set_fixed(
    target: &mut Fixed64,
    field: &'static str,
    value: Option<f64>,
) -> Result<(), DataLoadError> {
    if let Some(v) = value {
        *target = to_fixed(field, v)?;
    }
    Ok(())
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl ResourceData {
    fn apply(self, def: &mut ResourceDef) -> Result<(), DataLoadError> {
        set(&mut def.name, self.name);
        set(&mut def.icon, self.icon);
        set(&mut def.quantity, self.quantity);
        set(&mut def.capacity, self.capacity);
        set_fixed(&mut def.unit_cost, "resources.unit_cost", self.unit_cost)
    }
}

impl ProductData {
    fn apply(self, def: &mut ProductDef) -> Result<(), DataLoadError> {
        set(&mut def.name, self.name);
        set(&mut def.icon, self.icon);
        set(&mut def.production_time, self.production_time);
        set(&mut def.requires, self.requires);
        set(&mut def.unlocked, self.unlocked);
        set_fixed(&mut def.price, "products.price", self.price)
    }
}

impl ConfigData {
    /// Overlay this data on the stock config and validate the result.
    pub fn into_config(self) -> Result<EngineConfig, DataLoadError> {
        let mut config = EngineConfig::default();
        self.apply_to(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay this data on `config` without validating.
    pub fn apply_to(self, config: &mut EngineConfig) -> Result<(), DataLoadError> {
        set(&mut config.seed, self.seed);
        set(&mut config.starting_day, self.starting_day);
        set_fixed(&mut config.starting_cash, "starting_cash", self.starting_cash)?;
        set_fixed(&mut config.starting_morale, "starting_morale", self.starting_morale)?;
        set_fixed(&mut config.game_pace, "game_pace", self.game_pace)?;
        set_fixed(&mut config.max_game_pace, "max_game_pace", self.max_game_pace)?;
        set(&mut config.day_length_ms, self.day_length_ms);
        set(&mut config.max_price_markup, self.max_price_markup);
        set(&mut config.starting_fleet, self.starting_fleet);

        for data in self.resources {
            match config.resources.iter_mut().find(|d| d.kind == data.kind) {
                Some(def) => data.apply(def)?,
                None => return Err(ConfigError::MissingResource(data.kind).into()),
            }
        }
        for data in self.products {
            match config.products.iter_mut().find(|d| d.kind == data.kind) {
                Some(def) => data.apply(def)?,
                None => return Err(ConfigError::MissingProduct(data.kind).into()),
            }
        }

        let prices = &mut config.machine_prices;
        let m = self.machine_prices;
        set_fixed(&mut prices.assembly, "machine_prices.assembly", m.assembly)?;
        set_fixed(&mut prices.packaging, "machine_prices.packaging", m.packaging)?;
        set_fixed(&mut prices.quality, "machine_prices.quality", m.quality)?;

        let fees = &mut config.fees;
        let f = self.fees;
        set_fixed(&mut fees.upgrade_per_level, "fees.upgrade_per_level", f.upgrade_per_level)?;
        set_fixed(&mut fees.rework_per_level, "fees.rework_per_level", f.rework_per_level)?;
        set_fixed(&mut fees.booster_per_level, "fees.booster_per_level", f.booster_per_level)?;
        set_fixed(&mut fees.repair_per_level, "fees.repair_per_level", f.repair_per_level)?;
        set(&mut fees.hire_salary_multiple, f.hire_salary_multiple);
        set_fixed(&mut fees.motivate_per_point, "fees.motivate_per_point", f.motivate_per_point)?;
        set_fixed(
            &mut fees.train_per_skill_level,
            "fees.train_per_skill_level",
            f.train_per_skill_level,
        )?;
        set(&mut fees.unlock_price_multiple, f.unlock_price_multiple);

        let pipe = &mut config.pipeline;
        let p = self.pipeline;
        if let Some(factors) = p.stage_time_factor {
            for (slot, value) in pipe.stage_time_factor.iter_mut().zip(factors) {
                *slot = to_fixed("pipeline.stage_time_factor", value)?;
            }
        }
        set_fixed(&mut pipe.progress_per_day, "pipeline.progress_per_day", p.progress_per_day)?;
        set_fixed(&mut pipe.booster_multiplier, "pipeline.booster_multiplier", p.booster_multiplier)?;
        set_fixed(&mut pipe.base_defect_chance, "pipeline.base_defect_chance", p.base_defect_chance)?;
        set_fixed(&mut pipe.min_defect_chance, "pipeline.min_defect_chance", p.min_defect_chance)?;
        set_fixed(&mut pipe.quality_slope, "pipeline.quality_slope", p.quality_slope)?;
        set_fixed(
            &mut pipe.worker_speed_coefficient,
            "pipeline.worker_speed_coefficient",
            p.worker_speed_coefficient,
        )?;
        set_fixed(
            &mut pipe.worker_quality_coefficient,
            "pipeline.worker_quality_coefficient",
            p.worker_quality_coefficient,
        )?;
        set_fixed(
            &mut pipe.matched_skill_relevance,
            "pipeline.matched_skill_relevance",
            p.matched_skill_relevance,
        )?;
        set_fixed(
            &mut pipe.unmatched_skill_relevance,
            "pipeline.unmatched_skill_relevance",
            p.unmatched_skill_relevance,
        )?;
        set_fixed(
            &mut pipe.upgrade_efficiency_step,
            "pipeline.upgrade_efficiency_step",
            p.upgrade_efficiency_step,
        )?;
        set_fixed(&mut pipe.upgrade_speed_step, "pipeline.upgrade_speed_step", p.upgrade_speed_step)?;
        set_fixed(&mut pipe.wear_per_cycle, "pipeline.wear_per_cycle", p.wear_per_cycle)?;
        set_fixed(
            &mut pipe.min_efficiency_ratio,
            "pipeline.min_efficiency_ratio",
            p.min_efficiency_ratio,
        )?;
        set(&mut pipe.maintenance_days, p.maintenance_days);

        let orders = &mut config.orders;
        let o = self.orders;
        set(&mut orders.initial_orders, o.initial_orders);
        set_fixed(&mut orders.spawn_chance, "orders.spawn_chance", o.spawn_chance)?;
        set(&mut orders.max_open_orders, o.max_open_orders);
        set(&mut orders.max_quantity, o.max_quantity);
        set(&mut orders.min_lead_days, o.min_lead_days);
        set(&mut orders.lead_spread_days, o.lead_spread_days);
        set_fixed(&mut orders.reward_margin, "orders.reward_margin", o.reward_margin)?;
        set_fixed(&mut orders.urgency_step, "orders.urgency_step", o.urgency_step)?;
        set(&mut orders.complaint_window_days, o.complaint_window_days);
        set(&mut orders.renegotiate_extension_days, o.renegotiate_extension_days);
        set_fixed(
            &mut orders.renegotiate_penalty,
            "orders.renegotiate_penalty",
            o.renegotiate_penalty,
        )?;
        set_fixed(&mut orders.cancel_penalty, "orders.cancel_penalty", o.cancel_penalty)?;

        let work = &mut config.workforce;
        let w = self.workforce;
        set(&mut work.initial_candidates, w.initial_candidates);
        set_fixed(
            &mut work.candidate_spawn_chance,
            "workforce.candidate_spawn_chance",
            w.candidate_spawn_chance,
        )?;
        set(&mut work.candidate_pool_cap, w.candidate_pool_cap);
        set_fixed(&mut work.decay_min, "workforce.decay_min", w.decay_min)?;
        set_fixed(&mut work.decay_span, "workforce.decay_span", w.decay_span)?;
        set_fixed(&mut work.morale_smoothing, "workforce.morale_smoothing", w.morale_smoothing)?;
        set_fixed(&mut work.tired_below, "workforce.tired_below", w.tired_below)?;
        set_fixed(&mut work.unmotivated_below, "workforce.unmotivated_below", w.unmotivated_below)?;
        set_fixed(
            &mut work.motivation_per_point,
            "workforce.motivation_per_point",
            w.motivation_per_point,
        )?;
        set_fixed(
            &mut work.train_motivation_boost,
            "workforce.train_motivation_boost",
            w.train_motivation_boost,
        )?;
        set(&mut work.max_skill_level, w.max_skill_level);
        set(&mut work.max_candidate_skill, w.max_candidate_skill);
        set_fixed(&mut work.base_salary, "workforce.base_salary", w.base_salary)?;
        set_fixed(
            &mut work.salary_per_skill_level,
            "workforce.salary_per_skill_level",
            w.salary_per_skill_level,
        )?;
        set(&mut work.candidate_min_motivation, w.candidate_min_motivation);

        let fin = &mut config.finance;
        let f = self.finance;
        set(&mut fin.max_active_loans, f.max_active_loans);
        if let Some(floor) = f.bankruptcy_floor {
            let floor: Money = to_fixed("finance.bankruptcy_floor", floor)?;
            fin.bankruptcy_floor = Some(floor);
        }
        set(&mut fin.days_per_year, f.days_per_year);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a JSON config overlay and build a validated [`EngineConfig`].
pub fn load_config_json(json: &str) -> Result<EngineConfig, DataLoadError> {
    let data: ConfigData = serde_json::from_str(json)?;
    data.into_config()
}

/// Same as [`load_config_json`] but from raw bytes.
pub fn load_config_json_bytes(bytes: &[u8]) -> Result<EngineConfig, DataLoadError> {
    let data: ConfigData = serde_json::from_slice(bytes)?;
    data.into_config()
}
