//! Machines and their per-machine state machine.
//!
//! A machine is always in exactly one [`MachineState`]. The flat fields a
//! presentation layer wants (status, current product, progress, defect flag)
//! are derived through accessors rather than stored separately, so they can
//! never disagree.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::fixed::{from_units, sqrt, Day, Fixed64};
use crate::id::{ProductKind, Stage, WorkerId};

// ---------------------------------------------------------------------------
// Jobs and states
// ---------------------------------------------------------------------------

/// One work-in-process unit on a machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub product: ProductKind,
    pub progress: Fixed64,
    pub target: Fixed64,
}

impl Job {
    pub fn new(product: ProductKind, target: Fixed64) -> Self {
        Self {
            product,
            progress: Fixed64::ZERO,
            target,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }
}

/// Why a finished unit is still sitting on its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallReason {
    /// The defect roll failed; the player must fix or discard.
    Defect,
    /// No idle machine at the next stage; retried every tick.
    AwaitingHandoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MachineState {
    Idle,
    Working(Job),
    Stalled { job: Job, reason: StallReason },
    /// Being repaired. A suspended job resumes when maintenance ends.
    Maintenance { job: Option<Job>, until_day: Day },
}

/// Flat status shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Idle,
    Working,
    Maintenance,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// What to build when buying a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub stage: Stage,
    /// Display name. Defaults to `"<stage label> <n>"`.
    #[serde(default)]
    pub name: Option<String>,
}

impl MachineSpec {
    pub fn new(stage: Stage) -> Self {
        Self { stage, name: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub stage: Stage,
    pub level: u32,
    /// Efficiency when freshly repaired. Raised by upgrades.
    pub rated_efficiency: Fixed64,
    /// Current efficiency after wear.
    pub efficiency: Fixed64,
    pub speed: Fixed64,
    /// Last day (exclusive) the booster applies.
    pub booster_until: Option<Day>,
    pub assigned_workers: Vec<WorkerId>,
    pub state: MachineState,
    /// Units completed cleanly over the machine's lifetime.
    pub cycles: u32,
}

impl Machine {
    pub fn new(name: String, stage: Stage) -> Self {
        Self {
            name,
            stage,
            level: 1,
            rated_efficiency: Fixed64::ONE,
            efficiency: Fixed64::ONE,
            speed: Fixed64::ONE,
            booster_until: None,
            assigned_workers: Vec::new(),
            state: MachineState::Idle,
            cycles: 0,
        }
    }

    pub fn status(&self) -> MachineStatus {
        match self.state {
            MachineState::Idle => MachineStatus::Idle,
            MachineState::Working(_) | MachineState::Stalled { .. } => MachineStatus::Working,
            MachineState::Maintenance { .. } => MachineStatus::Maintenance,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, MachineState::Idle)
    }

    pub fn job(&self) -> Option<&Job> {
        match &self.state {
            MachineState::Idle => None,
            MachineState::Working(job) | MachineState::Stalled { job, .. } => Some(job),
            MachineState::Maintenance { job, .. } => job.as_ref(),
        }
    }

    pub fn current_product(&self) -> Option<ProductKind> {
        self.job().map(|j| j.product)
    }

    pub fn progress(&self) -> Fixed64 {
        self.job().map_or(Fixed64::ZERO, |j| j.progress)
    }

    pub fn target(&self) -> Fixed64 {
        self.job().map_or(Fixed64::ZERO, |j| j.target)
    }

    pub fn has_defect(&self) -> bool {
        matches!(
            self.state,
            MachineState::Stalled {
                reason: StallReason::Defect,
                ..
            }
        )
    }

    pub fn awaiting_handoff(&self) -> bool {
        matches!(
            self.state,
            MachineState::Stalled {
                reason: StallReason::AwaitingHandoff,
                ..
            }
        )
    }

    /// Efficiency lost to wear since the last repair.
    pub fn wear(&self) -> Fixed64 {
        self.rated_efficiency - self.efficiency
    }

    pub fn booster_active(&self, today: Day) -> bool {
        self.booster_until.is_some_and(|end| today < end)
    }

    /// Units of work this machine holds (0 or 1).
    pub fn units_held(&self) -> u32 {
        u32::from(self.job().is_some())
    }

    /// Apply one cycle of wear, floored at a share of rated efficiency.
    pub(crate) fn wear_down(&mut self, config: &PipelineConfig) {
        let floor = self.rated_efficiency * config.min_efficiency_ratio;
        self.efficiency = (self.efficiency - config.wear_per_cycle).max(floor);
    }
}

// ---------------------------------------------------------------------------
// Crew bonuses
// ---------------------------------------------------------------------------

/// The parts of a worker that matter to the machine they staff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrewMember {
    pub skill: Stage,
    pub skill_level: u32,
    pub motivation: Fixed64,
}

/// Speed and quality bonuses a crew gives a machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrewBonus {
    pub speed: Fixed64,
    pub quality: Fixed64,
}

/// Each member contributes `level × coefficient × relevance × motivation/100`.
/// With more than one member the sum is divided by √n, so n identical workers
/// are worth √n of one.
pub fn crew_bonus(stage: Stage, crew: &[CrewMember], config: &PipelineConfig) -> CrewBonus {
    if crew.is_empty() {
        return CrewBonus::default();
    }
    let hundred = Fixed64::from_num(100);
    let mut raw = Fixed64::ZERO;
    for member in crew {
        let relevance = if member.skill == stage {
            config.matched_skill_relevance
        } else {
            config.unmatched_skill_relevance
        };
        raw += from_units(member.skill_level) * relevance * (member.motivation / hundred);
    }
    if crew.len() > 1 {
        raw /= sqrt(from_units(crew.len() as u32));
    }
    CrewBonus {
        speed: raw * config.worker_speed_coefficient,
        quality: raw * config.worker_quality_coefficient,
    }
}

/// Chance that a finished unit comes out defective.
pub fn defect_chance(efficiency: Fixed64, crew: CrewBonus, config: &PipelineConfig) -> Fixed64 {
    let half = Fixed64::from_num(0.5);
    let quality_factor = half * efficiency + half * crew.quality;
    (config.base_defect_chance - quality_factor * config.quality_slope)
        .max(config.min_defect_chance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn pipeline() -> PipelineConfig {
        EngineConfig::default().pipeline
    }

    fn member(skill: Stage, level: u32, motivation: i32) -> CrewMember {
        CrewMember {
            skill,
            skill_level: level,
            motivation: Fixed64::from_num(motivation),
        }
    }

    #[test]
    fn flat_view_follows_state() {
        let mut machine = Machine::new("Assembly Line 1".into(), Stage::Assembly);
        assert_eq!(machine.status(), MachineStatus::Idle);
        assert_eq!(machine.current_product(), None);

        let job = Job::new(ProductKind::Phone, Fixed64::from_num(300));
        machine.state = MachineState::Stalled {
            job,
            reason: StallReason::Defect,
        };
        assert_eq!(machine.status(), MachineStatus::Working);
        assert!(machine.has_defect());
        assert!(!machine.awaiting_handoff());
        assert_eq!(machine.target(), Fixed64::from_num(300));

        machine.state = MachineState::Maintenance {
            job: None,
            until_day: 4,
        };
        assert_eq!(machine.status(), MachineStatus::Maintenance);
        assert_eq!(machine.units_held(), 0);
    }

    #[test]
    fn single_matched_worker_bonus() {
        let crew = [member(Stage::Assembly, 2, 100)];
        let bonus = crew_bonus(Stage::Assembly, &crew, &pipeline());
        // 2 × 0.1 × 1.5 × 1.0
        assert!((bonus.speed.to_num::<f64>() - 0.3).abs() < 1e-6);
        assert!((bonus.quality.to_num::<f64>() - 0.45).abs() < 1e-6);
    }

    #[test]
    fn crew_bonus_has_diminishing_returns() {
        let one = crew_bonus(Stage::Packaging, &[member(Stage::Packaging, 3, 80)], &pipeline());
        let four = crew_bonus(
            Stage::Packaging,
            &[member(Stage::Packaging, 3, 80); 4],
            &pipeline(),
        );
        let ratio = four.speed.to_num::<f64>() / one.speed.to_num::<f64>();
        assert!((ratio - 2.0).abs() < 1e-4, "expected √4 = 2, got {ratio}");
    }

    #[test]
    fn unmatched_skill_counts_less() {
        let matched = crew_bonus(Stage::Quality, &[member(Stage::Quality, 1, 100)], &pipeline());
        let unmatched = crew_bonus(Stage::Quality, &[member(Stage::Assembly, 1, 100)], &pipeline());
        assert!(unmatched.speed < matched.speed);
    }

    #[test]
    fn defect_chance_bounds() {
        let config = pipeline();
        let idle_crew = CrewBonus::default();
        // 0.15 − 0.5 × 0.12
        let base = defect_chance(Fixed64::ONE, idle_crew, &config);
        assert!((base.to_num::<f64>() - 0.09).abs() < 1e-6);

        let strong = CrewBonus {
            speed: Fixed64::ZERO,
            quality: Fixed64::from_num(10),
        };
        assert_eq!(defect_chance(Fixed64::ONE, strong, &config), config.min_defect_chance);
    }

    #[test]
    fn wear_is_floored() {
        let config = pipeline();
        let mut machine = Machine::new("m".into(), Stage::Assembly);
        for _ in 0..200 {
            machine.wear_down(&config);
        }
        assert_eq!(machine.efficiency, Fixed64::from_num(0.5));
        assert_eq!(machine.wear(), Fixed64::from_num(0.5));
    }

    #[test]
    fn booster_expires_at_end_day() {
        let mut machine = Machine::new("m".into(), Stage::Assembly);
        machine.booster_until = Some(5);
        assert!(machine.booster_active(4));
        assert!(!machine.booster_active(5));
    }
}
