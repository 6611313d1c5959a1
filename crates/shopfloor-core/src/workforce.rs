//! Candidates, the hired roster, and factory morale.
//!
//! Candidates and hired workers live in one [`SlotMap`]; a worker is hired
//! once `hire_day` is set. Assignment is kept bidirectional: a worker's
//! `machine` and that machine's `assigned_workers` always agree.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::config::{FeeSchedule, WorkforceConfig};
use crate::error::CommandError;
use crate::finance::FinanceLedger;
use crate::fixed::{clamp_percent, from_units, Day, Fixed64, Money};
use crate::id::{MachineId, Stage, WorkerId};
use crate::machine::CrewMember;
use crate::pipeline::ProductionPipeline;
use crate::rng::SimRng;

const NAMES: [&str; 16] = [
    "Ada Moreno",
    "Bruno Keller",
    "Chiara Lind",
    "Dmitri Osei",
    "Elena Varga",
    "Felix Amari",
    "Greta Holm",
    "Hugo Tanaka",
    "Ines Duarte",
    "Jonas Petrov",
    "Kira Blanc",
    "Luca Ferri",
    "Maya Okafor",
    "Nils Berg",
    "Olga Santos",
    "Pavel Reyes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Working,
    Tired,
    Unmotivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    /// The stage this worker is trained for.
    pub skill: Stage,
    pub skill_level: u32,
    pub motivation: Fixed64,
    /// Daily wage.
    pub salary: Money,
    pub status: WorkerStatus,
    /// `None` while still a candidate.
    pub hire_day: Option<Day>,
    pub machine: Option<MachineId>,
}

impl Worker {
    pub fn is_hired(&self) -> bool {
        self.hire_day.is_some()
    }

    fn crew_member(&self) -> CrewMember {
        CrewMember {
            skill: self.skill,
            skill_level: self.skill_level,
            motivation: self.motivation,
        }
    }
}

fn status_for(motivation: Fixed64, config: &WorkforceConfig) -> WorkerStatus {
    if motivation < config.unmotivated_below {
        WorkerStatus::Unmotivated
    } else if motivation < config.tired_below {
        WorkerStatus::Tired
    } else {
        WorkerStatus::Working
    }
}

/// Result of one workforce tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkforceReport {
    /// Workers whose status changed: (worker, new status).
    pub status_changes: Vec<(WorkerId, WorkerStatus)>,
    pub morale: Fixed64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceModel {
    workers: SlotMap<WorkerId, Worker>,
    morale: Fixed64,
}

impl WorkforceModel {
    pub fn new(morale: Fixed64) -> Self {
        Self {
            workers: SlotMap::with_key(),
            morale: clamp_percent(morale),
        }
    }

    pub fn morale(&self) -> Fixed64 {
        self.morale
    }

    pub fn get(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, &Worker)> {
        self.workers.iter()
    }

    pub fn hired(&self) -> impl Iterator<Item = (WorkerId, &Worker)> {
        self.workers.iter().filter(|(_, w)| w.is_hired())
    }

    pub fn candidates(&self) -> impl Iterator<Item = (WorkerId, &Worker)> {
        self.workers.iter().filter(|(_, w)| !w.is_hired())
    }

    pub fn candidate_count(&self) -> u32 {
        self.candidates().count() as u32
    }

    fn worker_mut(&mut self, id: WorkerId) -> Result<&mut Worker, CommandError> {
        self.workers
            .get_mut(id)
            .ok_or(CommandError::WorkerNotFound(id))
    }

    fn hired_mut(&mut self, id: WorkerId) -> Result<&mut Worker, CommandError> {
        let worker = self.worker_mut(id)?;
        if !worker.is_hired() {
            return Err(CommandError::WorkerNotHired);
        }
        Ok(worker)
    }

    /// Sum of hired workers' daily salaries.
    pub fn payroll(&self) -> Money {
        self.hired().map(|(_, w)| w.salary).sum()
    }

    /// Hired members of `ids` as the pipeline sees them.
    pub fn crew(&self, ids: &[WorkerId]) -> Vec<CrewMember> {
        ids.iter()
            .filter_map(|id| self.workers.get(*id))
            .filter(|w| w.is_hired())
            .map(Worker::crew_member)
            .collect()
    }

    /// Mean of `level × speed coefficient × motivation/100` over hired
    /// workers. Zero with an empty roster.
    pub fn average_worker_factor(&self, speed_coefficient: Fixed64) -> Fixed64 {
        let hundred = Fixed64::from_num(100);
        let (sum, count) = self.hired().fold((Fixed64::ZERO, 0u32), |(sum, n), (_, w)| {
            (
                sum + from_units(w.skill_level) * speed_coefficient * (w.motivation / hundred),
                n + 1,
            )
        });
        if count == 0 {
            Fixed64::ZERO
        } else {
            sum / from_units(count)
        }
    }

    // -----------------------------------------------------------------------
    // Candidates
    // -----------------------------------------------------------------------

    /// Generate a random candidate and add it to the pool.
    pub fn spawn_candidate(&mut self, rng: &mut SimRng, config: &WorkforceConfig) -> WorkerId {
        let skill = rng.pick(&Stage::ALL).copied().unwrap_or(Stage::Assembly);
        let skill_level = rng.range_inclusive(1, config.max_candidate_skill);
        let motivation = from_units(rng.range_inclusive(config.candidate_min_motivation, 100));
        let name = rng.pick(&NAMES).copied().unwrap_or("Worker");
        let salary = config.base_salary + config.salary_per_skill_level * from_units(skill_level);
        self.workers.insert(Worker {
            name: name.to_string(),
            skill,
            skill_level,
            motivation,
            salary,
            status: status_for(motivation, config),
            hire_day: None,
            machine: None,
        })
    }

    /// Add a prepared candidate to the pool.
    pub(crate) fn insert_candidate(&mut self, worker: Worker) -> WorkerId {
        self.workers.insert(Worker {
            hire_day: None,
            machine: None,
            ..worker
        })
    }

    /// Roll for a new candidate if the pool has room.
    pub fn maybe_spawn_candidate(
        &mut self,
        rng: &mut SimRng,
        config: &WorkforceConfig,
    ) -> Option<WorkerId> {
        if self.candidate_count() >= config.candidate_pool_cap {
            return None;
        }
        if !rng.chance(config.candidate_spawn_chance) {
            return None;
        }
        Some(self.spawn_candidate(rng, config))
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Sign a candidate. Costs a multiple of their daily salary.
    pub fn hire(
        &mut self,
        id: WorkerId,
        today: Day,
        fees: &FeeSchedule,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        let worker = self.worker_mut(id)?;
        if worker.is_hired() {
            return Err(CommandError::WorkerAlreadyHired);
        }
        let cost = worker
            .salary
            .saturating_mul(from_units(fees.hire_salary_multiple));
        finance.spend(cost)?;
        worker.hire_day = Some(today);
        Ok(cost)
    }

    /// Put a hired worker on a machine, moving them off any previous one.
    pub fn assign(
        &mut self,
        id: WorkerId,
        machine: MachineId,
        pipeline: &mut ProductionPipeline,
    ) -> Result<(), CommandError> {
        if pipeline.get(machine).is_none() {
            return Err(CommandError::MachineNotFound(machine));
        }
        let worker = self.hired_mut(id)?;
        if worker.machine == Some(machine) {
            return Err(CommandError::AlreadyAssigned);
        }
        if let Some(previous) = worker.machine.replace(machine) {
            pipeline.detach_worker(previous, id);
        }
        pipeline.attach_worker(machine, id);
        Ok(())
    }

    pub fn unassign(
        &mut self,
        id: WorkerId,
        pipeline: &mut ProductionPipeline,
    ) -> Result<MachineId, CommandError> {
        let worker = self.hired_mut(id)?;
        let machine = worker.machine.take().ok_or(CommandError::NotAssigned)?;
        pipeline.detach_worker(machine, id);
        Ok(machine)
    }

    pub fn motivate(
        &mut self,
        id: WorkerId,
        amount: u32,
        fees: &FeeSchedule,
        config: &WorkforceConfig,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        if amount == 0 {
            return Err(CommandError::Malformed("motivation amount must be positive"));
        }
        let worker = self.hired_mut(id)?;
        if worker.motivation >= Fixed64::from_num(100) {
            return Err(CommandError::MotivationMaxed);
        }
        let cost = fees.motivate_per_point.saturating_mul(from_units(amount));
        finance.spend(cost)?;
        let boost = config.motivation_per_point.saturating_mul(from_units(amount));
        worker.motivation = clamp_percent(worker.motivation.saturating_add(boost));
        worker.status = status_for(worker.motivation, config);
        Ok(cost)
    }

    pub fn train(
        &mut self,
        id: WorkerId,
        fees: &FeeSchedule,
        config: &WorkforceConfig,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        let worker = self.hired_mut(id)?;
        if worker.skill_level >= config.max_skill_level {
            return Err(CommandError::SkillMaxed(config.max_skill_level));
        }
        let cost = fees
            .train_per_skill_level
            .saturating_mul(from_units(worker.skill_level));
        finance.spend(cost)?;
        worker.skill_level += 1;
        worker.motivation = clamp_percent(worker.motivation + config.train_motivation_boost);
        worker.status = status_for(worker.motivation, config);
        Ok(cost)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Decay motivation of every hired worker and move morale toward the
    /// roster average.
    pub fn tick(&mut self, rng: &mut SimRng, config: &WorkforceConfig) -> WorkforceReport {
        let mut report = WorkforceReport::default();
        let mut total = Fixed64::ZERO;
        let mut count = 0u32;

        for (id, worker) in self.workers.iter_mut().filter(|(_, w)| w.is_hired()) {
            let decay = config.decay_min + rng.fraction() * config.decay_span;
            worker.motivation = (worker.motivation - decay).max(Fixed64::ZERO);
            let status = status_for(worker.motivation, config);
            if status != worker.status {
                worker.status = status;
                report.status_changes.push((id, status));
            }
            total += worker.motivation;
            count += 1;
        }

        if count > 0 {
            let average = total / from_units(count);
            self.morale = clamp_percent(self.morale + (average - self.morale) * config.morale_smoothing);
        }
        report.morale = self.morale;
        report
    }
}
