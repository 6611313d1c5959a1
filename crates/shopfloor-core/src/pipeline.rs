//! The machine fleet and the multi-stage production flow.
//!
//! A unit is started on an assembly machine (consuming resources), then handed
//! to the nearest downstream stage that has machines in the fleet, and credited
//! to inventory after the last such stage. A unit is never dropped: if the
//! next stage has no idle machine, the unit parks on its current machine and
//! is retried every tick.
//!
//! [`ProductionPipeline::tick`] runs in two phases. The compute phase reads
//! every machine and decides progress and defect outcomes without mutating
//! anything. The apply phase writes the results and then resolves completions
//! downstream-first, so a quality slot freed this tick can take a packaged
//! unit this tick.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::config::{FeeSchedule, MachinePricing, PipelineConfig};
use crate::error::CommandError;
use crate::finance::FinanceLedger;
use crate::fixed::{from_units, Day, Fixed64, Money};
use crate::id::{MachineId, ProductKind, Stage, WorkerId};
use crate::machine::{
    crew_bonus, defect_chance, CrewMember, Job, Machine, MachineSpec, MachineState, MachineStatus,
    StallReason,
};
use crate::product::{Inventory, ProductCatalog};
use crate::resource::ResourceLedger;
use crate::rng::SimRng;

/// What one pipeline tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Units credited to inventory.
    pub produced: Vec<(MachineId, ProductKind)>,
    /// Units that failed their defect roll.
    pub defects: Vec<(MachineId, ProductKind)>,
    /// Units moved to the next stage: (from, to, product).
    pub handoffs: Vec<(MachineId, MachineId, ProductKind)>,
    /// Units still parked because the next stage is full.
    pub parked: u32,
    pub boosters_expired: Vec<MachineId>,
}

/// Inputs a tick needs from the rest of the engine.
pub struct TickContext<'a> {
    pub today: Day,
    pub pace: Fixed64,
    pub config: &'a PipelineConfig,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    InProgress,
    Defective,
    Clean,
}

#[derive(Debug, Clone, Copy)]
struct Delta {
    id: MachineId,
    progress: Fixed64,
    outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionPipeline {
    machines: SlotMap<MachineId, Machine>,
    /// Machines bought per stage, for default names.
    bought: [u32; 3],
}

impl ProductionPipeline {
    pub fn new() -> Self {
        Self {
            machines: SlotMap::with_key(),
            bought: [0; 3],
        }
    }

    /// Add a machine without charging for it (starting fleet).
    pub fn install(&mut self, spec: MachineSpec) -> MachineId {
        let counter = &mut self.bought[spec.stage.index()];
        *counter += 1;
        let name = spec
            .name
            .unwrap_or_else(|| format!("{} {}", spec.stage.label(), counter));
        self.machines.insert(Machine::new(name, spec.stage))
    }

    /// Buy and install a machine.
    pub fn buy_machine(
        &mut self,
        spec: MachineSpec,
        prices: &MachinePricing,
        finance: &mut FinanceLedger,
    ) -> Result<MachineId, CommandError> {
        if spec.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CommandError::Malformed("machine name must not be blank"));
        }
        finance.spend(prices.price(spec.stage))?;
        Ok(self.install(spec))
    }

    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.get_mut(id)
    }

    fn machine(&self, id: MachineId) -> Result<&Machine, CommandError> {
        self.machines.get(id).ok_or(CommandError::MachineNotFound(id))
    }

    fn machine_mut(&mut self, id: MachineId) -> Result<&mut Machine, CommandError> {
        self.machines
            .get_mut(id)
            .ok_or(CommandError::MachineNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.machines.iter()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn count_in_stage(&self, stage: Stage) -> u32 {
        self.machines.values().filter(|m| m.stage == stage).count() as u32
    }

    /// Machines in `stage` holding a job without a pending defect. Idle and
    /// maintenance machines do not count.
    pub fn count_working(&self, stage: Stage) -> u32 {
        self.machines
            .values()
            .filter(|m| {
                m.stage == stage && m.status() == MachineStatus::Working && !m.has_defect()
            })
            .count() as u32
    }

    /// Units currently held on machines (working, parked, defective or suspended).
    pub fn units_in_process(&self) -> u32 {
        self.machines.values().map(Machine::units_held).sum()
    }

    /// Progress target for `product` at `stage`.
    pub fn target_for(production_time: u32, stage: Stage, config: &PipelineConfig) -> Fixed64 {
        from_units(production_time)
            .saturating_mul(Fixed64::from_num(100))
            .saturating_mul(config.stage_time_factor[stage.index()])
    }

    /// The nearest downstream stage that has at least one machine.
    fn next_stage(&self, stage: Stage) -> Option<Stage> {
        stage
            .downstream()
            .iter()
            .copied()
            .find(|s| self.count_in_stage(*s) > 0)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start a new unit on an idle assembly machine, consuming its materials.
    pub fn assign(
        &mut self,
        id: MachineId,
        product: ProductKind,
        catalog: &ProductCatalog,
        resources: &mut ResourceLedger,
        config: &PipelineConfig,
    ) -> Result<(), CommandError> {
        let machine = self.machine(id)?;
        if machine.stage != Stage::Assembly {
            return Err(CommandError::WrongStage {
                expected: Stage::Assembly,
                actual: machine.stage,
            });
        }
        ensure_idle(machine)?;
        let def = catalog.require_unlocked(product)?;
        let target = Self::target_for(def.production_time, Stage::Assembly, config);
        resources.consume(&def.requires)?;

        let machine = self.machine_mut(id)?;
        machine.state = MachineState::Working(Job::new(product, target));
        Ok(())
    }

    /// Drop the unit a working machine is processing. Returns its product.
    pub fn unassign(&mut self, id: MachineId) -> Result<ProductKind, CommandError> {
        let machine = self.machine_mut(id)?;
        match machine.state {
            MachineState::Working(job) => {
                machine.state = MachineState::Idle;
                Ok(job.product)
            }
            MachineState::Idle => Err(CommandError::MachineIdle),
            MachineState::Stalled {
                reason: StallReason::Defect,
                ..
            } => Err(CommandError::DefectPending),
            MachineState::Stalled { .. } => Err(CommandError::MachineBusy),
            MachineState::Maintenance { .. } => Err(CommandError::UnderMaintenance),
        }
    }

    /// Pay to rework a defective unit. It re-enters handoff on the next tick.
    pub fn fix_defect(
        &mut self,
        id: MachineId,
        fees: &FeeSchedule,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        let machine = self.machine(id)?;
        let MachineState::Stalled {
            job,
            reason: StallReason::Defect,
        } = machine.state
        else {
            return Err(CommandError::NoDefect);
        };
        let fee = fees.rework_per_level.saturating_mul(from_units(machine.level));
        finance.spend(fee)?;
        self.machine_mut(id)?.state = MachineState::Stalled {
            job,
            reason: StallReason::AwaitingHandoff,
        };
        Ok(fee)
    }

    /// Scrap a defective unit. Returns its product.
    pub fn discard_defect(&mut self, id: MachineId) -> Result<ProductKind, CommandError> {
        let machine = self.machine_mut(id)?;
        let MachineState::Stalled {
            job,
            reason: StallReason::Defect,
        } = machine.state
        else {
            return Err(CommandError::NoDefect);
        };
        machine.state = MachineState::Idle;
        Ok(job.product)
    }

    pub fn upgrade(
        &mut self,
        id: MachineId,
        fees: &FeeSchedule,
        config: &PipelineConfig,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        let level = self.machine(id)?.level;
        let fee = fees.upgrade_per_level.saturating_mul(from_units(level));
        finance.spend(fee)?;
        let machine = self.machine_mut(id)?;
        machine.level += 1;
        machine.rated_efficiency += config.upgrade_efficiency_step;
        machine.efficiency += config.upgrade_efficiency_step;
        machine.speed += config.upgrade_speed_step;
        Ok(fee)
    }

    /// Triple throughput for `days` days. Stacks by extending the end day.
    pub fn apply_booster(
        &mut self,
        id: MachineId,
        days: u32,
        today: Day,
        fees: &FeeSchedule,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        if days == 0 {
            return Err(CommandError::Malformed("booster must last at least one day"));
        }
        let machine = self.machine(id)?;
        let fee = fees.booster_per_level.saturating_mul(from_units(machine.level));
        let start = machine.booster_until.map_or(today, |end| end.max(today));
        let end = start.saturating_add(days);
        finance.spend(fee)?;
        self.machine_mut(id)?.booster_until = Some(end);
        Ok(fee)
    }

    /// Restore rated efficiency. The machine sits out `maintenance_days`.
    pub fn repair(
        &mut self,
        id: MachineId,
        today: Day,
        fees: &FeeSchedule,
        config: &PipelineConfig,
        finance: &mut FinanceLedger,
    ) -> Result<Money, CommandError> {
        let machine = self.machine(id)?;
        let suspended = match machine.state {
            MachineState::Idle => None,
            MachineState::Working(job) => Some(job),
            MachineState::Stalled {
                reason: StallReason::Defect,
                ..
            } => return Err(CommandError::DefectPending),
            MachineState::Stalled { .. } => return Err(CommandError::MachineBusy),
            MachineState::Maintenance { .. } => return Err(CommandError::UnderMaintenance),
        };
        let fee = fees.repair_per_level.saturating_mul(from_units(machine.level));
        finance.spend(fee)?;

        let machine = self.machine_mut(id)?;
        machine.efficiency = machine.rated_efficiency;
        if config.maintenance_days > 0 {
            machine.state = MachineState::Maintenance {
                job: suspended,
                until_day: today.saturating_add(config.maintenance_days),
            };
        }
        Ok(fee)
    }

    pub(crate) fn attach_worker(&mut self, id: MachineId, worker: WorkerId) {
        if let Some(machine) = self.machines.get_mut(id)
            && !machine.assigned_workers.contains(&worker)
        {
            machine.assigned_workers.push(worker);
        }
    }

    pub(crate) fn detach_worker(&mut self, id: MachineId, worker: WorkerId) {
        if let Some(machine) = self.machines.get_mut(id) {
            machine.assigned_workers.retain(|w| *w != worker);
        }
    }

    /// Bring machines whose maintenance ended by `today` back online.
    pub fn finish_maintenance(&mut self, today: Day) -> Vec<MachineId> {
        let mut released = Vec::new();
        for (id, machine) in self.machines.iter_mut() {
            if let MachineState::Maintenance { job, until_day } = machine.state
                && until_day <= today
            {
                machine.state = job.map_or(MachineState::Idle, MachineState::Working);
                released.push(id);
            }
        }
        released
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance every working machine by one day.
    ///
    /// `crew_of` resolves a machine's assigned workers to the attributes that
    /// affect output. Defect rolls draw from `rng` in machine order.
    pub fn tick<F>(
        &mut self,
        ctx: &TickContext<'_>,
        catalog: &ProductCatalog,
        inventory: &mut Inventory,
        rng: &mut SimRng,
        crew_of: F,
    ) -> PipelineReport
    where
        F: Fn(&[WorkerId]) -> Vec<CrewMember>,
    {
        let mut report = PipelineReport::default();

        // Phase 1: compute.
        let mut deltas = Vec::new();
        for (id, machine) in self.machines.iter() {
            if machine
                .booster_until
                .is_some_and(|end| ctx.today >= end)
            {
                report.boosters_expired.push(id);
            }
            let MachineState::Working(job) = machine.state else {
                continue;
            };
            let crew = crew_bonus(machine.stage, &crew_of(&machine.assigned_workers), ctx.config);
            let booster = if machine.booster_active(ctx.today) {
                ctx.config.booster_multiplier
            } else {
                Fixed64::ONE
            };
            let increment = ctx
                .config
                .progress_per_day
                .saturating_mul(machine.speed)
                .saturating_mul(machine.efficiency)
                .saturating_mul(Fixed64::ONE + crew.speed)
                .saturating_mul(booster)
                .saturating_mul(ctx.pace);
            let progress = job.progress.saturating_add(increment);
            let outcome = if progress < job.target {
                Outcome::InProgress
            } else if rng.chance(defect_chance(machine.efficiency, crew, ctx.config)) {
                Outcome::Defective
            } else {
                Outcome::Clean
            };
            deltas.push(Delta {
                id,
                progress: progress.min(job.target),
                outcome,
            });
        }

        // Phase 2: apply.
        for &id in &report.boosters_expired {
            if let Some(machine) = self.machines.get_mut(id) {
                machine.booster_until = None;
            }
        }
        let mut fresh = Vec::new();
        for delta in &deltas {
            let Some(machine) = self.machines.get_mut(delta.id) else {
                continue;
            };
            let MachineState::Working(mut job) = machine.state else {
                continue;
            };
            job.progress = delta.progress;
            machine.state = match delta.outcome {
                Outcome::InProgress => MachineState::Working(job),
                Outcome::Defective => {
                    report.defects.push((delta.id, job.product));
                    MachineState::Stalled {
                        job,
                        reason: StallReason::Defect,
                    }
                }
                Outcome::Clean => {
                    machine.cycles += 1;
                    machine.wear_down(ctx.config);
                    fresh.push(delta.id);
                    MachineState::Stalled {
                        job,
                        reason: StallReason::AwaitingHandoff,
                    }
                }
            };
        }

        // Parked units from earlier ticks go before this tick's completions.
        let parked: Vec<MachineId> = self
            .machines
            .iter()
            .filter(|(id, m)| m.awaiting_handoff() && !fresh.contains(id))
            .map(|(id, _)| id)
            .collect();
        for stage in [Stage::Quality, Stage::Packaging, Stage::Assembly] {
            let queue: Vec<MachineId> = parked
                .iter()
                .chain(fresh.iter())
                .copied()
                .filter(|id| self.machines.get(*id).is_some_and(|m| m.stage == stage))
                .collect();
            for id in queue {
                self.resolve_handoff(id, catalog, inventory, ctx.config, &mut report);
            }
        }

        report.parked = self
            .machines
            .values()
            .filter(|m| m.awaiting_handoff())
            .count() as u32;
        report
    }

    /// Move a finished unit forward, or leave it parked.
    fn resolve_handoff(
        &mut self,
        from: MachineId,
        catalog: &ProductCatalog,
        inventory: &mut Inventory,
        config: &PipelineConfig,
        report: &mut PipelineReport,
    ) {
        let Some(machine) = self.machines.get(from) else {
            return;
        };
        let MachineState::Stalled {
            job,
            reason: StallReason::AwaitingHandoff,
        } = machine.state
        else {
            return;
        };

        let Some(next) = self.next_stage(machine.stage) else {
            inventory.add(job.product, 1);
            report.produced.push((from, job.product));
            if let Some(machine) = self.machines.get_mut(from) {
                machine.state = MachineState::Idle;
            }
            return;
        };

        let receiver = self
            .machines
            .iter()
            .find(|(_, m)| m.stage == next && m.is_idle())
            .map(|(id, _)| id);
        let Some(to) = receiver else {
            return;
        };
        let production_time = catalog
            .get(job.product)
            .map_or(1, |p| p.production_time);
        let target = Self::target_for(production_time, next, config);
        if let Some(receiver) = self.machines.get_mut(to) {
            receiver.state = MachineState::Working(Job::new(job.product, target));
        }
        if let Some(machine) = self.machines.get_mut(from) {
            machine.state = MachineState::Idle;
        }
        report.handoffs.push((from, to, job.product));
    }
}

impl Default for ProductionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_idle(machine: &Machine) -> Result<(), CommandError> {
    match machine.state {
        MachineState::Idle => Ok(()),
        MachineState::Working(_) => Err(CommandError::MachineBusy),
        MachineState::Stalled {
            reason: StallReason::Defect,
            ..
        } => Err(CommandError::DefectPending),
        MachineState::Stalled { .. } => Err(CommandError::MachineBusy),
        MachineState::Maintenance { .. } => Err(CommandError::UnderMaintenance),
    }
}
