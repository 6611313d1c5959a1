//! The engine: owns the simulation state and applies commands to it.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - An [`EngineConfig`] (balance constants, frozen at construction)
//! - An [`EngineState`] (day counter, the five components, stats, RNG)
//! - An [`EventBus`] for typed simulation events
//! - A [`CommandQueue`] for callers that batch input between frames
//!
//! Every state change is a [`Command`] passed to [`Engine::apply`]. A rejected
//! command returns its [`CommandError`] and leaves the state untouched.
//!
//! # Tick Order
//!
//! Each `Tick` runs:
//! 1. **Workforce** -- motivation decay and morale
//! 2. **Pipeline** -- machine progress, defect rolls, stage handoffs
//! 3. **Orders** -- settle active orders from inventory, expire late ones
//! 4. **Finance** -- payroll, then loan installments
//! 5. **Spawns** -- new order, then new candidate
//! 6. **Bookkeeping** -- day counter, maintenance release, bankruptcy check,
//!    state hash

use crate::command::{Command, CommandQueue};
use crate::config::{ConfigError, EngineConfig};
use crate::error::CommandError;
use crate::event::{Event, EventBus, EventKind, Expense, PassiveListener};
use crate::finance::LoanTerms;
use crate::fixed::{from_units, Day, Fixed64, Money};
use crate::id::{LoanId, MachineId, ProductKind, Stage};
use crate::machine::MachineSpec;
use crate::order::{OrderBook, Shipment};
use crate::pipeline::TickContext;
use crate::sim::{AdvanceResult, TickSummary};
use crate::state::EngineState;

/// What an accepted command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    /// A machine was bought.
    Machine(MachineId),
    /// A loan was originated.
    Loan(LoanId),
    /// Inventory was shipped against an order.
    Shipment(Shipment),
    /// A complaint was settled with a new deadline.
    Deadline(Day),
    /// An order was cancelled with this penalty.
    Penalty(Money),
    Ticked(TickSummary),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pub(crate) state: EngineState,
    events: EventBus,
    queue: CommandQueue,
    /// Wall-clock milliseconds not yet converted into ticks.
    accumulator_ms: u64,
}

impl Engine {
    /// Build an engine for a new campaign: starting fleet, candidates and
    /// orders are drawn from the config and its seed.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut state = EngineState::from_config(&config);

        for stage in &config.starting_fleet {
            state.pipeline.install(MachineSpec::new(*stage));
        }
        for _ in 0..config.workforce.initial_candidates {
            state
                .workforce
                .spawn_candidate(&mut state.rng, &config.workforce);
        }
        let cap = OrderBook::quantity_cap(
            state.pipeline.count_working(Stage::Assembly),
            Fixed64::ZERO,
            &config.orders,
        );
        for _ in 0..config.orders.initial_orders {
            state
                .orders
                .generate(&mut state.rng, state.day, &state.catalog, cap, &config.orders);
        }

        log::debug!(
            "engine created: seed {}, {} machines, {} candidates, {} orders",
            config.seed,
            state.pipeline.len(),
            state.workforce.candidate_count(),
            state.orders.open_count()
        );
        Ok(Self::assemble(config, state))
    }

    /// Resume from a previously captured state.
    pub fn from_state(config: EngineConfig, state: EngineState) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, state))
    }

    fn assemble(config: EngineConfig, state: EngineState) -> Self {
        Self {
            config,
            state,
            events: EventBus::default(),
            queue: CommandQueue::new(),
            accumulator_ms: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the whole simulation state.
    pub fn snapshot(&self) -> &EngineState {
        &self.state
    }

    /// Hash of the current state. Equal hashes mean equal simulations.
    pub fn state_hash(&self) -> u64 {
        self.state.state_hash()
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    /// Register a passive listener for an event kind.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    // -----------------------------------------------------------------------
    // Command queue
    // -----------------------------------------------------------------------

    /// Queue a command for the next [`Engine::flush`].
    pub fn submit(&mut self, command: Command) {
        self.queue.push(command);
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Keep the last `max` flushed commands in the queue's history.
    pub fn record_history(&mut self, max: usize) {
        let pending = self.queue.drain(self.state.day);
        self.queue = CommandQueue::with_max_history(max);
        self.queue.push_batch(pending);
    }

    /// Apply every queued command in submission order.
    pub fn flush(&mut self) -> Vec<Result<CommandOutcome, CommandError>> {
        let commands = self.queue.drain(self.state.day);
        commands.into_iter().map(|cmd| self.apply(cmd)).collect()
    }

    // -----------------------------------------------------------------------
    // Real-time driving
    // -----------------------------------------------------------------------

    /// Convert elapsed wall-clock time into ticks.
    ///
    /// Runs one tick per `day_length_ms` while the simulation is started and
    /// carries the remainder forward. Time passed while stopped is dropped.
    pub fn advance(&mut self, elapsed_ms: u64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.state.started || self.state.bankrupt {
            self.accumulator_ms = 0;
            return result;
        }

        let step = self.config.day_length_ms.max(1);
        self.accumulator_ms = self.accumulator_ms.saturating_add(elapsed_ms);
        while self.accumulator_ms >= step {
            self.accumulator_ms -= step;
            match self.apply(Command::Tick) {
                Ok(CommandOutcome::Ticked(summary)) => result.ticks.push(summary),
                Ok(_) => {}
                Err(err) => {
                    self.accumulator_ms = 0;
                    result.halted = Some(err);
                    break;
                }
            }
        }
        result
    }

    /// Milliseconds accumulated toward the next tick.
    pub fn pending_ms(&self) -> u64 {
        self.accumulator_ms
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Apply one command. On error the state is unchanged.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        let name = command.name();
        let day = self.state.day;
        let result = self.dispatch(command);
        match &result {
            Ok(_) => log::debug!("day {day}: {name} applied"),
            Err(err) => log::warn!("day {day}: {name} rejected: {err}"),
        }
        self.events.deliver();
        result
    }

    fn dispatch(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        let day = self.state.day;
        let config = &self.config;
        let state = &mut self.state;

        match command {
            // -- Resources and products --
            Command::BuyResource { kind, amount } => {
                let cost = state.resources.buy(kind, amount, &mut state.finance)?;
                self.events.emit(purchase(Expense::Resources, cost, day));
            }
            Command::SellProduct { product, amount } => {
                if amount == 0 {
                    return Err(CommandError::Malformed("cannot sell zero units"));
                }
                let price = state
                    .catalog
                    .get(product)
                    .ok_or(CommandError::Malformed("unknown product"))?
                    .price;
                let revenue = price.saturating_mul(from_units(amount));
                state.inventory.remove(product, amount)?;
                state.finance.earn(revenue);
                state.stats.units_sold += amount;
                self.events.emit(Event::ProductSold {
                    product,
                    units: amount,
                    revenue,
                    day,
                });
            }
            Command::SetProductPrice { product, price } => {
                state
                    .catalog
                    .set_price(product, price, &state.resources, config.max_price_markup)?;
            }
            Command::UnlockProduct { product } => {
                let cost = state
                    .catalog
                    .unlock_cost(product, config.fees.unlock_price_multiple)?;
                state.finance.spend(cost)?;
                state.catalog.mark_unlocked(product);
                log::info!("day {day}: unlocked {product:?} for {cost}");
                self.events.emit(purchase(Expense::Unlock, cost, day));
            }

            // -- Machines --
            Command::AssignMachine { machine, product } => {
                state.pipeline.assign(
                    machine,
                    product,
                    &state.catalog,
                    &mut state.resources,
                    &config.pipeline,
                )?;
                state.stats.units_started += 1;
                self.events.emit(Event::UnitStarted {
                    machine,
                    product,
                    day,
                });
            }
            Command::UnassignMachine { machine } => {
                let product = state.pipeline.unassign(machine)?;
                state.stats.units_discarded += 1;
                self.events.emit(discarded(machine, product, day));
            }
            Command::UpgradeMachine { machine } => {
                let fee = state.pipeline.upgrade(
                    machine,
                    &config.fees,
                    &config.pipeline,
                    &mut state.finance,
                )?;
                self.events.emit(purchase(Expense::Upgrade, fee, day));
            }
            Command::RepairMachine { machine } => {
                let fee = state.pipeline.repair(
                    machine,
                    day,
                    &config.fees,
                    &config.pipeline,
                    &mut state.finance,
                )?;
                state.stats.machines_repaired += 1;
                self.events.emit(purchase(Expense::Repair, fee, day));
            }
            Command::FixDefect { machine } => {
                let fee = state
                    .pipeline
                    .fix_defect(machine, &config.fees, &mut state.finance)?;
                self.events.emit(purchase(Expense::Rework, fee, day));
            }
            Command::DiscardDefect { machine } => {
                let product = state.pipeline.discard_defect(machine)?;
                state.stats.units_discarded += 1;
                self.events.emit(discarded(machine, product, day));
            }
            Command::ApplyBooster { machine, days } => {
                let fee = state.pipeline.apply_booster(
                    machine,
                    days,
                    day,
                    &config.fees,
                    &mut state.finance,
                )?;
                self.events.emit(purchase(Expense::Booster, fee, day));
            }
            Command::BuyMachine { spec } => {
                let price = config.machine_prices.price(spec.stage);
                let id = state
                    .pipeline
                    .buy_machine(spec, &config.machine_prices, &mut state.finance)?;
                state.stats.machines_bought += 1;
                self.events.emit(purchase(Expense::Machine, price, day));
                return Ok(CommandOutcome::Machine(id));
            }

            // -- Orders --
            Command::AcceptOrder { order } => {
                state.orders.accept(order, day)?;
            }
            Command::RejectOrder { order } => {
                state.orders.reject(order)?;
                state.stats.orders_rejected += 1;
            }
            Command::ShipOrder { order } => {
                let shipment = state.orders.ship(order, &mut state.inventory)?;
                state.stats.units_shipped += shipment.units;
                self.events.emit(Event::UnitsShipped {
                    order,
                    product: shipment.product,
                    units: shipment.units,
                    day,
                });
                if let Some(reward) = shipment.reward {
                    state.finance.earn(reward);
                    state.stats.orders_completed += 1;
                    log::info!("day {day}: order {order:?} completed for {reward}");
                    self.events.emit(Event::OrderCompleted { order, reward, day });
                }
                return Ok(CommandOutcome::Shipment(shipment));
            }
            Command::NegotiateDeadline { order } => {
                let deadline = state.orders.negotiate(order, day, &config.orders)?;
                return Ok(CommandOutcome::Deadline(deadline));
            }
            Command::CancelOrder { order } => {
                let penalty = state.orders.cancel(order, &config.orders)?;
                state.finance.charge(penalty);
                state.stats.orders_failed += 1;
                log::info!("day {day}: order {order:?} cancelled, penalty {penalty}");
                self.events.emit(Event::OrderFailed {
                    order,
                    penalty,
                    day,
                });
                return Ok(CommandOutcome::Penalty(penalty));
            }

            // -- Workforce --
            Command::HireWorker { worker } => {
                let cost = state
                    .workforce
                    .hire(worker, day, &config.fees, &mut state.finance)?;
                state.stats.workers_hired += 1;
                self.events.emit(Event::WorkerHired { worker, day });
                self.events.emit(purchase(Expense::Hiring, cost, day));
            }
            Command::AssignWorker { worker, machine } => {
                state.workforce.assign(worker, machine, &mut state.pipeline)?;
            }
            Command::UnassignWorker { worker } => {
                state.workforce.unassign(worker, &mut state.pipeline)?;
            }
            Command::MotivateWorker { worker, amount } => {
                let cost = state.workforce.motivate(
                    worker,
                    amount,
                    &config.fees,
                    &config.workforce,
                    &mut state.finance,
                )?;
                state.stats.workers_motivated += 1;
                self.events.emit(purchase(Expense::Motivation, cost, day));
            }
            Command::TrainWorker { worker } => {
                let cost = state.workforce.train(
                    worker,
                    &config.fees,
                    &config.workforce,
                    &mut state.finance,
                )?;
                state.stats.workers_trained += 1;
                self.events.emit(purchase(Expense::Training, cost, day));
            }

            // -- Finance --
            Command::TakeLoan { amount, days, rate } => {
                let id = state.finance.take_loan(
                    LoanTerms {
                        amount,
                        days,
                        annual_rate: rate,
                    },
                    day,
                    config.finance.max_active_loans,
                    config.finance.days_per_year,
                )?;
                state.stats.loans_taken += 1;
                self.events.emit(Event::LoanTaken {
                    loan: id,
                    amount,
                    day,
                });
                return Ok(CommandOutcome::Loan(id));
            }

            // -- Clock --
            Command::StartSimulation => {
                if state.bankrupt {
                    return Err(CommandError::Bankrupt);
                }
                if state.started {
                    return Err(CommandError::AlreadyStarted);
                }
                state.started = true;
                log::info!("day {day}: simulation started");
            }
            Command::AdjustGamePace { pace } => {
                if pace <= Fixed64::ZERO || pace > config.max_game_pace {
                    return Err(CommandError::Malformed("game pace out of range"));
                }
                state.game_pace = pace;
            }
            Command::Tick => {
                let summary = self.run_tick()?;
                return Ok(CommandOutcome::Ticked(summary));
            }
        }
        Ok(CommandOutcome::Done)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    fn run_tick(&mut self) -> Result<TickSummary, CommandError> {
        if self.state.bankrupt {
            return Err(CommandError::Bankrupt);
        }
        if !self.state.started {
            return Err(CommandError::NotStarted);
        }

        let config = &self.config;
        let state = &mut self.state;
        let events = &mut self.events;
        let today = state.day;
        let mut summary = TickSummary {
            day: today,
            ..TickSummary::default()
        };

        // Phase 1: Workforce -- motivation decay and morale.
        let workforce = state.workforce.tick(&mut state.rng, &config.workforce);
        for (worker, status) in &workforce.status_changes {
            log::debug!("day {today}: worker {worker:?} is now {status:?}");
        }

        // Phase 2: Pipeline -- progress, defects, handoffs.
        let ctx = TickContext {
            today,
            pace: state.game_pace,
            config: &config.pipeline,
        };
        let roster = &state.workforce;
        let production = state.pipeline.tick(
            &ctx,
            &state.catalog,
            &mut state.inventory,
            &mut state.rng,
            |ids| roster.crew(ids),
        );
        for &(from, to, product) in &production.handoffs {
            events.emit(Event::UnitHandedOff {
                from,
                to,
                product,
                day: today,
            });
        }
        for &(machine, product) in &production.defects {
            events.emit(Event::UnitDefective {
                machine,
                product,
                day: today,
            });
        }
        for &(machine, product) in &production.produced {
            events.emit(Event::UnitProduced {
                machine,
                product,
                day: today,
            });
        }
        for machine in &production.boosters_expired {
            log::debug!("day {today}: booster on {machine:?} expired");
        }
        summary.units_produced = production.produced.len() as u32;
        summary.units_defective = production.defects.len() as u32;
        state.stats.units_produced += summary.units_produced;
        state.stats.units_defective += summary.units_defective;

        // Phase 3: Orders -- settlement and deadlines.
        let orders = state.orders.tick(today, &mut state.inventory, &config.orders);
        for &(order, shipment) in &orders.shipped {
            state.stats.units_shipped += shipment.units;
            events.emit(Event::UnitsShipped {
                order,
                product: shipment.product,
                units: shipment.units,
                day: today,
            });
        }
        for &(order, reward) in &orders.completed {
            state.finance.earn(reward);
            state.stats.orders_completed += 1;
            log::info!("day {today}: order {order:?} completed for {reward}");
            events.emit(Event::OrderCompleted {
                order,
                reward,
                day: today,
            });
        }
        for &(order, penalty) in &orders.failed {
            state.finance.charge(penalty);
            state.stats.orders_failed += 1;
            log::info!("day {today}: order {order:?} failed, penalty {penalty}");
            events.emit(Event::OrderFailed {
                order,
                penalty,
                day: today,
            });
        }
        for &order in &orders.expired {
            state.stats.orders_late += 1;
            events.emit(Event::OrderExpired { order, day: today });
        }
        for &order in &orders.complaints {
            log::info!("day {today}: customer complaint on {order:?}");
            events.emit(Event::ComplaintOpened { order, day: today });
        }
        summary.orders_completed = orders.completed.len() as u32;
        summary.orders_failed = orders.failed.len() as u32;

        // Phase 4: Finance -- payroll, then loan installments.
        let payroll = state.workforce.payroll();
        if payroll > Money::ZERO {
            state.finance.charge(payroll);
            events.emit(Event::PayrollPaid {
                amount: payroll,
                day: today,
            });
        }
        summary.payroll = payroll;

        let loans = state.finance.tick_loans();
        if loans.paid > Money::ZERO {
            events.emit(Event::InstallmentsPaid {
                amount: loans.paid,
                day: today,
            });
        }
        for (loan, _) in &loans.repaid {
            state.stats.loans_repaid += 1;
            log::info!("day {today}: loan {loan:?} repaid");
            events.emit(Event::LoanRepaid {
                loan: *loan,
                day: today,
            });
        }
        summary.installments = loans.paid;

        // Phase 5: Spawns -- an order, then a candidate.
        let cap = OrderBook::quantity_cap(
            state.pipeline.count_working(Stage::Assembly),
            state
                .workforce
                .average_worker_factor(config.pipeline.worker_speed_coefficient),
            &config.orders,
        );
        if let Some(order) =
            state
                .orders
                .maybe_spawn(&mut state.rng, today, &state.catalog, cap, &config.orders)
            && let Some(spawned) = state.orders.get(order)
        {
            events.emit(Event::OrderSpawned {
                order,
                product: spawned.product,
                quantity: spawned.quantity,
                day: today,
            });
        }
        if let Some(worker) = state
            .workforce
            .maybe_spawn_candidate(&mut state.rng, &config.workforce)
        {
            events.emit(Event::CandidateArrived {
                worker,
                day: today,
            });
        }

        // Phase 6: Bookkeeping.
        state.day = today.saturating_add(1);
        for machine in state.pipeline.finish_maintenance(state.day) {
            log::debug!("day {}: {machine:?} back from maintenance", state.day);
        }
        let cash = state.finance.cash();
        if let Some(floor) = config.finance.bankruptcy_floor
            && cash < floor
        {
            state.bankrupt = true;
            state.started = false;
            log::info!("day {today}: bankrupt with cash {cash} below floor {floor}");
            events.emit(Event::Bankrupt { cash, day: today });
        }
        events.emit(Event::DayEnded { day: today, cash });

        summary.state_hash = state.state_hash();
        Ok(summary)
    }
}

fn purchase(expense: Expense, amount: Money, day: Day) -> Event {
    Event::Purchase {
        expense,
        amount,
        day,
    }
}

fn discarded(machine: MachineId, product: ProductKind, day: Day) -> Event {
    Event::UnitDiscarded {
        machine,
        product,
        day,
    }
}
