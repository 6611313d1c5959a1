//! Reporting statistics for the Shopfloor engine.
//!
//! Aggregates engine events into rolling daily metrics: revenue, expenses and
//! profit, output and defects per product and per machine, and order
//! outcomes. All values use [`Fixed64`] arithmetic for determinism.
//!
//! Money in and out mirrors the engine's ledger: revenue is product sales
//! plus order rewards, expenses are purchases, payroll, loan installments and
//! order penalties. Loan principal is tracked separately as financing.
//!
//! # Usage
//!
//! ```ignore
//! let stats = Rc::new(RefCell::new(FactoryStats::new(StatsConfig::default())));
//! for kind in FactoryStats::TRACKED_KINDS {
//!     let stats = Rc::clone(&stats);
//!     engine.on_passive(kind, Box::new(move |e| stats.borrow_mut().process_event(e)));
//! }
//! engine.apply(Command::Tick)?;
//! let profit = stats.borrow().daily_profit();
//! ```
//!
//! A [`Event::DayEnded`] closes the current day, so no explicit
//! [`end_day`](FactoryStats::end_day) call is needed when stats are fed from
//! the engine's listeners.

use std::collections::HashMap;

use shopfloor_core::event::{Event, EventKind, Expense};
use shopfloor_core::fixed::{Day, Fixed64, Money};
use shopfloor_core::id::{MachineId, ProductKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics module.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Window size in days for rolling averages.
    pub window_days: Day,
    /// Maximum number of daily snapshots to retain per metric.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            history_capacity: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// Daily history
// ---------------------------------------------------------------------------

/// The last `days` closed days of one figure. Once full, recording a new day
/// overwrites the oldest.
#[derive(Debug, Clone)]
struct DailyHistory {
    values: Vec<Fixed64>,
    days: usize,
    /// Slot of the oldest day once `values` is full.
    oldest: usize,
}

impl DailyHistory {
    fn new(days: usize) -> Self {
        let days = days.max(1);
        Self {
            values: Vec::with_capacity(days),
            days,
            oldest: 0,
        }
    }

    fn record(&mut self, value: Fixed64) {
        if self.values.len() < self.days {
            self.values.push(value);
        } else {
            self.values[self.oldest] = value;
            self.oldest = (self.oldest + 1) % self.days;
        }
    }

    /// Oldest day first.
    fn to_vec(&self) -> Vec<Fixed64> {
        let (newer, older) = self.values.split_at(self.oldest);
        older.iter().chain(newer).copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Rolling window
// ---------------------------------------------------------------------------

/// Sum of a quantity over the most recent N days.
///
/// Values accumulate into `current` during a day. [`commit`](Self::commit)
/// closes the day, evicting the oldest committed day once the window is
/// full. [`total`](Self::total) and [`rate`](Self::rate) include the open day
/// so queries are accurate mid-day.
#[derive(Debug, Clone)]
struct RollingWindow {
    days: Vec<Fixed64>,
    write_pos: usize,
    committed_total: Fixed64,
    committed_count: usize,
    current: Fixed64,
}

impl RollingWindow {
    fn new(window: usize) -> Self {
        Self {
            days: vec![Fixed64::ZERO; window.max(1)],
            write_pos: 0,
            committed_total: Fixed64::ZERO,
            committed_count: 0,
            current: Fixed64::ZERO,
        }
    }

    fn add(&mut self, value: Fixed64) {
        self.current = self.current.saturating_add(value);
    }

    fn add_units(&mut self, units: u32) {
        self.add(Fixed64::from_num(units));
    }

    fn commit(&mut self) {
        let window = self.days.len();
        if self.committed_count == window {
            self.committed_total -= self.days[self.write_pos];
        }
        self.days[self.write_pos] = self.current;
        self.committed_total = self.committed_total.saturating_add(self.current);
        self.current = Fixed64::ZERO;
        self.write_pos = (self.write_pos + 1) % window;
        if self.committed_count < window {
            self.committed_count += 1;
        }
    }

    fn total(&self) -> Fixed64 {
        self.committed_total.saturating_add(self.current)
    }

    /// Average per day over the committed days, plus the open day if it
    /// has recorded anything.
    fn rate(&self) -> Fixed64 {
        let contributing = if self.current != Fixed64::ZERO {
            self.committed_count + 1
        } else {
            self.committed_count
        };
        if contributing == 0 {
            return Fixed64::ZERO;
        }
        self.total() / Fixed64::from_num(contributing)
    }
}

fn ratio(part: Fixed64, whole: Fixed64) -> Fixed64 {
    if whole == Fixed64::ZERO {
        Fixed64::ZERO
    } else {
        part / whole
    }
}

// ---------------------------------------------------------------------------
// Per-entity statistics
// ---------------------------------------------------------------------------

/// Where money left the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostCategory {
    Purchase(Expense),
    Payroll,
    Installments,
    Penalties,
}

#[derive(Debug, Clone)]
struct MachineStats {
    /// Units finished, whether handed downstream or put into inventory.
    output: RollingWindow,
    defects: RollingWindow,
    discards: RollingWindow,
    lifetime_output: u64,
}

impl MachineStats {
    fn new(window: usize) -> Self {
        Self {
            output: RollingWindow::new(window),
            defects: RollingWindow::new(window),
            discards: RollingWindow::new(window),
            lifetime_output: 0,
        }
    }

    fn commit(&mut self) {
        self.output.commit();
        self.defects.commit();
        self.discards.commit();
    }
}

#[derive(Debug, Clone)]
struct ProductStats {
    /// Units entering inventory.
    produced: RollingWindow,
    /// Units leaving inventory, sold or shipped.
    delivered: RollingWindow,
    revenue: RollingWindow,
    output_history: DailyHistory,
}

impl ProductStats {
    fn new(window: usize, history: usize) -> Self {
        Self {
            produced: RollingWindow::new(window),
            delivered: RollingWindow::new(window),
            revenue: RollingWindow::new(window),
            output_history: DailyHistory::new(history),
        }
    }

    fn commit(&mut self) {
        self.output_history.record(self.produced.current);
        self.produced.commit();
        self.delivered.commit();
        self.revenue.commit();
    }
}

#[derive(Debug, Clone)]
struct OrderStats {
    spawned: RollingWindow,
    completed: RollingWindow,
    failed: RollingWindow,
    expired: RollingWindow,
    complaints: RollingWindow,
}

impl OrderStats {
    fn new(window: usize) -> Self {
        Self {
            spawned: RollingWindow::new(window),
            completed: RollingWindow::new(window),
            failed: RollingWindow::new(window),
            expired: RollingWindow::new(window),
            complaints: RollingWindow::new(window),
        }
    }

    fn commit(&mut self) {
        self.spawned.commit();
        self.completed.commit();
        self.failed.commit();
        self.expired.commit();
        self.complaints.commit();
    }
}

// ---------------------------------------------------------------------------
// FactoryStats
// ---------------------------------------------------------------------------

/// Main reporting aggregator.
///
/// Accepts events via [`process_event`](FactoryStats::process_event), closes
/// days via [`end_day`](FactoryStats::end_day) (or a [`Event::DayEnded`]),
/// and exposes money, production and order metrics through getters.
#[derive(Debug)]
pub struct FactoryStats {
    config: StatsConfig,
    revenue: RollingWindow,
    expenses: RollingWindow,
    revenue_history: DailyHistory,
    expense_history: DailyHistory,
    profit_history: DailyHistory,
    cash_history: DailyHistory,
    total_revenue: Money,
    total_expenses: Money,
    total_borrowed: Money,
    costs: HashMap<CostCategory, Money>,
    machines: HashMap<MachineId, MachineStats>,
    products: HashMap<ProductKind, ProductStats>,
    orders: OrderStats,
    loans_repaid: u32,
    bankrupt_on: Option<Day>,
    /// Last closed day.
    current_day: Day,
}

impl FactoryStats {
    /// Event kinds the aggregator reads. Register a listener for each.
    pub const TRACKED_KINDS: [EventKind; 18] = [
        EventKind::UnitHandedOff,
        EventKind::UnitProduced,
        EventKind::UnitDefective,
        EventKind::UnitDiscarded,
        EventKind::OrderSpawned,
        EventKind::UnitsShipped,
        EventKind::OrderCompleted,
        EventKind::OrderFailed,
        EventKind::OrderExpired,
        EventKind::ComplaintOpened,
        EventKind::ProductSold,
        EventKind::Purchase,
        EventKind::LoanTaken,
        EventKind::LoanRepaid,
        EventKind::InstallmentsPaid,
        EventKind::PayrollPaid,
        EventKind::Bankrupt,
        EventKind::DayEnded,
    ];

    pub fn new(config: StatsConfig) -> Self {
        let window = config.window_days as usize;
        let history = config.history_capacity;
        Self {
            revenue: RollingWindow::new(window),
            expenses: RollingWindow::new(window),
            revenue_history: DailyHistory::new(history),
            expense_history: DailyHistory::new(history),
            profit_history: DailyHistory::new(history),
            cash_history: DailyHistory::new(history),
            total_revenue: Money::ZERO,
            total_expenses: Money::ZERO,
            total_borrowed: Money::ZERO,
            costs: HashMap::new(),
            machines: HashMap::new(),
            products: HashMap::new(),
            orders: OrderStats::new(window),
            loans_repaid: 0,
            bankrupt_on: None,
            current_day: 0,
            config,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// The last day closed by [`end_day`](Self::end_day).
    pub fn current_day(&self) -> Day {
        self.current_day
    }

    // -- Event processing ---------------------------------------------------

    /// Process a single event, updating the open day's counters.
    pub fn process_event(&mut self, event: &Event) {
        match *event {
            Event::UnitHandedOff { from, .. } => {
                let stats = self.machine(from);
                stats.output.add_units(1);
                stats.lifetime_output += 1;
            }
            Event::UnitProduced {
                machine, product, ..
            } => {
                let stats = self.machine(machine);
                stats.output.add_units(1);
                stats.lifetime_output += 1;
                self.product(product).produced.add_units(1);
            }
            Event::UnitDefective { machine, .. } => {
                self.machine(machine).defects.add_units(1);
            }
            Event::UnitDiscarded { machine, .. } => {
                self.machine(machine).discards.add_units(1);
            }

            Event::OrderSpawned { .. } => self.orders.spawned.add_units(1),
            Event::UnitsShipped { product, units, .. } => {
                self.product(product).delivered.add_units(units);
            }
            Event::OrderCompleted { reward, .. } => {
                self.orders.completed.add_units(1);
                self.record_revenue(reward);
            }
            Event::OrderFailed { penalty, .. } => {
                self.orders.failed.add_units(1);
                self.record_cost(CostCategory::Penalties, penalty);
            }
            Event::OrderExpired { .. } => self.orders.expired.add_units(1),
            Event::ComplaintOpened { .. } => self.orders.complaints.add_units(1),
            Event::ProductSold {
                product,
                units,
                revenue,
                ..
            } => {
                let stats = self.product(product);
                stats.delivered.add_units(units);
                stats.revenue.add(revenue);
                self.record_revenue(revenue);
            }

            Event::Purchase {
                expense, amount, ..
            } => self.record_cost(CostCategory::Purchase(expense), amount),
            Event::PayrollPaid { amount, .. } => self.record_cost(CostCategory::Payroll, amount),
            Event::InstallmentsPaid { amount, .. } => {
                self.record_cost(CostCategory::Installments, amount);
            }
            Event::LoanTaken { amount, .. } => {
                self.total_borrowed = self.total_borrowed.saturating_add(amount);
            }
            Event::LoanRepaid { .. } => self.loans_repaid += 1,
            Event::Bankrupt { day, .. } => {
                self.bankrupt_on.get_or_insert(day);
            }

            Event::DayEnded { day, cash } => {
                self.cash_history.record(cash);
                self.end_day(day);
            }

            // Other events are not tracked by the stats module.
            _ => {}
        }
    }

    /// Close the open day: snapshot history and advance every window.
    pub fn end_day(&mut self, day: Day) {
        self.current_day = day;

        let revenue = self.revenue.current;
        let expenses = self.expenses.current;
        self.revenue_history.record(revenue);
        self.expense_history.record(expenses);
        self.profit_history.record(revenue - expenses);
        log::trace!("stats: day {day} closed, revenue {revenue}, expenses {expenses}");

        self.revenue.commit();
        self.expenses.commit();
        for machine in self.machines.values_mut() {
            machine.commit();
        }
        for product in self.products.values_mut() {
            product.commit();
        }
        self.orders.commit();
    }

    // -- Money queries ------------------------------------------------------

    /// Average revenue per day over the window.
    pub fn daily_revenue(&self) -> Money {
        self.revenue.rate()
    }

    /// Average expenses per day over the window.
    pub fn daily_expenses(&self) -> Money {
        self.expenses.rate()
    }

    /// Average profit per day over the window. Negative when losing money.
    pub fn daily_profit(&self) -> Money {
        self.daily_revenue() - self.daily_expenses()
    }

    pub fn total_revenue(&self) -> Money {
        self.total_revenue
    }

    pub fn total_expenses(&self) -> Money {
        self.total_expenses
    }

    /// Loan principal received. Not counted as revenue.
    pub fn total_borrowed(&self) -> Money {
        self.total_borrowed
    }

    /// Lifetime spend in one category.
    pub fn spent_on(&self, category: CostCategory) -> Money {
        self.costs.get(&category).copied().unwrap_or(Money::ZERO)
    }

    /// Lifetime spend per category, largest first.
    pub fn cost_breakdown(&self) -> Vec<(CostCategory, Money)> {
        let mut breakdown: Vec<_> = self.costs.iter().map(|(c, m)| (*c, *m)).collect();
        breakdown.sort_by(|a, b| b.1.cmp(&a.1));
        breakdown
    }

    // -- Production queries -------------------------------------------------

    /// Units per day a machine finished over the window.
    pub fn machine_output_rate(&self, machine: MachineId) -> Fixed64 {
        self.machines
            .get(&machine)
            .map(|m| m.output.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    /// Units a machine has finished since tracking began.
    pub fn machine_lifetime_output(&self, machine: MachineId) -> u64 {
        self.machines
            .get(&machine)
            .map(|m| m.lifetime_output)
            .unwrap_or(0)
    }

    /// Defects per finished or defective unit on a machine, 0.0 to 1.0.
    pub fn machine_defect_rate(&self, machine: MachineId) -> Fixed64 {
        self.machines
            .get(&machine)
            .map(|m| {
                let defects = m.defects.total();
                ratio(defects, m.output.total() + defects)
            })
            .unwrap_or(Fixed64::ZERO)
    }

    /// Defect rate across every tracked machine, 0.0 to 1.0.
    pub fn defect_rate(&self) -> Fixed64 {
        let (output, defects) = self
            .machines
            .values()
            .fold((Fixed64::ZERO, Fixed64::ZERO), |(o, d), m| {
                (o + m.output.total(), d + m.defects.total())
            });
        ratio(defects, output + defects)
    }

    /// Units discarded per day over the window, across all machines.
    pub fn discard_rate(&self) -> Fixed64 {
        self.machines
            .values()
            .map(|m| m.discards.rate())
            .fold(Fixed64::ZERO, |acc, r| acc + r)
    }

    /// Finished units of a product entering inventory, per day.
    pub fn production_rate(&self, product: ProductKind) -> Fixed64 {
        self.products
            .get(&product)
            .map(|p| p.produced.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    /// Units of a product sold or shipped, per day.
    pub fn delivery_rate(&self, product: ProductKind) -> Fixed64 {
        self.products
            .get(&product)
            .map(|p| p.delivered.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    /// Direct-sale revenue of a product, per day.
    pub fn sales_revenue_rate(&self, product: ProductKind) -> Money {
        self.products
            .get(&product)
            .map(|p| p.revenue.rate())
            .unwrap_or(Money::ZERO)
    }

    // -- Order queries ------------------------------------------------------

    /// Completed orders as a share of completed plus failed, over the window.
    pub fn order_success_rate(&self) -> Fixed64 {
        let completed = self.orders.completed.total();
        ratio(completed, completed + self.orders.failed.total())
    }

    pub fn orders_completed(&self) -> Fixed64 {
        self.orders.completed.total()
    }

    pub fn orders_failed(&self) -> Fixed64 {
        self.orders.failed.total()
    }

    pub fn orders_expired(&self) -> Fixed64 {
        self.orders.expired.total()
    }

    pub fn orders_spawned(&self) -> Fixed64 {
        self.orders.spawned.total()
    }

    pub fn complaints(&self) -> Fixed64 {
        self.orders.complaints.total()
    }

    pub fn loans_repaid(&self) -> u32 {
        self.loans_repaid
    }

    /// Day the factory went bankrupt, if it did.
    pub fn bankrupt_on(&self) -> Option<Day> {
        self.bankrupt_on
    }

    // -- Historical data ----------------------------------------------------

    /// Revenue per closed day, oldest to newest.
    pub fn revenue_history(&self) -> Vec<Money> {
        self.revenue_history.to_vec()
    }

    pub fn expense_history(&self) -> Vec<Money> {
        self.expense_history.to_vec()
    }

    pub fn profit_history(&self) -> Vec<Money> {
        self.profit_history.to_vec()
    }

    /// End-of-day cash balances, from [`Event::DayEnded`].
    pub fn cash_history(&self) -> Vec<Money> {
        self.cash_history.to_vec()
    }

    /// Units of a product entering inventory per closed day.
    pub fn output_history(&self, product: ProductKind) -> Vec<Fixed64> {
        self.products
            .get(&product)
            .map(|p| p.output_history.to_vec())
            .unwrap_or_default()
    }

    // -- Utility ------------------------------------------------------------

    /// Drop all statistics for a machine.
    pub fn remove_machine(&mut self, machine: MachineId) {
        self.machines.remove(&machine);
    }

    /// Reset to a fresh state, keeping the configuration.
    pub fn clear(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn tracked_machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn tracked_product_count(&self) -> usize {
        self.products.len()
    }

    // -- Internal helpers ---------------------------------------------------

    fn record_revenue(&mut self, amount: Money) {
        self.revenue.add(amount);
        self.total_revenue = self.total_revenue.saturating_add(amount);
    }

    fn record_cost(&mut self, category: CostCategory, amount: Money) {
        self.expenses.add(amount);
        self.total_expenses = self.total_expenses.saturating_add(amount);
        let spent = self.costs.entry(category).or_insert(Money::ZERO);
        *spent = spent.saturating_add(amount);
    }

    fn machine(&mut self, machine: MachineId) -> &mut MachineStats {
        let window = self.config.window_days as usize;
        self.machines
            .entry(machine)
            .or_insert_with(|| MachineStats::new(window))
    }

    fn product(&mut self, product: ProductKind) -> &mut ProductStats {
        let window = self.config.window_days as usize;
        let history = self.config.history_capacity;
        self.products
            .entry(product)
            .or_insert_with(|| ProductStats::new(window, history))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shopfloor_core::id::OrderId;
    use slotmap::SlotMap;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn make_machines(n: usize) -> Vec<MachineId> {
        let mut sm = SlotMap::<MachineId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    fn make_order() -> OrderId {
        let mut sm = SlotMap::<OrderId, ()>::with_key();
        sm.insert(())
    }

    fn small_config() -> StatsConfig {
        StatsConfig {
            window_days: 5,
            history_capacity: 8,
        }
    }

    fn money(v: i32) -> Money {
        Money::from_num(v)
    }

    fn assert_fixed_approx(actual: Fixed64, expected: f64, tolerance: f64) {
        let actual_f64: f64 = actual.to_num();
        assert!(
            (actual_f64 - expected).abs() < tolerance,
            "expected ~{expected}, got {actual_f64}"
        );
    }

    fn produced(machine: MachineId, product: ProductKind, day: Day) -> Event {
        Event::UnitProduced {
            machine,
            product,
            day,
        }
    }

    // -----------------------------------------------------------------------
    // Daily history
    // -----------------------------------------------------------------------

    #[test]
    fn history_keeps_days_in_order() {
        let mut history = DailyHistory::new(4);
        assert!(history.to_vec().is_empty());
        for v in [1, 2, 3] {
            history.record(Fixed64::from_num(v));
        }
        assert_eq!(
            history.to_vec(),
            vec![Fixed64::from_num(1), Fixed64::from_num(2), Fixed64::from_num(3)]
        );
    }

    #[test]
    fn history_drops_oldest_day_when_full() {
        let mut history = DailyHistory::new(3);
        for v in 1..=5 {
            history.record(Fixed64::from_num(v));
        }
        assert_eq!(
            history.to_vec(),
            vec![Fixed64::from_num(3), Fixed64::from_num(4), Fixed64::from_num(5)]
        );
    }

    #[test]
    fn zero_day_history_keeps_latest() {
        let mut history = DailyHistory::new(0);
        history.record(Fixed64::from_num(1));
        history.record(Fixed64::from_num(2));
        assert_eq!(history.to_vec(), vec![Fixed64::from_num(2)]);
    }

    // -----------------------------------------------------------------------
    // RollingWindow
    // -----------------------------------------------------------------------

    #[test]
    fn rolling_window_evicts_old_days() {
        let mut w = RollingWindow::new(3);
        for v in [10, 20, 30, 40] {
            w.add(Fixed64::from_num(v));
            w.commit();
        }
        // Window holds 20, 30, 40.
        assert_eq!(w.total(), Fixed64::from_num(90));
        assert_eq!(w.rate(), Fixed64::from_num(30));
    }

    #[test]
    fn rolling_window_counts_open_day() {
        let mut w = RollingWindow::new(4);
        w.add(Fixed64::from_num(4));
        w.commit();
        w.add(Fixed64::from_num(8));
        assert_eq!(w.total(), Fixed64::from_num(12));
        assert_eq!(w.rate(), Fixed64::from_num(6));
    }

    #[test]
    fn rolling_window_empty_rate_is_zero() {
        let w = RollingWindow::new(4);
        assert_eq!(w.rate(), Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Money
    // -----------------------------------------------------------------------

    #[test]
    fn revenue_and_expenses_per_day() {
        let mut stats = FactoryStats::new(small_config());
        let order = make_order();

        for day in 1..=5 {
            stats.process_event(&Event::ProductSold {
                product: ProductKind::Phone,
                units: 1,
                revenue: money(300),
                day,
            });
            stats.process_event(&Event::PayrollPaid {
                amount: money(100),
                day,
            });
            stats.end_day(day);
        }
        stats.process_event(&Event::OrderCompleted {
            order,
            reward: money(500),
            day: 6,
        });
        stats.end_day(6);

        // Window of 5 covers days 2..=6: 4×300 + 500 revenue.
        assert_eq!(stats.daily_revenue(), money(340));
        // Day 6 had no payroll.
        assert_eq!(stats.daily_expenses(), money(80));
        assert_eq!(stats.daily_profit(), money(260));
        assert_eq!(stats.total_revenue(), money(2000));
        assert_eq!(stats.total_expenses(), money(500));
        assert_eq!(stats.current_day(), 6);
    }

    #[test]
    fn costs_are_broken_down_by_category() {
        let mut stats = FactoryStats::new(small_config());
        let order = make_order();
        stats.process_event(&Event::Purchase {
            expense: Expense::Resources,
            amount: money(500),
            day: 1,
        });
        stats.process_event(&Event::Purchase {
            expense: Expense::Resources,
            amount: money(250),
            day: 1,
        });
        stats.process_event(&Event::Purchase {
            expense: Expense::Machine,
            amount: money(4000),
            day: 1,
        });
        stats.process_event(&Event::InstallmentsPaid {
            amount: money(366),
            day: 1,
        });
        stats.process_event(&Event::OrderFailed {
            order,
            penalty: money(200),
            day: 1,
        });

        assert_eq!(
            stats.spent_on(CostCategory::Purchase(Expense::Resources)),
            money(750)
        );
        assert_eq!(stats.spent_on(CostCategory::Installments), money(366));
        assert_eq!(stats.spent_on(CostCategory::Penalties), money(200));
        assert_eq!(stats.spent_on(CostCategory::Payroll), Money::ZERO);
        assert_eq!(stats.total_expenses(), money(5316));

        let breakdown = stats.cost_breakdown();
        assert_eq!(
            breakdown[0],
            (CostCategory::Purchase(Expense::Machine), money(4000))
        );
        assert_eq!(breakdown.len(), 4);
    }

    #[test]
    fn loans_are_financing_not_revenue() {
        let mut stats = FactoryStats::new(small_config());
        let loan = {
            let mut sm = SlotMap::<shopfloor_core::id::LoanId, ()>::with_key();
            sm.insert(())
        };
        stats.process_event(&Event::LoanTaken {
            loan,
            amount: money(10_000),
            day: 1,
        });
        stats.process_event(&Event::LoanRepaid { loan, day: 31 });
        assert_eq!(stats.total_revenue(), Money::ZERO);
        assert_eq!(stats.total_borrowed(), money(10_000));
        assert_eq!(stats.loans_repaid(), 1);
    }

    #[test]
    fn day_ended_closes_the_day_and_records_cash() {
        let mut stats = FactoryStats::new(small_config());
        stats.process_event(&Event::PayrollPaid {
            amount: money(150),
            day: 1,
        });
        stats.process_event(&Event::DayEnded {
            day: 1,
            cash: money(49_850),
        });
        stats.process_event(&Event::DayEnded {
            day: 2,
            cash: money(49_850),
        });

        assert_eq!(stats.current_day(), 2);
        assert_eq!(stats.cash_history(), vec![money(49_850), money(49_850)]);
        assert_eq!(stats.expense_history(), vec![money(150), Money::ZERO]);
        assert_eq!(stats.profit_history(), vec![money(-150), Money::ZERO]);
        assert_eq!(stats.daily_expenses(), money(75));
    }

    #[test]
    fn history_is_bounded() {
        let mut stats = FactoryStats::new(small_config());
        for day in 1..=20 {
            stats.process_event(&Event::ProductSold {
                product: ProductKind::Tablet,
                units: 1,
                revenue: money(day as i32),
                day,
            });
            stats.end_day(day);
        }
        let history = stats.revenue_history();
        assert_eq!(history.len(), 8);
        assert_eq!(history[0], money(13));
        assert_eq!(history[7], money(20));
    }

    // -----------------------------------------------------------------------
    // Production
    // -----------------------------------------------------------------------

    #[test]
    fn machine_output_counts_handoffs_and_completions() {
        let mut stats = FactoryStats::new(small_config());
        let m = make_machines(3);

        for day in 1..=4 {
            stats.process_event(&Event::UnitHandedOff {
                from: m[0],
                to: m[1],
                product: ProductKind::Laptop,
                day,
            });
            stats.process_event(&produced(m[2], ProductKind::Laptop, day));
            stats.end_day(day);
        }

        assert_fixed_approx(stats.machine_output_rate(m[0]), 1.0, 0.001);
        assert_fixed_approx(stats.machine_output_rate(m[2]), 1.0, 0.001);
        assert_eq!(stats.machine_output_rate(m[1]), Fixed64::ZERO);
        assert_eq!(stats.machine_lifetime_output(m[0]), 4);
        assert_fixed_approx(stats.production_rate(ProductKind::Laptop), 1.0, 0.001);
        assert_eq!(stats.production_rate(ProductKind::Phone), Fixed64::ZERO);
        assert_eq!(stats.tracked_machine_count(), 2);
    }

    #[test]
    fn defect_rate_per_machine_and_overall() {
        let mut stats = FactoryStats::new(small_config());
        let m = make_machines(2);

        for _ in 0..3 {
            stats.process_event(&produced(m[0], ProductKind::Phone, 1));
        }
        stats.process_event(&Event::UnitDefective {
            machine: m[0],
            product: ProductKind::Phone,
            day: 1,
        });
        stats.process_event(&Event::UnitDefective {
            machine: m[1],
            product: ProductKind::Phone,
            day: 1,
        });
        stats.process_event(&Event::UnitDiscarded {
            machine: m[1],
            product: ProductKind::Phone,
            day: 1,
        });
        stats.end_day(1);

        assert_fixed_approx(stats.machine_defect_rate(m[0]), 0.25, 0.001);
        assert_fixed_approx(stats.machine_defect_rate(m[1]), 1.0, 0.001);
        assert_fixed_approx(stats.defect_rate(), 0.4, 0.001);
        assert_fixed_approx(stats.discard_rate(), 1.0, 0.001);
    }

    #[test]
    fn output_history_per_product() {
        let mut stats = FactoryStats::new(small_config());
        let m = make_machines(1);
        stats.process_event(&produced(m[0], ProductKind::Tablet, 1));
        stats.process_event(&produced(m[0], ProductKind::Tablet, 1));
        stats.end_day(1);
        stats.end_day(2);
        stats.process_event(&produced(m[0], ProductKind::Tablet, 3));
        stats.end_day(3);

        assert_eq!(
            stats.output_history(ProductKind::Tablet),
            vec![Fixed64::from_num(2), Fixed64::ZERO, Fixed64::from_num(1)]
        );
        assert!(stats.output_history(ProductKind::Laptop).is_empty());
    }

    #[test]
    fn deliveries_include_shipments_and_sales() {
        let mut stats = FactoryStats::new(small_config());
        let order = make_order();
        stats.process_event(&Event::UnitsShipped {
            order,
            product: ProductKind::Phone,
            units: 3,
            day: 1,
        });
        stats.process_event(&Event::ProductSold {
            product: ProductKind::Phone,
            units: 1,
            revenue: money(300),
            day: 1,
        });
        stats.end_day(1);

        assert_eq!(stats.delivery_rate(ProductKind::Phone), Fixed64::from_num(4));
        assert_eq!(stats.sales_revenue_rate(ProductKind::Phone), money(300));
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    #[test]
    fn order_success_rate() {
        let mut stats = FactoryStats::new(small_config());
        assert_eq!(stats.order_success_rate(), Fixed64::ZERO);

        let order = make_order();
        for _ in 0..3 {
            stats.process_event(&Event::OrderCompleted {
                order,
                reward: money(100),
                day: 1,
            });
        }
        stats.process_event(&Event::OrderFailed {
            order,
            penalty: money(50),
            day: 1,
        });
        stats.process_event(&Event::OrderExpired { order, day: 1 });
        stats.process_event(&Event::ComplaintOpened { order, day: 1 });
        stats.process_event(&Event::OrderSpawned {
            order,
            product: ProductKind::Phone,
            quantity: 2,
            day: 1,
        });
        stats.end_day(1);

        assert_fixed_approx(stats.order_success_rate(), 0.75, 0.001);
        assert_eq!(stats.orders_completed(), Fixed64::from_num(3));
        assert_eq!(stats.orders_failed(), Fixed64::from_num(1));
        assert_eq!(stats.orders_expired(), Fixed64::from_num(1));
        assert_eq!(stats.orders_spawned(), Fixed64::from_num(1));
        assert_eq!(stats.complaints(), Fixed64::from_num(1));
    }

    #[test]
    fn bankruptcy_day_is_recorded_once() {
        let mut stats = FactoryStats::new(small_config());
        stats.process_event(&Event::Bankrupt {
            cash: money(-20_000),
            day: 40,
        });
        stats.process_event(&Event::Bankrupt {
            cash: money(-30_000),
            day: 41,
        });
        assert_eq!(stats.bankrupt_on(), Some(40));
    }

    // -----------------------------------------------------------------------
    // Utility
    // -----------------------------------------------------------------------

    #[test]
    fn remove_machine_and_clear() {
        let mut stats = FactoryStats::new(small_config());
        let m = make_machines(2);
        stats.process_event(&produced(m[0], ProductKind::Phone, 1));
        stats.process_event(&produced(m[1], ProductKind::Phone, 1));
        stats.process_event(&Event::PayrollPaid {
            amount: money(100),
            day: 1,
        });
        stats.end_day(1);

        stats.remove_machine(m[0]);
        assert_eq!(stats.tracked_machine_count(), 1);
        assert_eq!(stats.machine_output_rate(m[0]), Fixed64::ZERO);

        stats.clear();
        assert_eq!(stats.tracked_machine_count(), 0);
        assert_eq!(stats.tracked_product_count(), 0);
        assert_eq!(stats.total_expenses(), Money::ZERO);
        assert_eq!(stats.current_day(), 0);
        assert_eq!(stats.config().window_days, 5);
    }

    #[test]
    fn untracked_events_are_ignored() {
        let mut stats = FactoryStats::new(small_config());
        let m = make_machines(1);
        stats.process_event(&Event::UnitStarted {
            machine: m[0],
            product: ProductKind::Phone,
            day: 1,
        });
        assert_eq!(stats.tracked_machine_count(), 0);
        assert!(!FactoryStats::TRACKED_KINDS.contains(&EventKind::UnitStarted));
    }
}
