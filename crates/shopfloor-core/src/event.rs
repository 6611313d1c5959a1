//! Typed engine events with per-kind ring buffers.
//!
//! Every accepted command and every tick records what happened as [`Event`]s.
//! Events are buffered per [`EventKind`] and handed to passive listeners when
//! [`EventBus::deliver`] runs at the end of each command, after which the
//! buffers are cleared. Kinds can be suppressed, in which case they are never
//! buffered.

use crate::fixed::{Day, Money};
use crate::id::{LoanId, MachineId, OrderId, ProductKind, WorkerId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What a discretionary purchase paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expense {
    Resources,
    Machine,
    Upgrade,
    Booster,
    Repair,
    Rework,
    Hiring,
    Motivation,
    Training,
    Unlock,
}

/// An engine event. All events carry the day on which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    UnitStarted {
        machine: MachineId,
        product: ProductKind,
        day: Day,
    },
    UnitHandedOff {
        from: MachineId,
        to: MachineId,
        product: ProductKind,
        day: Day,
    },
    UnitProduced {
        machine: MachineId,
        product: ProductKind,
        day: Day,
    },
    UnitDefective {
        machine: MachineId,
        product: ProductKind,
        day: Day,
    },
    UnitDiscarded {
        machine: MachineId,
        product: ProductKind,
        day: Day,
    },

    // -- Orders and sales --
    OrderSpawned {
        order: OrderId,
        product: ProductKind,
        quantity: u32,
        day: Day,
    },
    UnitsShipped {
        order: OrderId,
        product: ProductKind,
        units: u32,
        day: Day,
    },
    OrderCompleted {
        order: OrderId,
        reward: Money,
        day: Day,
    },
    OrderFailed {
        order: OrderId,
        penalty: Money,
        day: Day,
    },
    OrderExpired {
        order: OrderId,
        day: Day,
    },
    ComplaintOpened {
        order: OrderId,
        day: Day,
    },
    ProductSold {
        product: ProductKind,
        units: u32,
        revenue: Money,
        day: Day,
    },

    // -- Money --
    Purchase {
        expense: Expense,
        amount: Money,
        day: Day,
    },
    LoanTaken {
        loan: LoanId,
        amount: Money,
        day: Day,
    },
    LoanRepaid {
        loan: LoanId,
        day: Day,
    },
    InstallmentsPaid {
        amount: Money,
        day: Day,
    },
    PayrollPaid {
        amount: Money,
        day: Day,
    },
    Bankrupt {
        cash: Money,
        day: Day,
    },

    // -- Workforce --
    WorkerHired {
        worker: WorkerId,
        day: Day,
    },
    CandidateArrived {
        worker: WorkerId,
        day: Day,
    },

    // -- Clock --
    DayEnded {
        day: Day,
        cash: Money,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UnitStarted,
    UnitHandedOff,
    UnitProduced,
    UnitDefective,
    UnitDiscarded,
    OrderSpawned,
    UnitsShipped,
    OrderCompleted,
    OrderFailed,
    OrderExpired,
    ComplaintOpened,
    ProductSold,
    Purchase,
    LoanTaken,
    LoanRepaid,
    InstallmentsPaid,
    PayrollPaid,
    Bankrupt,
    WorkerHired,
    CandidateArrived,
    DayEnded,
}

const EVENT_KIND_COUNT: usize = 21;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::UnitStarted { .. } => EventKind::UnitStarted,
            Event::UnitHandedOff { .. } => EventKind::UnitHandedOff,
            Event::UnitProduced { .. } => EventKind::UnitProduced,
            Event::UnitDefective { .. } => EventKind::UnitDefective,
            Event::UnitDiscarded { .. } => EventKind::UnitDiscarded,
            Event::OrderSpawned { .. } => EventKind::OrderSpawned,
            Event::UnitsShipped { .. } => EventKind::UnitsShipped,
            Event::OrderCompleted { .. } => EventKind::OrderCompleted,
            Event::OrderFailed { .. } => EventKind::OrderFailed,
            Event::OrderExpired { .. } => EventKind::OrderExpired,
            Event::ComplaintOpened { .. } => EventKind::ComplaintOpened,
            Event::ProductSold { .. } => EventKind::ProductSold,
            Event::Purchase { .. } => EventKind::Purchase,
            Event::LoanTaken { .. } => EventKind::LoanTaken,
            Event::LoanRepaid { .. } => EventKind::LoanRepaid,
            Event::InstallmentsPaid { .. } => EventKind::InstallmentsPaid,
            Event::PayrollPaid { .. } => EventKind::PayrollPaid,
            Event::Bankrupt { .. } => EventKind::Bankrupt,
            Event::WorkerHired { .. } => EventKind::WorkerHired,
            Event::CandidateArrived { .. } => EventKind::CandidateArrived,
            Event::DayEnded { .. } => EventKind::DayEnded,
        }
    }

    /// Day the event happened.
    pub fn day(&self) -> Day {
        match *self {
            Event::UnitStarted { day, .. }
            | Event::UnitHandedOff { day, .. }
            | Event::UnitProduced { day, .. }
            | Event::UnitDefective { day, .. }
            | Event::UnitDiscarded { day, .. }
            | Event::OrderSpawned { day, .. }
            | Event::UnitsShipped { day, .. }
            | Event::OrderCompleted { day, .. }
            | Event::OrderFailed { day, .. }
            | Event::OrderExpired { day, .. }
            | Event::ComplaintOpened { day, .. }
            | Event::ProductSold { day, .. }
            | Event::Purchase { day, .. }
            | Event::LoanTaken { day, .. }
            | Event::LoanRepaid { day, .. }
            | Event::InstallmentsPaid { day, .. }
            | Event::PayrollPaid { day, .. }
            | Event::Bankrupt { day, .. }
            | Event::WorkerHired { day, .. }
            | Event::CandidateArrived { day, .. }
            | Event::DayEnded { day, .. } => day,
        }
    }
}

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::UnitStarted,
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
        EventKind::WorkerHired,
        EventKind::CandidateArrived,
        EventKind::DayEnded,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer. When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position, which is also the oldest entry once full.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Events written since creation, including dropped ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let capacity = self.capacity();
        let start = if self.len < capacity { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A read-only event consumer.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that narrows which events a listener sees.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct Subscriber {
    listener: PassiveListener,
    filter: Option<EventFilter>,
}

/// One ring buffer per event kind, listeners, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<Subscriber>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            default_capacity,
        }
    }

    /// Stop recording a kind. Its buffer is freed.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event unless its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, None, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.subscribers[kind.index()].push(Subscriber { listener, filter });
    }

    /// Hand every buffered event to its listeners, in registration order,
    /// then clear the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for subscriber in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(filter) = &subscriber.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (subscriber.listener)(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()].as_ref().map_or(0, EventBuffer::len)
    }

    /// Events ever recorded for a kind, including delivered and dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::total_written)
    }

    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
