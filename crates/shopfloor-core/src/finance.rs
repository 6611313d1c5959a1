//! Cash balance, loans and payroll.
//!
//! Loans amortize in equal daily installments. The final installment pays
//! whatever remains, so the sum of installments equals `total_to_pay`
//! exactly even though the daily amount is rounded to fixed-point.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::error::{ensure_funds, CommandError};
use crate::fixed::{from_units, Day, Fixed64, Money};
use crate::id::LoanId;

/// An outstanding loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub principal: Money,
    pub annual_rate: Fixed64,
    pub duration_days: u32,
    pub remaining_days: u32,
    pub daily_payment: Money,
    pub total_paid: Money,
    pub total_to_pay: Money,
    pub taken_on: Day,
}

impl Loan {
    /// Interest portion of the loan.
    pub fn total_interest(&self) -> Money {
        self.total_to_pay - self.principal
    }

    /// Amount still owed.
    pub fn outstanding(&self) -> Money {
        self.total_to_pay - self.total_paid
    }
}

/// Terms a lender offers. The presets mirror the stock campaign's bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub amount: Money,
    pub days: u32,
    pub annual_rate: Fixed64,
}

impl LoanTerms {
    pub fn presets() -> [LoanTerms; 3] {
        [
            LoanTerms {
                amount: Money::from_num(10_000),
                days: 30,
                annual_rate: Fixed64::from_num(0.10),
            },
            LoanTerms {
                amount: Money::from_num(25_000),
                days: 60,
                annual_rate: Fixed64::from_num(0.08),
            },
            LoanTerms {
                amount: Money::from_num(50_000),
                days: 90,
                annual_rate: Fixed64::from_num(0.06),
            },
        ]
    }
}

/// What happened to loans during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanTickOutcome {
    /// Sum of installments debited this tick.
    pub paid: Money,
    /// Loans that reached zero remaining days and were removed.
    pub repaid: Vec<(LoanId, Loan)>,
}

/// Cash and credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceLedger {
    cash: Money,
    loans: SlotMap<LoanId, Loan>,
    total_earned: Money,
    total_spent: Money,
}

impl FinanceLedger {
    pub fn new(cash: Money) -> Self {
        Self {
            cash,
            loans: SlotMap::with_key(),
            total_earned: Money::ZERO,
            total_spent: Money::ZERO,
        }
    }

    pub fn cash(&self) -> Money {
        self.cash
    }

    pub fn total_earned(&self) -> Money {
        self.total_earned
    }

    pub fn total_spent(&self) -> Money {
        self.total_spent
    }

    pub fn loans(&self) -> impl Iterator<Item = (LoanId, &Loan)> {
        self.loans.iter()
    }

    pub fn loan(&self, id: LoanId) -> Option<&Loan> {
        self.loans.get(id)
    }

    pub fn active_loan_count(&self) -> usize {
        self.loans.len()
    }

    /// Sum of what is still owed across all loans.
    pub fn debt(&self) -> Money {
        self.loans.values().map(Loan::outstanding).sum()
    }

    /// Fail unless the balance covers `cost`. Does not debit.
    pub fn ensure(&self, cost: Money) -> Result<(), CommandError> {
        ensure_funds(self.cash, cost)
    }

    /// Debit a discretionary purchase. Never drives cash below zero.
    pub fn spend(&mut self, cost: Money) -> Result<(), CommandError> {
        self.ensure(cost)?;
        self.cash -= cost;
        self.total_spent = self.total_spent.saturating_add(cost);
        Ok(())
    }

    /// Debit an obligation (payroll, installments, penalties). May go negative.
    pub fn charge(&mut self, amount: Money) {
        self.cash = self.cash.saturating_sub(amount);
        self.total_spent = self.total_spent.saturating_add(amount);
    }

    /// Credit revenue.
    pub fn earn(&mut self, amount: Money) {
        self.cash = self.cash.saturating_add(amount);
        self.total_earned = self.total_earned.saturating_add(amount);
    }

    /// Originate a loan and credit the principal immediately.
    pub fn take_loan(
        &mut self,
        terms: LoanTerms,
        today: Day,
        max_active: u32,
        days_per_year: u32,
    ) -> Result<LoanId, CommandError> {
        if terms.amount <= Money::ZERO {
            return Err(CommandError::Malformed("loan amount must be positive"));
        }
        if terms.days == 0 {
            return Err(CommandError::Malformed("loan duration must be at least one day"));
        }
        if terms.annual_rate < Fixed64::ZERO {
            return Err(CommandError::Malformed("loan rate must not be negative"));
        }
        if self.loans.len() as u32 >= max_active {
            return Err(CommandError::LoanLimitReached { max: max_active });
        }

        let total_interest = terms
            .amount
            .checked_mul(terms.annual_rate)
            .and_then(|v| v.checked_mul(from_units(terms.days)))
            .and_then(|v| v.checked_div(from_units(days_per_year)))
            .ok_or(CommandError::Malformed("loan terms overflow"))?;
        let total_to_pay = terms
            .amount
            .checked_add(total_interest)
            .ok_or(CommandError::Malformed("loan terms overflow"))?;
        let daily_payment = total_to_pay / from_units(terms.days);
        let cash = self
            .cash
            .checked_add(terms.amount)
            .ok_or(CommandError::Malformed("loan terms overflow"))?;

        let id = self.loans.insert(Loan {
            principal: terms.amount,
            annual_rate: terms.annual_rate,
            duration_days: terms.days,
            remaining_days: terms.days,
            daily_payment,
            total_paid: Money::ZERO,
            total_to_pay,
            taken_on: today,
        });
        self.cash = cash;
        Ok(id)
    }

    /// Collect one installment from every loan and retire finished ones.
    pub fn tick_loans(&mut self) -> LoanTickOutcome {
        let mut outcome = LoanTickOutcome::default();
        let mut finished = Vec::new();

        for (id, loan) in self.loans.iter_mut() {
            let installment = if loan.remaining_days <= 1 {
                loan.outstanding()
            } else {
                loan.daily_payment
            };
            loan.total_paid += installment;
            loan.remaining_days = loan.remaining_days.saturating_sub(1);
            outcome.paid += installment;
            if loan.remaining_days == 0 {
                finished.push(id);
            }
        }

        self.charge(outcome.paid);
        for id in finished {
            if let Some(loan) = self.loans.remove(id) {
                outcome.repaid.push((id, loan));
            }
        }
        outcome
    }
}
