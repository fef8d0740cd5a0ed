use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::domain::{EmployeeId, EntitlementBreakdown};
use super::error::{LeaveError, Missing};
use super::repository::{EntitlementStore, LeaveRequestStore, UsageGuard};

/// Entitlement totals for one employee and year, with usage derived from
/// approved vacation requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementBalance {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub total_days: u32,
    pub used_days: u32,
    /// Negative after a downward adjustment of `total_days`.
    pub available_days: i64,
    pub breakdown: Option<EntitlementBreakdown>,
    #[serde(skip)]
    pub generation: u64,
}

impl EntitlementBalance {
    pub fn covers(&self, requested: u32) -> bool {
        i64::from(requested) <= self.available_days
    }

    pub fn guard(&self) -> UsageGuard {
        UsageGuard {
            employee_id: self.employee_id.clone(),
            year: self.year,
            generation: self.generation,
        }
    }
}

/// Read-only view over entitlements and approved usage.
pub struct Ledger<S> {
    store: Arc<S>,
}

impl<S> Ledger<S>
where
    S: EntitlementStore + LeaveRequestStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn entitlement(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<EntitlementBalance, LeaveError> {
        let ledger = self.store.get_ledger(employee, year)?.ok_or_else(|| {
            LeaveError::NotFound(Missing::Ledger {
                employee: employee.clone(),
                year,
            })
        })?;
        let usage = self.store.approved_usage(employee, year)?;

        Ok(EntitlementBalance {
            employee_id: ledger.employee_id,
            year,
            total_days: ledger.total_days,
            used_days: usage.days,
            available_days: i64::from(ledger.total_days) - i64::from(usage.days),
            breakdown: ledger.breakdown,
            generation: usage.generation,
        })
    }

    /// Verify every year of `allocation` fits the remaining balance. Returns the
    /// usage guards the subsequent write must be conditioned on.
    pub fn check_capacity(
        &self,
        employee: &EmployeeId,
        allocation: &BTreeMap<i32, u32>,
    ) -> Result<Vec<UsageGuard>, LeaveError> {
        let mut guards = Vec::with_capacity(allocation.len());
        for (&year, &requested) in allocation {
            let balance = self.entitlement(employee, year)?;
            if !balance.covers(requested) {
                return Err(LeaveError::InsufficientBalance {
                    year,
                    available: balance.available_days,
                    requested,
                });
            }
            guards.push(balance.guard());
        }
        Ok(guards)
    }
}
