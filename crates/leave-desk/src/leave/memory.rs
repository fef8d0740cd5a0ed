use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    CalendarId, Department, DepartmentId, Employee, EmployeeId, EntitlementLedger,
    HolidayCalendar, LeaveRequest, RequestId, RequestState,
};
use super::repository::{
    Directory, DirectoryAdmin, EntitlementStore, HolidayCalendarStore, InsertConditions,
    LeaveRequestStore, Notification, Notifier, NotifyError, RepositoryError, RequestQuery,
    UsageGuard, UsageSnapshot,
};
use crate::sync::HrSyncTarget;

type UsageKey = (EmployeeId, i32);

#[derive(Debug, Default)]
struct StoreState {
    employees: HashMap<EmployeeId, Employee>,
    departments: HashMap<DepartmentId, Department>,
    ledgers: HashMap<UsageKey, EntitlementLedger>,
    calendars: HashMap<CalendarId, HolidayCalendar>,
    requests: HashMap<RequestId, LeaveRequest>,
    generations: HashMap<UsageKey, u64>,
}

impl StoreState {
    fn generation(&self, employee: &EmployeeId, year: i32) -> u64 {
        self.generations
            .get(&(employee.clone(), year))
            .copied()
            .unwrap_or(0)
    }

    fn check_guards(&self, guards: &[UsageGuard]) -> Result<(), RepositoryError> {
        let stale = guards
            .iter()
            .any(|guard| self.generation(&guard.employee_id, guard.year) != guard.generation);
        if stale {
            return Err(RepositoryError::Conflict);
        }
        Ok(())
    }

    fn bump_usage(&mut self, request: &LeaveRequest) {
        for year in request.allocation.keys() {
            self.bump_generation(&request.requester, *year);
        }
    }

    fn bump_generation(&mut self, employee: &EmployeeId, year: i32) {
        *self
            .generations
            .entry((employee.clone(), year))
            .or_insert(0) += 1;
    }

    fn first_overlap(&self, request: &LeaveRequest) -> Option<RequestId> {
        self.requests
            .values()
            .filter(|existing| existing.requester == request.requester)
            .filter(|existing| {
                matches!(existing.state, RequestState::Pending | RequestState::Approved)
            })
            .filter(|existing| existing.overlaps(request.start_date, request.end_date))
            .map(|existing| existing.id.clone())
            .min()
    }
}

/// Process-local store backing the HTTP service, the demo, and tests. Every
/// check-then-write runs under one lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLeaveStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLeaveStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn request_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.requests.len())
    }
}

impl Directory for InMemoryLeaveStore {
    fn get_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        Ok(self.lock()?.employees.get(id).cloned())
    }

    fn list_by_supervisor(
        &self,
        supervisor: &EmployeeId,
    ) -> Result<Vec<Employee>, RepositoryError> {
        let state = self.lock()?;
        let mut reports: Vec<Employee> = state
            .employees
            .values()
            .filter(|employee| employee.supervisor.as_ref() == Some(supervisor))
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(reports)
    }

    fn list_by_department(
        &self,
        department: &DepartmentId,
    ) -> Result<Vec<Employee>, RepositoryError> {
        let state = self.lock()?;
        let mut members: Vec<Employee> = state
            .employees
            .values()
            .filter(|employee| employee.department.as_ref() == Some(department))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        let wanted = email.trim();
        Ok(self
            .lock()?
            .employees
            .values()
            .find(|employee| employee.email.trim().eq_ignore_ascii_case(wanted))
            .cloned())
    }

    fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        let mut employees: Vec<Employee> = self.lock()?.employees.values().cloned().collect();
        employees.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(employees)
    }

    fn get_department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        Ok(self.lock()?.departments.get(id).cloned())
    }

    fn list_departments(&self) -> Result<Vec<Department>, RepositoryError> {
        let mut departments: Vec<Department> =
            self.lock()?.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(departments)
    }
}

impl EntitlementStore for InMemoryLeaveStore {
    fn get_ledger(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<Option<EntitlementLedger>, RepositoryError> {
        Ok(self.lock()?.ledgers.get(&(employee.clone(), year)).cloned())
    }
}

impl HolidayCalendarStore for InMemoryLeaveStore {
    fn get_calendar(&self, id: &CalendarId) -> Result<Option<HolidayCalendar>, RepositoryError> {
        Ok(self.lock()?.calendars.get(id).cloned())
    }
}

impl LeaveRequestStore for InMemoryLeaveStore {
    fn insert(
        &self,
        mut request: LeaveRequest,
        conditions: &InsertConditions,
    ) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.lock()?;
        if state.requests.contains_key(&request.id) {
            return Err(RepositoryError::Duplicate);
        }
        if conditions.exclusive_dates {
            if let Some(existing) = state.first_overlap(&request) {
                return Err(RepositoryError::Overlap(existing));
            }
        }
        state.check_guards(&conditions.usage)?;

        request.revision = 1;
        if request.counts_as_usage() {
            state.bump_usage(&request);
        }
        state.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    fn update(
        &self,
        mut request: LeaveRequest,
        guards: &[UsageGuard],
    ) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.lock()?;
        let current = state
            .requests
            .get(&request.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.revision != request.revision || current.state.is_terminal() {
            return Err(RepositoryError::Conflict);
        }
        let usage_changed = current.counts_as_usage() != request.counts_as_usage();
        state.check_guards(guards)?;

        request.revision += 1;
        if usage_changed {
            state.bump_usage(&request);
        }
        state.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn query(&self, query: &RequestQuery) -> Result<Vec<LeaveRequest>, RepositoryError> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|request| query.matches(request))
            .cloned()
            .collect())
    }

    fn approved_usage(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<UsageSnapshot, RepositoryError> {
        let state = self.lock()?;
        let days = state
            .requests
            .values()
            .filter(|request| &request.requester == employee && request.counts_as_usage())
            .map(|request| request.days_in_year(year))
            .sum();
        Ok(UsageSnapshot {
            days,
            generation: state.generation(employee, year),
        })
    }
}

impl DirectoryAdmin for InMemoryLeaveStore {
    fn insert_department(&self, department: Department) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let taken = state.departments.values().any(|existing| {
            existing.id == department.id
                || existing.name.trim().eq_ignore_ascii_case(department.name.trim())
        });
        if taken {
            return Err(RepositoryError::Duplicate);
        }
        state.departments.insert(department.id.clone(), department);
        Ok(())
    }

    fn upsert_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.lock()?
            .departments
            .insert(department.id.clone(), department);
        Ok(())
    }

    fn remove_department(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.departments.contains_key(id) {
            return Err(RepositoryError::NotFound);
        }
        let staffed = state
            .employees
            .values()
            .any(|employee| employee.department.as_ref() == Some(id));
        if staffed {
            return Err(RepositoryError::Conflict);
        }
        state.departments.remove(id);
        Ok(())
    }

    fn upsert_employee(&self, employee: Employee) -> Result<(), RepositoryError> {
        self.lock()?.employees.insert(employee.id.clone(), employee);
        Ok(())
    }

    fn upsert_ledger(&self, ledger: EntitlementLedger) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let key = (ledger.employee_id.clone(), ledger.year);
        let total_changed = state
            .ledgers
            .get(&key)
            .map_or(true, |current| current.total_days != ledger.total_days);
        if total_changed {
            state.bump_generation(&ledger.employee_id, ledger.year);
        }
        state.ledgers.insert(key, ledger);
        Ok(())
    }
}

impl HrSyncTarget for InMemoryLeaveStore {
    fn upsert_calendar(&self, calendar: HolidayCalendar) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.calendars.entry(calendar.id.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge_years(calendar),
            Entry::Vacant(slot) => {
                slot.insert(calendar);
            }
        }
        Ok(())
    }
}

/// Notification inbox kept in memory, newest last.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifier {
    inbox: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    /// Notifications addressed to `recipient`, newest first.
    pub fn inbox(&self, recipient: &EmployeeId) -> Result<Vec<Notification>, NotifyError> {
        let inbox = self
            .inbox
            .lock()
            .map_err(|_| NotifyError::Transport("inbox mutex poisoned".to_string()))?;
        Ok(inbox
            .iter()
            .rev()
            .filter(|notification| &notification.recipient == recipient)
            .cloned()
            .collect())
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.inbox
            .lock()
            .map_err(|_| NotifyError::Transport("inbox mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
