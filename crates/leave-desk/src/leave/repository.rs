use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CalendarId, Department, DepartmentId, Employee, EmployeeId, EntitlementLedger,
    HolidayCalendar, LeaveCategory, LeaveRequest, RequestId, RequestState,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("record changed since it was read")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("dates overlap request {0}")]
    Overlap(RequestId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Employees, departments, and reporting lines.
pub trait Directory: Send + Sync {
    fn get_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError>;
    fn list_by_supervisor(&self, supervisor: &EmployeeId)
        -> Result<Vec<Employee>, RepositoryError>;
    fn list_by_department(&self, department: &DepartmentId)
        -> Result<Vec<Employee>, RepositoryError>;
    /// Lookup by e-mail, ignoring case and surrounding whitespace.
    fn find_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError>;
    fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError>;
    fn get_department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError>;
    fn list_departments(&self) -> Result<Vec<Department>, RepositoryError>;
}

/// Administrative writes to the directory and the ledgers, shared by HR and
/// administrator actions and the HR sync job.
pub trait DirectoryAdmin: Directory + EntitlementStore {
    /// Fails with `Duplicate` when the id or the name is already taken.
    fn insert_department(&self, department: Department) -> Result<(), RepositoryError>;
    fn upsert_department(&self, department: Department) -> Result<(), RepositoryError>;
    /// Fails with `NotFound` for an unknown id and with `Conflict` while any
    /// employee still belongs to the department.
    fn remove_department(&self, id: &DepartmentId) -> Result<(), RepositoryError>;
    fn upsert_employee(&self, employee: Employee) -> Result<(), RepositoryError>;
    /// Changing `total_days` moves the usage generation of that employee and
    /// year, so approvals validated against the old total conflict.
    fn upsert_ledger(&self, ledger: EntitlementLedger) -> Result<(), RepositoryError>;
}

/// Read side of the annual entitlements.
pub trait EntitlementStore: Send + Sync {
    fn get_ledger(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<Option<EntitlementLedger>, RepositoryError>;
}

pub trait HolidayCalendarStore: Send + Sync {
    fn get_calendar(&self, id: &CalendarId) -> Result<Option<HolidayCalendar>, RepositoryError>;

    fn is_holiday(&self, date: NaiveDate, calendar: &CalendarId) -> Result<bool, RepositoryError> {
        Ok(self
            .get_calendar(calendar)?
            .is_some_and(|calendar| calendar.contains(date)))
    }
}

/// Approved vacation days for one employee and year, with the generation the
/// store assigned to that usage. The generation changes whenever an approval
/// alters the sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageSnapshot {
    pub days: u32,
    pub generation: u64,
}

/// Write precondition: the usage generation the caller validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageGuard {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub generation: u64,
}

/// Preconditions `insert` verifies under the same lock as the write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertConditions {
    pub usage: Vec<UsageGuard>,
    /// Refuse with `Overlap` when the requester already holds a pending or
    /// approved request intersecting the new one.
    pub exclusive_dates: bool,
}

/// Predicate over stored requests. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub requesters: Option<Vec<EmployeeId>>,
    pub states: Vec<RequestState>,
    pub category: Option<LeaveCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RequestQuery {
    pub fn for_requester(requester: &EmployeeId) -> Self {
        Self {
            requesters: Some(vec![requester.clone()]),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &LeaveRequest) -> bool {
        if let Some(requesters) = &self.requesters {
            if !requesters.contains(&request.requester) {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&request.state) {
            return false;
        }
        if self.category.is_some_and(|category| category != request.category) {
            return false;
        }
        if self.from.is_some_and(|from| request.end_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| request.start_date > to) {
            return false;
        }
        true
    }
}

/// Leave request persistence with optimistic concurrency.
pub trait LeaveRequestStore: Send + Sync {
    /// Insert a new record after verifying every condition still holds.
    fn insert(
        &self,
        request: LeaveRequest,
        conditions: &InsertConditions,
    ) -> Result<LeaveRequest, RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<LeaveRequest>, RepositoryError>;
    /// Compare-and-swap on `request.revision` plus every guard; returns the
    /// stored record with its new revision.
    fn update(
        &self,
        request: LeaveRequest,
        guards: &[UsageGuard],
    ) -> Result<LeaveRequest, RepositoryError>;
    fn query(&self, query: &RequestQuery) -> Result<Vec<LeaveRequest>, RepositoryError>;
    fn approved_usage(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<UsageSnapshot, RepositoryError>;
}

/// Everything the lifecycle manager reads from or writes to.
pub trait LeaveStore:
    Directory + DirectoryAdmin + EntitlementStore + HolidayCalendarStore + LeaveRequestStore
{
}

impl<T> LeaveStore for T where
    T: Directory + DirectoryAdmin + EntitlementStore + HolidayCalendarStore + LeaveRequestStore
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestCreated,
    RequestDecided,
    RequestCancelled,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RequestCreated => "request_created",
            Self::RequestDecided => "request_decided",
            Self::RequestCancelled => "request_cancelled",
        }
    }
}

/// Lifecycle event addressed to one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: EmployeeId,
    pub kind: NotificationKind,
    pub request_id: RequestId,
    pub message: String,
    pub details: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Outbound notification hook (inbox, e-mail, push).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
