//! Leave request lifecycle and entitlement ledger.
//!
//! Requests start `pending` and move once to `approved`, `rejected`, or
//! `cancelled`. Vacation usage is never stored as a counter: it is the sum of
//! approved vacation requests per calendar year, checked against the ledger at
//! creation and again at approval.

pub mod access;
pub mod calendar;
pub mod clock;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    CalendarId, Department, DepartmentId, Employee, EmployeeId, EntitlementBreakdown,
    EntitlementLedger, HolidayCalendar, LeaveCategory, LeaveRequest, NewLeaveRequest, RequestId,
    RequestState, Role,
};
pub use error::{LeaveError, Missing};
pub use ledger::{EntitlementBalance, Ledger};
pub use memory::{InMemoryLeaveStore, InMemoryNotifier};
pub use repository::{
    Directory, DirectoryAdmin, EntitlementStore, HolidayCalendarStore, InsertConditions,
    LeaveRequestStore, LeaveStore, Notification, NotificationKind, Notifier, NotifyError,
    RepositoryError, RequestQuery, UsageGuard, UsageSnapshot,
};
pub use router::{leave_router, ACTOR_HEADER};
pub use service::{LeaveRequestService, LifecyclePolicy};
pub use views::{
    DepartmentDetail, DepartmentDraft, DepartmentSummary, EntitlementDraft, MemberView,
    NewDepartment, PageRequest, RequestFilter, RequestPage,
};
