use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::leave::clock::Clock;
use crate::leave::domain::{
    CalendarId, Department, DepartmentId, Employee, EmployeeId, EntitlementLedger,
    HolidayCalendar, LeaveCategory, LeaveRequest, NewLeaveRequest, RequestId, RequestState, Role,
};
use crate::leave::memory::{InMemoryLeaveStore, InMemoryNotifier};
use crate::leave::repository::{
    Directory, DirectoryAdmin, EntitlementStore, HolidayCalendarStore, InsertConditions,
    LeaveRequestStore, Notification, Notifier, NotifyError, RepositoryError, RequestQuery,
    UsageGuard, UsageSnapshot,
};
use crate::leave::service::{LeaveRequestService, LifecyclePolicy};
use crate::sync::HrSyncTarget;

pub(super) type MemoryService = LeaveRequestService<InMemoryLeaveStore, InMemoryNotifier>;

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn id(value: &str) -> EmployeeId {
    EmployeeId(value.to_string())
}

pub(super) fn employee(key: &str, role: Role, supervisor: Option<&str>) -> Employee {
    Employee {
        id: id(key),
        first_name: key.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{key}@example.com"),
        role,
        department: Some(DepartmentId("ENG".to_string())),
        supervisor: supervisor.map(id),
        active: true,
        calendar: None,
    }
}

pub(super) fn vacation(start: NaiveDate, end: NaiveDate) -> NewLeaveRequest {
    NewLeaveRequest {
        start_date: start,
        end_date: end,
        category: LeaveCategory::Vacation,
        comment: None,
    }
}

pub(super) fn leave(category: LeaveCategory, start: NaiveDate, end: NaiveDate) -> NewLeaveRequest {
    NewLeaveRequest {
        category,
        ..vacation(start, end)
    }
}

pub(super) fn ledger(employee: &str, year: i32, total_days: u32) -> EntitlementLedger {
    EntitlementLedger {
        employee_id: id(employee),
        year,
        total_days,
        breakdown: None,
        comment: None,
    }
}

/// Pending vacation request as another writer would have stored it, one
/// working day per calendar day, filed at a fixed instant.
pub(super) fn stored_request(
    key: &str,
    requester: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> LeaveRequest {
    let days = u32::try_from((end - start).num_days() + 1).expect("ordered range");
    LeaveRequest {
        id: RequestId(key.to_string()),
        requester: id(requester),
        requested_at: Utc
            .with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp"),
        start_date: start,
        end_date: end,
        working_days: days,
        allocation: [(start.year(), days)].into_iter().collect(),
        category: LeaveCategory::Vacation,
        comment: None,
        state: RequestState::Pending,
        approver: None,
        decided_at: None,
        decision_comment: None,
        revision: 0,
    }
}

/// Directory used across the suite:
///
/// - `boss` supervises `ana` and `luis`; `other-boss` supervises `eva`.
/// - `hr` and `root` hold the HR and administrator roles.
/// - `ana` follows the `mad` calendar (1 and 2 May 2025 are holidays) and has
///   10 days in 2025 and 2026; `luis` and `eva` have 22 days in 2025.
pub(super) fn seed(store: &InMemoryLeaveStore) {
    store
        .upsert_department(Department {
            id: DepartmentId("ENG".to_string()),
            name: "Engineering".to_string(),
            description: None,
            manager: Some(id("boss")),
            location: Some("Madrid".to_string()),
            active: true,
        })
        .expect("seed department");
    store
        .upsert_department(Department {
            id: DepartmentId("OPS".to_string()),
            name: "Operations".to_string(),
            description: None,
            manager: Some(id("other-boss")),
            location: None,
            active: true,
        })
        .expect("seed department");

    let mut ana = employee("ana", Role::IndividualContributor, Some("boss"));
    ana.calendar = Some(CalendarId("mad".to_string()));
    let mut eva = employee("eva", Role::IndividualContributor, Some("other-boss"));
    eva.department = Some(DepartmentId("OPS".to_string()));
    let mut other_boss = employee("other-boss", Role::Supervisor, None);
    other_boss.department = Some(DepartmentId("OPS".to_string()));

    for member in [
        employee("boss", Role::Supervisor, None),
        ana,
        employee("luis", Role::IndividualContributor, Some("boss")),
        other_boss,
        eva,
        employee("hr", Role::Hr, None),
        employee("root", Role::Administrator, None),
    ] {
        store.upsert_employee(member).expect("seed employee");
    }

    for entry in [
        ledger("ana", 2025, 10),
        ledger("ana", 2026, 10),
        ledger("luis", 2025, 22),
        ledger("eva", 2025, 22),
    ] {
        store.upsert_ledger(entry).expect("seed ledger");
    }

    store
        .upsert_calendar(HolidayCalendar {
            id: CalendarId("mad".to_string()),
            name: "Madrid".to_string(),
            holidays: [date(2025, 5, 1), date(2025, 5, 2)].into_iter().collect(),
        })
        .expect("seed calendar");
}

/// Clock that advances one minute per reading so request timestamps are
/// strictly increasing.
pub(super) struct SteppingClock {
    base: DateTime<Utc>,
    ticks: AtomicI64,
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            base: Utc
                .with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + Duration::minutes(tick)
    }
}

pub(super) fn build_service_with(
    policy: LifecyclePolicy,
) -> (
    MemoryService,
    Arc<InMemoryLeaveStore>,
    Arc<InMemoryNotifier>,
) {
    let store = Arc::new(InMemoryLeaveStore::default());
    seed(&store);
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = LeaveRequestService::with_clock(
        store.clone(),
        notifier.clone(),
        policy,
        Arc::new(SteppingClock::default()),
    );
    (service, store, notifier)
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryLeaveStore>,
    Arc<InMemoryNotifier>,
) {
    build_service_with(LifecyclePolicy::default())
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl Directory for UnavailableStore {
    fn get_employee(&self, _id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        offline()
    }

    fn list_by_supervisor(&self, _: &EmployeeId) -> Result<Vec<Employee>, RepositoryError> {
        offline()
    }

    fn list_by_department(&self, _: &DepartmentId) -> Result<Vec<Employee>, RepositoryError> {
        offline()
    }

    fn find_by_email(&self, _email: &str) -> Result<Option<Employee>, RepositoryError> {
        offline()
    }

    fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        offline()
    }

    fn get_department(&self, _id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        offline()
    }

    fn list_departments(&self) -> Result<Vec<Department>, RepositoryError> {
        offline()
    }
}

impl DirectoryAdmin for UnavailableStore {
    fn insert_department(&self, _department: Department) -> Result<(), RepositoryError> {
        offline()
    }

    fn upsert_department(&self, _department: Department) -> Result<(), RepositoryError> {
        offline()
    }

    fn remove_department(&self, _id: &DepartmentId) -> Result<(), RepositoryError> {
        offline()
    }

    fn upsert_employee(&self, _employee: Employee) -> Result<(), RepositoryError> {
        offline()
    }

    fn upsert_ledger(&self, _ledger: EntitlementLedger) -> Result<(), RepositoryError> {
        offline()
    }
}

impl EntitlementStore for UnavailableStore {
    fn get_ledger(
        &self,
        _employee: &EmployeeId,
        _year: i32,
    ) -> Result<Option<EntitlementLedger>, RepositoryError> {
        offline()
    }
}

impl HolidayCalendarStore for UnavailableStore {
    fn get_calendar(&self, _id: &CalendarId) -> Result<Option<HolidayCalendar>, RepositoryError> {
        offline()
    }
}

impl LeaveRequestStore for UnavailableStore {
    fn insert(
        &self,
        _request: LeaveRequest,
        _conditions: &InsertConditions,
    ) -> Result<LeaveRequest, RepositoryError> {
        offline()
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        offline()
    }

    fn update(
        &self,
        _request: LeaveRequest,
        _guards: &[UsageGuard],
    ) -> Result<LeaveRequest, RepositoryError> {
        offline()
    }

    fn query(&self, _query: &RequestQuery) -> Result<Vec<LeaveRequest>, RepositoryError> {
        offline()
    }

    fn approved_usage(
        &self,
        _employee: &EmployeeId,
        _year: i32,
    ) -> Result<UsageSnapshot, RepositoryError> {
        offline()
    }
}

/// Store that interleaves a concurrent writer: `sneak` is approved right
/// before the first update it receives, `sneak_insert` is stored right before
/// the first insert.
#[derive(Default)]
pub(super) struct RacingStore {
    pub(super) inner: InMemoryLeaveStore,
    pub(super) sneak: Mutex<Option<RequestId>>,
    pub(super) sneak_insert: Mutex<Option<LeaveRequest>>,
}

impl RacingStore {
    fn interleave_insert(&self) -> Result<(), RepositoryError> {
        let sneak = self
            .sneak_insert
            .lock()
            .expect("sneak mutex poisoned")
            .take();
        if let Some(request) = sneak {
            self.inner.insert(request, &InsertConditions::default())?;
        }
        Ok(())
    }

    fn interleave(&self) -> Result<(), RepositoryError> {
        let sneak = self.sneak.lock().expect("sneak mutex poisoned").take();
        if let Some(request_id) = sneak {
            let mut request = self
                .inner
                .fetch(&request_id)?
                .ok_or(RepositoryError::NotFound)?;
            request.state = RequestState::Approved;
            request.approver = Some(id("hr"));
            self.inner.update(request, &[])?;
        }
        Ok(())
    }
}

impl Directory for RacingStore {
    fn get_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.inner.get_employee(id)
    }

    fn list_by_supervisor(&self, id: &EmployeeId) -> Result<Vec<Employee>, RepositoryError> {
        self.inner.list_by_supervisor(id)
    }

    fn list_by_department(&self, id: &DepartmentId) -> Result<Vec<Employee>, RepositoryError> {
        self.inner.list_by_department(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        self.inner.find_by_email(email)
    }

    fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        self.inner.list_employees()
    }

    fn get_department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        self.inner.get_department(id)
    }

    fn list_departments(&self) -> Result<Vec<Department>, RepositoryError> {
        self.inner.list_departments()
    }
}

impl DirectoryAdmin for RacingStore {
    fn insert_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.inner.insert_department(department)
    }

    fn upsert_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.inner.upsert_department(department)
    }

    fn remove_department(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        self.inner.remove_department(id)
    }

    fn upsert_employee(&self, employee: Employee) -> Result<(), RepositoryError> {
        self.inner.upsert_employee(employee)
    }

    fn upsert_ledger(&self, ledger: EntitlementLedger) -> Result<(), RepositoryError> {
        self.inner.upsert_ledger(ledger)
    }
}

impl EntitlementStore for RacingStore {
    fn get_ledger(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<Option<EntitlementLedger>, RepositoryError> {
        self.inner.get_ledger(employee, year)
    }
}

impl HolidayCalendarStore for RacingStore {
    fn get_calendar(&self, id: &CalendarId) -> Result<Option<HolidayCalendar>, RepositoryError> {
        self.inner.get_calendar(id)
    }
}

impl LeaveRequestStore for RacingStore {
    fn insert(
        &self,
        request: LeaveRequest,
        conditions: &InsertConditions,
    ) -> Result<LeaveRequest, RepositoryError> {
        self.interleave_insert()?;
        self.inner.insert(request, conditions)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update(
        &self,
        request: LeaveRequest,
        guards: &[UsageGuard],
    ) -> Result<LeaveRequest, RepositoryError> {
        self.interleave()?;
        self.inner.update(request, guards)
    }

    fn query(&self, query: &RequestQuery) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.inner.query(query)
    }

    fn approved_usage(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<UsageSnapshot, RepositoryError> {
        self.inner.approved_usage(employee, year)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
