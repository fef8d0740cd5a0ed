use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::access::{can_decide, can_view, Visibility};
use super::calendar::count_working_days;
use super::clock::{Clock, SystemClock};
use super::domain::{
    Department, DepartmentId, Employee, EmployeeId, EntitlementLedger, LeaveRequest,
    NewLeaveRequest, RequestId, RequestState, Role,
};
use super::error::{LeaveError, Missing};
use super::ledger::{EntitlementBalance, Ledger};
use super::repository::{
    InsertConditions, LeaveStore, Notification, NotificationKind, Notifier, RepositoryError,
    RequestQuery,
};
use super::views::{
    DepartmentDetail, DepartmentDraft, DepartmentSummary, EntitlementDraft, MemberView,
    NewDepartment, PageRequest, RequestFilter, RequestPage,
};
use crate::config::{LeaveConfig, DEFAULT_MAX_SPAN_DAYS};

/// Preconditions that vary per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Refuse requests intersecting a pending or approved request of the same
    /// requester.
    pub prevent_overlap: bool,
    /// Longest accepted request in calendar days, both ends included.
    pub max_span_days: u32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            prevent_overlap: false,
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
        }
    }
}

impl From<&LeaveConfig> for LifecyclePolicy {
    fn from(config: &LeaveConfig) -> Self {
        Self {
            prevent_overlap: config.prevent_overlap,
            max_span_days: config.max_span_days,
        }
    }
}

/// Request lifecycle manager: validates, persists, and transitions leave
/// requests, then notifies the people involved.
pub struct LeaveRequestService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    ledger: Ledger<S>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("lr-{id:06}"))
}

const ACTIVE_STATES: [RequestState; 2] = [RequestState::Pending, RequestState::Approved];

impl<S, N> LeaveRequestService<S, N>
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: LifecyclePolicy) -> Self {
        Self::with_clock(store, notifier, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        notifier: Arc<N>,
        policy: LifecyclePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = Ledger::new(store.clone());
        Self {
            store,
            notifier,
            ledger,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Validate and persist a new pending request for `requester`.
    pub fn create_request(
        &self,
        requester: &EmployeeId,
        submission: NewLeaveRequest,
    ) -> Result<LeaveRequest, LeaveError> {
        let NewLeaveRequest {
            start_date,
            end_date,
            category,
            comment,
        } = submission;

        if start_date > end_date {
            return Err(LeaveError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        let span_days = (end_date - start_date).num_days() + 1;
        if span_days > i64::from(self.policy.max_span_days) {
            return Err(LeaveError::RangeTooLong {
                start: start_date,
                end: end_date,
                max_days: self.policy.max_span_days,
            });
        }

        let employee = self.require_employee(requester)?;
        if !employee.active {
            return Err(LeaveError::Forbidden {
                actor: requester.clone(),
                action: "request leave while inactive",
            });
        }

        let holidays = match &employee.calendar {
            Some(calendar) => self.store.get_calendar(calendar)?,
            None => None,
        };
        let working_days = count_working_days(start_date, end_date, |date| {
            Ok::<_, LeaveError>(holidays.as_ref().is_some_and(|calendar| calendar.contains(date)))
        })?;

        // The store repeats this check atomically with the insert; querying
        // first lets an overlap win over a balance refusal.
        if self.policy.prevent_overlap {
            let query = RequestQuery {
                states: ACTIVE_STATES.to_vec(),
                from: Some(start_date),
                to: Some(end_date),
                ..RequestQuery::for_requester(requester)
            };
            if let Some(existing) = self.store.query(&query)?.into_iter().next() {
                return Err(LeaveError::OverlappingRequest {
                    existing: existing.id,
                });
            }
        }

        let guards = if category.draws_on_entitlement() {
            self.ledger.check_capacity(requester, &working_days.by_year)?
        } else {
            Vec::new()
        };

        let request = LeaveRequest {
            id: next_request_id(),
            requester: requester.clone(),
            requested_at: self.clock.now(),
            start_date,
            end_date,
            working_days: working_days.total,
            allocation: working_days.by_year,
            category,
            comment,
            state: RequestState::Pending,
            approver: None,
            decided_at: None,
            decision_comment: None,
            revision: 0,
        };

        let conditions = InsertConditions {
            usage: guards,
            exclusive_dates: self.policy.prevent_overlap,
        };
        let stored = self.store.insert(request, &conditions)?;
        info!(
            request_id = %stored.id,
            requester = %stored.requester,
            category = stored.category.label(),
            working_days = stored.working_days,
            "leave request created"
        );

        if let Some(supervisor) = &employee.supervisor {
            self.dispatch(
                supervisor,
                NotificationKind::RequestCreated,
                &stored,
                format!(
                    "{} requested {} day(s) of {} from {} to {}",
                    employee.full_name(),
                    stored.working_days,
                    stored.category.label(),
                    stored.start_date,
                    stored.end_date
                ),
            );
        }

        Ok(stored)
    }

    /// Approve or reject a pending request on behalf of `actor`.
    pub fn transition_request(
        &self,
        request_id: &RequestId,
        actor: &EmployeeId,
        new_state: RequestState,
        decision_comment: Option<String>,
    ) -> Result<LeaveRequest, LeaveError> {
        let mut request = self.require_request(request_id)?;

        if !new_state.is_decision() {
            return Err(LeaveError::InvalidStateTransition {
                from: request.state,
                to: new_state,
            });
        }

        let forbidden = || LeaveError::Forbidden {
            actor: actor.clone(),
            action: "decide on this leave request",
        };
        let approver = self.store.get_employee(actor)?.ok_or_else(forbidden)?;
        let requester = self.require_employee(&request.requester)?;
        if !can_decide(&approver, &requester) {
            return Err(forbidden());
        }

        if request.state != RequestState::Pending {
            return Err(LeaveError::InvalidStateTransition {
                from: request.state,
                to: new_state,
            });
        }

        let draws_days = request.category.draws_on_entitlement();
        let guards = if new_state == RequestState::Approved && draws_days {
            self.ledger
                .check_capacity(&request.requester, &request.allocation)?
        } else {
            Vec::new()
        };

        request.state = new_state;
        request.approver = Some(approver.id.clone());
        request.decided_at = Some(self.clock.now());
        request.decision_comment = decision_comment;

        let stored = self.store.update(request, &guards)?;
        info!(
            request_id = %stored.id,
            approver = %approver.id,
            state = stored.state.label(),
            "leave request decided"
        );

        let mut message = format!(
            "Your {} request from {} to {} was {} by {}",
            stored.category.label(),
            stored.start_date,
            stored.end_date,
            stored.state.label(),
            approver.full_name()
        );
        if let Some(comment) = &stored.decision_comment {
            message.push_str(": ");
            message.push_str(comment);
        }
        self.dispatch(
            &stored.requester,
            NotificationKind::RequestDecided,
            &stored,
            message,
        );

        Ok(stored)
    }

    /// Withdraw a pending request. Only the requester may cancel.
    pub fn cancel_request(
        &self,
        request_id: &RequestId,
        actor: &EmployeeId,
    ) -> Result<LeaveRequest, LeaveError> {
        let mut request = self.require_request(request_id)?;

        if &request.requester != actor {
            return Err(LeaveError::Forbidden {
                actor: actor.clone(),
                action: "cancel another employee's request",
            });
        }
        if request.state != RequestState::Pending {
            return Err(LeaveError::InvalidStateTransition {
                from: request.state,
                to: RequestState::Cancelled,
            });
        }

        let supervisor = self
            .store
            .get_employee(actor)?
            .and_then(|employee| employee.supervisor);

        request.state = RequestState::Cancelled;
        request.decided_at = Some(self.clock.now());

        let stored = self.store.update(request, &[])?;
        info!(request_id = %stored.id, requester = %stored.requester, "leave request cancelled");

        if let Some(supervisor) = supervisor {
            self.dispatch(
                &supervisor,
                NotificationKind::RequestCancelled,
                &stored,
                format!(
                    "{} cancelled the {} request from {} to {}",
                    stored.requester,
                    stored.category.label(),
                    stored.start_date,
                    stored.end_date
                ),
            );
        }

        Ok(stored)
    }

    /// Requests visible to `actor` under `role`, newest first.
    pub fn list_requests(
        &self,
        actor: &EmployeeId,
        role: Role,
    ) -> Result<Vec<LeaveRequest>, LeaveError> {
        let query = self.scope(actor, role)?;
        let mut requests = self.store.query(&query)?;
        sort_newest_first(&mut requests);
        Ok(requests)
    }

    /// Filtered, paginated listing under the actor's directory role.
    pub fn search_requests(
        &self,
        actor: &EmployeeId,
        filter: RequestFilter,
        page: PageRequest,
    ) -> Result<RequestPage, LeaveError> {
        let employee = self.require_actor(actor, "list leave requests")?;
        let query = RequestQuery {
            states: filter.state.into_iter().collect(),
            category: filter.category,
            from: filter.from,
            to: filter.to,
            ..self.scope(actor, employee.role)?
        };
        let mut requests = self.store.query(&query)?;
        sort_newest_first(&mut requests);
        Ok(RequestPage::slice(requests, page))
    }

    pub fn get_request(
        &self,
        actor: &EmployeeId,
        request_id: &RequestId,
    ) -> Result<LeaveRequest, LeaveError> {
        let request = self.require_request(request_id)?;
        if &request.requester == actor {
            return Ok(request);
        }

        let viewer = self.require_actor(actor, "view this leave request")?;
        let requester = self.require_employee(&request.requester)?;
        if !can_view(&viewer, &requester) {
            return Err(LeaveError::Forbidden {
                actor: actor.clone(),
                action: "view this leave request",
            });
        }
        Ok(request)
    }

    pub fn employee(&self, id: &EmployeeId) -> Result<Employee, LeaveError> {
        self.require_employee(id)
    }

    pub fn entitlement(
        &self,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<EntitlementBalance, LeaveError> {
        self.ledger.entitlement(employee, year)
    }

    /// Entitlement lookup on behalf of `actor`, who must be able to see the
    /// employee's requests.
    pub fn entitlement_for(
        &self,
        actor: &EmployeeId,
        employee: &EmployeeId,
        year: i32,
    ) -> Result<EntitlementBalance, LeaveError> {
        if actor != employee {
            let viewer = self.require_actor(actor, "view entitlements")?;
            let subject = self.require_employee(employee)?;
            if !can_view(&viewer, &subject) {
                return Err(LeaveError::Forbidden {
                    actor: actor.clone(),
                    action: "view entitlements",
                });
            }
        }
        self.ledger.entitlement(employee, year)
    }

    /// Every department with its active headcount. HR and administrators only.
    pub fn departments(&self, actor: &EmployeeId) -> Result<Vec<DepartmentSummary>, LeaveError> {
        self.require_directory_manager(actor, "list departments")?;
        let mut summaries = Vec::new();
        for department in self.store.list_departments()? {
            let headcount = self
                .store
                .list_by_department(&department.id)?
                .iter()
                .filter(|employee| employee.active)
                .count();
            summaries.push(DepartmentSummary {
                department,
                headcount,
            });
        }
        summaries.sort_by(|a, b| a.department.name.cmp(&b.department.name));
        Ok(summaries)
    }

    /// Department with its members. Outside HR and administration only the
    /// actor's own department is visible.
    pub fn department(
        &self,
        actor: &EmployeeId,
        id: &DepartmentId,
    ) -> Result<DepartmentDetail, LeaveError> {
        let viewer = self.require_actor(actor, "view departments")?;
        if !viewer.role.manages_directory() && viewer.department.as_ref() != Some(id) {
            return Err(LeaveError::Forbidden {
                actor: actor.clone(),
                action: "view another department",
            });
        }

        let department = self
            .store
            .get_department(id)?
            .ok_or_else(|| LeaveError::NotFound(Missing::Department(id.clone())))?;
        let mut members: Vec<MemberView> = self
            .store
            .list_by_department(id)?
            .iter()
            .map(MemberView::from)
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(DepartmentDetail {
            department,
            members,
        })
    }

    pub fn list_employees(&self, actor: &EmployeeId) -> Result<Vec<MemberView>, LeaveError> {
        self.require_directory_manager(actor, "list employees")?;
        let mut members: Vec<MemberView> = self
            .store
            .list_employees()?
            .iter()
            .map(MemberView::from)
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    /// Create or replace a directory entry outside the HR sync.
    pub fn save_employee(
        &self,
        actor: &EmployeeId,
        employee: Employee,
    ) -> Result<Employee, LeaveError> {
        self.require_directory_manager(actor, "edit employees")?;

        if let Some(department) = &employee.department {
            if self.store.get_department(department)?.is_none() {
                return Err(LeaveError::NotFound(Missing::Department(department.clone())));
            }
        }
        if let Some(supervisor) = &employee.supervisor {
            if supervisor == &employee.id {
                return Err(LeaveError::InvalidDirectoryChange {
                    reason: "an employee cannot supervise themselves",
                });
            }
            self.require_employee(supervisor)?;
        }
        if employee.email.trim().is_empty() {
            return Err(LeaveError::InvalidDirectoryChange {
                reason: "e-mail is required",
            });
        }
        if let Some(holder) = self.store.find_by_email(&employee.email)? {
            if holder.id != employee.id {
                return Err(LeaveError::InvalidDirectoryChange {
                    reason: "e-mail already belongs to another employee",
                });
            }
        }

        self.store.upsert_employee(employee.clone())?;
        info!(
            actor = %actor,
            employee = %employee.id,
            role = employee.role.label(),
            "employee saved"
        );
        Ok(employee)
    }

    pub fn create_department(
        &self,
        actor: &EmployeeId,
        submission: NewDepartment,
    ) -> Result<Department, LeaveError> {
        self.require_directory_manager(actor, "create departments")?;
        let NewDepartment { id, draft } = submission;
        let name = draft.name.trim();
        if id.0.trim().is_empty() || name.is_empty() {
            return Err(LeaveError::InvalidDirectoryChange {
                reason: "department id and name are required",
            });
        }

        let taken = self.store.list_departments()?.into_iter().any(|existing| {
            existing.id == id || existing.name.trim().eq_ignore_ascii_case(name)
        });
        if taken {
            return Err(LeaveError::InvalidDirectoryChange {
                reason: "a department with this id or name already exists",
            });
        }

        let department = self.department_from(id, draft)?;
        self.store
            .insert_department(department.clone())
            .map_err(|error| match error {
                RepositoryError::Duplicate => LeaveError::InvalidDirectoryChange {
                    reason: "a department with this id or name already exists",
                },
                other => other.into(),
            })?;
        info!(actor = %actor, department = %department.id, "department created");
        Ok(department)
    }

    pub fn update_department(
        &self,
        actor: &EmployeeId,
        id: &DepartmentId,
        draft: DepartmentDraft,
    ) -> Result<Department, LeaveError> {
        self.require_directory_manager(actor, "edit departments")?;
        if draft.name.trim().is_empty() {
            return Err(LeaveError::InvalidDirectoryChange {
                reason: "department name is required",
            });
        }
        if self.store.get_department(id)?.is_none() {
            return Err(LeaveError::NotFound(Missing::Department(id.clone())));
        }

        let department = self.department_from(id.clone(), draft)?;
        self.store.upsert_department(department.clone())?;
        info!(actor = %actor, department = %department.id, "department updated");
        Ok(department)
    }

    /// Remove an empty department. Administrators only.
    pub fn delete_department(
        &self,
        actor: &EmployeeId,
        id: &DepartmentId,
    ) -> Result<(), LeaveError> {
        let admin = self.require_actor(actor, "delete departments")?;
        if !admin.role.deletes_departments() {
            return Err(LeaveError::Forbidden {
                actor: actor.clone(),
                action: "delete departments",
            });
        }
        if self.store.get_department(id)?.is_none() {
            return Err(LeaveError::NotFound(Missing::Department(id.clone())));
        }
        if !self.store.list_by_department(id)?.is_empty() {
            return Err(LeaveError::InvalidDirectoryChange {
                reason: "department still has employees",
            });
        }

        self.store.remove_department(id)?;
        info!(actor = %actor, department = %id, "department deleted");
        Ok(())
    }

    /// Create or overwrite one year's allowance. Lowering it below the days
    /// already approved is allowed and leaves a negative balance.
    pub fn set_entitlement(
        &self,
        actor: &EmployeeId,
        employee: &EmployeeId,
        year: i32,
        draft: EntitlementDraft,
    ) -> Result<EntitlementBalance, LeaveError> {
        self.require_directory_manager(actor, "adjust entitlements")?;
        self.require_employee(employee)?;

        self.store.upsert_ledger(EntitlementLedger {
            employee_id: employee.clone(),
            year,
            total_days: draft.total_days,
            breakdown: draft.breakdown,
            comment: draft.comment,
        })?;
        let balance = self.ledger.entitlement(employee, year)?;
        info!(
            actor = %actor,
            employee = %employee,
            year,
            total_days = balance.total_days,
            available_days = balance.available_days,
            "entitlement adjusted"
        );
        Ok(balance)
    }

    fn department_from(
        &self,
        id: DepartmentId,
        draft: DepartmentDraft,
    ) -> Result<Department, LeaveError> {
        if let Some(manager) = &draft.manager {
            self.require_employee(manager)?;
        }
        Ok(Department {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            manager: draft.manager,
            location: draft.location,
            active: draft.active,
        })
    }

    fn scope(&self, actor: &EmployeeId, role: Role) -> Result<RequestQuery, LeaveError> {
        let query = match role.visibility() {
            Visibility::Own => RequestQuery::for_requester(actor),
            Visibility::DirectReports => {
                let reports = self
                    .store
                    .list_by_supervisor(actor)?
                    .into_iter()
                    .map(|employee| employee.id)
                    .collect();
                RequestQuery {
                    requesters: Some(reports),
                    ..RequestQuery::default()
                }
            }
            Visibility::Everyone => RequestQuery::default(),
        };
        Ok(query)
    }

    fn require_request(&self, id: &RequestId) -> Result<LeaveRequest, LeaveError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| LeaveError::NotFound(Missing::Request(id.clone())))
    }

    fn require_employee(&self, id: &EmployeeId) -> Result<Employee, LeaveError> {
        self.store
            .get_employee(id)?
            .ok_or_else(|| LeaveError::NotFound(Missing::Employee(id.clone())))
    }

    /// Unknown actors are refused rather than reported missing.
    fn require_actor(
        &self,
        actor: &EmployeeId,
        action: &'static str,
    ) -> Result<Employee, LeaveError> {
        self.store
            .get_employee(actor)?
            .ok_or_else(|| LeaveError::Forbidden {
                actor: actor.clone(),
                action,
            })
    }

    fn require_directory_manager(
        &self,
        actor: &EmployeeId,
        action: &'static str,
    ) -> Result<Employee, LeaveError> {
        let employee = self.require_actor(actor, action)?;
        if !employee.active || !employee.role.manages_directory() {
            return Err(LeaveError::Forbidden {
                actor: actor.clone(),
                action,
            });
        }
        Ok(employee)
    }

    fn dispatch(
        &self,
        recipient: &EmployeeId,
        kind: NotificationKind,
        request: &LeaveRequest,
        message: String,
    ) {
        let mut details = BTreeMap::new();
        details.insert("requester".to_string(), request.requester.to_string());
        details.insert("state".to_string(), request.state.label().to_string());
        details.insert("start_date".to_string(), request.start_date.to_string());
        details.insert("end_date".to_string(), request.end_date.to_string());
        details.insert(
            "working_days".to_string(),
            request.working_days.to_string(),
        );

        let notification = Notification {
            recipient: recipient.clone(),
            kind,
            request_id: request.id.clone(),
            message,
            details,
            created_at: self.clock.now(),
        };

        if let Err(error) = self.notifier.notify(notification) {
            warn!(
                request_id = %request.id,
                recipient = %recipient,
                kind = kind.label(),
                %error,
                "failed to deliver leave notification"
            );
        }
    }
}

/// Ties on the timestamp fall back to the numeric id sequence, so
/// `lr-1000000` sorts after `lr-999999`.
fn sort_newest_first(requests: &mut [LeaveRequest]) {
    requests.sort_by_key(|request| {
        Reverse((
            request.requested_at,
            request.id.sequence(),
            request.id.clone(),
        ))
    });
}
