use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CalendarId, DepartmentId, Employee, EmployeeId, LeaveCategory, NewLeaveRequest, RequestId,
    RequestState, Role,
};
use super::error::LeaveError;
use super::repository::{LeaveStore, Notifier};
use super::service::LeaveRequestService;
use super::views::{
    DepartmentDraft, EntitlementDraft, NewDepartment, PageRequest, RequestFilter,
    DEFAULT_PAGE_SIZE,
};

/// Header carrying the authenticated employee id, set by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Router builder exposing the leave request lifecycle and the directory.
pub fn leave_router<S, N>(service: Arc<LeaveRequestService<S, N>>) -> Router
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/leave-requests",
            get(list_handler::<S, N>).post(create_handler::<S, N>),
        )
        .route(
            "/api/v1/leave-requests/:request_id",
            get(detail_handler::<S, N>).delete(cancel_handler::<S, N>),
        )
        .route(
            "/api/v1/leave-requests/:request_id/decision",
            put(decision_handler::<S, N>),
        )
        .route("/api/v1/employees", get(employees_handler::<S, N>))
        .route(
            "/api/v1/employees/:employee_id",
            put(save_employee_handler::<S, N>),
        )
        .route(
            "/api/v1/employees/:employee_id/entitlements/:year",
            get(entitlement_handler::<S, N>).put(set_entitlement_handler::<S, N>),
        )
        .route(
            "/api/v1/departments",
            get(departments_handler::<S, N>).post(create_department_handler::<S, N>),
        )
        .route(
            "/api/v1/departments/:department_id",
            get(department_handler::<S, N>)
                .put(update_department_handler::<S, N>)
                .delete(delete_department_handler::<S, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub state: RequestState,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Directory entry as submitted; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct EmployeeBody {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<DepartmentId>,
    #[serde(default)]
    pub supervisor: Option<EmployeeId>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub calendar: Option<CalendarId>,
}

fn active_by_default() -> bool {
    true
}

impl EmployeeBody {
    fn into_employee(self, id: EmployeeId) -> Employee {
        Employee {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            role: self.role,
            department: self.department,
            supervisor: self.supervisor,
            active: self.active,
            calendar: self.calendar,
        }
    }
}

/// Flat query string for the listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub state: Option<RequestState>,
    pub category: Option<LeaveCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ListParams {
    fn split(self) -> (RequestFilter, PageRequest) {
        let filter = RequestFilter {
            state: self.state,
            category: self.category,
            from: self.from,
            to: self.to,
        };
        let page = PageRequest {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        (filter, page)
    }
}

pub(crate) async fn create_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Json(submission): Json<NewLeaveRequest>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.create_request(&actor, submission) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let (filter, page) = params.split();
    match service.search_requests(&actor, filter, page) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.get_request(&actor, &RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let id = RequestId(request_id);
    match service.transition_request(&id, &actor, body.state, body.comment) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.cancel_request(&RequestId(request_id), &actor) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn entitlement_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path((employee_id, year)): Path<(String, i32)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.entitlement_for(&actor, &EmployeeId(employee_id), year) {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn departments_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.departments(&actor) {
        Ok(departments) => (StatusCode::OK, Json(departments)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn department_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(department_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.department(&actor, &DepartmentId(department_id)) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_department_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Json(submission): Json<NewDepartment>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.create_department(&actor, submission) {
        Ok(department) => (StatusCode::CREATED, Json(department)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_department_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(department_id): Path<String>,
    Json(draft): Json<DepartmentDraft>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.update_department(&actor, &DepartmentId(department_id), draft) {
        Ok(department) => (StatusCode::OK, Json(department)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_department_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(department_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.delete_department(&actor, &DepartmentId(department_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn employees_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.list_employees(&actor) {
        Ok(members) => (StatusCode::OK, Json(members)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn save_employee_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path(employee_id): Path<String>,
    Json(body): Json<EmployeeBody>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.save_employee(&actor, body.into_employee(EmployeeId(employee_id))) {
        Ok(employee) => (StatusCode::OK, Json(employee)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn set_entitlement_handler<S, N>(
    State(service): State<Arc<LeaveRequestService<S, N>>>,
    headers: HeaderMap,
    Path((employee_id, year)): Path<(String, i32)>,
    Json(draft): Json<EntitlementDraft>,
) -> Response
where
    S: LeaveStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.set_entitlement(&actor, &EmployeeId(employee_id), year, draft) {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Read the acting employee from [`ACTOR_HEADER`]; a missing or blank header
/// is answered with 401.
pub fn actor_from(headers: &HeaderMap) -> Result<EmployeeId, Response> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| EmployeeId(value.to_string()))
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("missing {ACTOR_HEADER} header"),
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

pub fn error_status(error: &LeaveError) -> StatusCode {
    match error {
        LeaveError::InvalidDateRange { .. }
        | LeaveError::RangeTooLong { .. }
        | LeaveError::InvalidDirectoryChange { .. } => StatusCode::BAD_REQUEST,
        LeaveError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        LeaveError::Forbidden { .. } => StatusCode::FORBIDDEN,
        LeaveError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LeaveError::NotFound(_) => StatusCode::NOT_FOUND,
        LeaveError::OverlappingRequest { .. } | LeaveError::ConcurrentModification(_) => {
            StatusCode::CONFLICT
        }
        LeaveError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: LeaveError) -> Response {
    let status = error_status(&error);
    let payload = match &error {
        LeaveError::InsufficientBalance {
            year,
            available,
            requested,
        } => json!({
            "error": error.to_string(),
            "year": year,
            "available": available,
            "requested": requested,
        }),
        LeaveError::OverlappingRequest { existing } => json!({
            "error": error.to_string(),
            "existing_request": existing,
        }),
        LeaveError::RangeTooLong { max_days, .. } => json!({
            "error": error.to_string(),
            "max_days": max_days,
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    (status, Json(payload)).into_response()
}
