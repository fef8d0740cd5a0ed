use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Department, DepartmentId, Employee, EmployeeId, EntitlementBreakdown, LeaveCategory,
    LeaveRequest, RequestState, Role,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentSummary {
    #[serde(flatten)]
    pub department: Department,
    pub headcount: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl From<&Employee> for MemberView {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id.clone(),
            name: employee.full_name(),
            email: employee.email.clone(),
            role: employee.role,
            active: employee.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentDetail {
    #[serde(flatten)]
    pub department: Department,
    pub members: Vec<MemberView>,
}

/// Department fields supplied by HR or an administrator; the id comes from
/// the path or the create payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DepartmentDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager: Option<EmployeeId>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewDepartment {
    pub id: DepartmentId,
    #[serde(flatten)]
    pub draft: DepartmentDraft,
}

/// Administrative override of one year's allowance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitlementDraft {
    pub total_days: u32,
    #[serde(default)]
    pub breakdown: Option<EntitlementBreakdown>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Optional narrowing applied on top of the actor's visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestFilter {
    pub state: Option<RequestState>,
    pub category: Option<LeaveCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub per_page: usize,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: default_page_size(),
        }
    }
}

impl PageRequest {
    /// Clamp to `page >= 1` and `1 <= per_page <= MAX_PAGE_SIZE`.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestPage {
    pub items: Vec<LeaveRequest>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl RequestPage {
    pub fn slice(requests: Vec<LeaveRequest>, page: PageRequest) -> Self {
        let page = page.normalized();
        let total = requests.len();
        let items = requests
            .into_iter()
            .skip(page.offset())
            .take(page.per_page)
            .collect();
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        }
    }
}
