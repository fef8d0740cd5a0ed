use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Directory identifier for an employee (the HR system's employee code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(pub String);

/// Identifier wrapper for leave requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

macro_rules! display_inner {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })+
    };
}

display_inner!(EmployeeId, DepartmentId, CalendarId, RequestId);

impl RequestId {
    /// Numeric suffix after the last `-`, when there is one.
    pub fn sequence(&self) -> Option<u64> {
        self.0.rsplit('-').next()?.parse().ok()
    }
}

/// Closed set of directory roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    IndividualContributor,
    Supervisor,
    Hr,
    Administrator,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::IndividualContributor => "individual_contributor",
            Self::Supervisor => "supervisor",
            Self::Hr => "hr",
            Self::Administrator => "administrator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<DepartmentId>,
    pub supervisor: Option<EmployeeId>,
    pub active: bool,
    pub calendar: Option<CalendarId>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub manager: Option<EmployeeId>,
    pub location: Option<String>,
    pub active: bool,
}

/// How the HR system arrived at an annual total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementBreakdown {
    pub base_days: u32,
    pub seniority_days: u32,
    pub extra_days: u32,
}

/// Days granted to one employee for one calendar year. Usage is never stored
/// here; it is derived from approved vacation requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementLedger {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub total_days: u32,
    pub breakdown: Option<EntitlementBreakdown>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    pub id: CalendarId,
    pub name: String,
    pub holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Replace every holiday in the years `incoming` covers, keeping other years.
    pub fn merge_years(&mut self, incoming: HolidayCalendar) {
        let years: BTreeSet<i32> = incoming.holidays.iter().map(|date| date.year()).collect();
        self.holidays.retain(|date| !years.contains(&date.year()));
        self.holidays.extend(incoming.holidays);
        self.name = incoming.name;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCategory {
    Vacation,
    Sickness,
    Permission,
    Other,
}

impl LeaveCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vacation => "vacation",
            Self::Sickness => "sickness",
            Self::Permission => "permission",
            Self::Other => "other",
        }
    }

    /// Only vacation days are drawn from the annual entitlement.
    pub const fn draws_on_entitlement(self) -> bool {
        matches!(self, Self::Vacation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// States a supervisor or HR decision may move a request into.
    pub const fn is_decision(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller-supplied fields for a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeaveRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub category: LeaveCategory,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub requester: EmployeeId,
    pub requested_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub working_days: u32,
    /// Working days per calendar year; sums to `working_days`.
    pub allocation: BTreeMap<i32, u32>,
    pub category: LeaveCategory,
    pub comment: Option<String>,
    pub state: RequestState,
    pub approver: Option<EmployeeId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_comment: Option<String>,
    /// Store revision the record was read at; bumped on every successful write.
    #[serde(default)]
    pub revision: u64,
}

impl LeaveRequest {
    pub fn days_in_year(&self, year: i32) -> u32 {
        self.allocation.get(&year).copied().unwrap_or(0)
    }

    /// Whether the request consumes entitlement days.
    pub fn counts_as_usage(&self) -> bool {
        self.category.draws_on_entitlement() && self.state == RequestState::Approved
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn merge_years_replaces_only_incoming_years() {
        let mut calendar = HolidayCalendar {
            id: CalendarId("madrid".to_string()),
            name: "Madrid".to_string(),
            holidays: [date(2024, 5, 2), date(2025, 5, 2), date(2025, 11, 10)]
                .into_iter()
                .collect(),
        };

        calendar.merge_years(HolidayCalendar {
            id: CalendarId("madrid".to_string()),
            name: "Comunidad de Madrid".to_string(),
            holidays: [date(2025, 5, 15)].into_iter().collect(),
        });

        assert!(calendar.contains(date(2024, 5, 2)));
        assert!(calendar.contains(date(2025, 5, 15)));
        assert!(!calendar.contains(date(2025, 5, 2)));
        assert!(!calendar.contains(date(2025, 11, 10)));
        assert_eq!(calendar.name, "Comunidad de Madrid");
    }

    #[test]
    fn request_sequence_reads_the_numeric_suffix() {
        assert_eq!(RequestId("lr-000042".to_string()).sequence(), Some(42));
        assert_eq!(RequestId("lr-1000000".to_string()).sequence(), Some(1_000_000));
        assert_eq!(RequestId("imported".to_string()).sequence(), None);
    }

    #[test]
    fn only_decisions_leave_pending_through_transition() {
        assert!(RequestState::Approved.is_decision());
        assert!(RequestState::Rejected.is_decision());
        assert!(!RequestState::Cancelled.is_decision());
        assert!(!RequestState::Pending.is_decision());
        assert!(!RequestState::Pending.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
    }

    #[test]
    fn unknown_category_labels_are_rejected() {
        let parsed: Result<LeaveCategory, _> = serde_json::from_str("\"sabbatical\"");
        assert!(parsed.is_err());
        let parsed: LeaveCategory = serde_json::from_str("\"permission\"").expect("known label");
        assert_eq!(parsed, LeaveCategory::Permission);
    }
}
