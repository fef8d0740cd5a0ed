//! HR directory synchronization.
//!
//! An [`HrSource`] produces a full [`HrSnapshot`] of departments, employees,
//! entitlements, and holiday calendars; [`HrSync`] maps it onto the domain
//! types and writes through [`HrSyncTarget`] only. [`scheduler`] repeats the
//! import on an interval.

mod export;
pub mod scheduler;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::leave::domain::{
    CalendarId, Department, DepartmentId, Employee, EmployeeId, EntitlementBreakdown,
    EntitlementLedger, HolidayCalendar, Role,
};
use crate::leave::repository::{DirectoryAdmin, RepositoryError};

pub use export::CsvExportSource;
pub use scheduler::spawn_periodic;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {file}: {source}")]
    Csv {
        file: &'static str,
        source: csv::Error,
    },
    #[error("could not write HR data: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DepartmentRow {
    pub code: String,
    pub name: String,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub manager_email: Option<String>,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmployeeRow {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub department_code: Option<String>,
    pub role: String,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub manager_email: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitlementRow {
    pub employee_id: String,
    pub year: i32,
    pub total_days: u32,
    #[serde(default)]
    pub base_days: Option<u32>,
    #[serde(default)]
    pub seniority_days: Option<u32>,
    #[serde(default)]
    pub extra_days: Option<u32>,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HolidayRow {
    pub calendar_id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "export::empty_string_as_none")]
    pub description: Option<String>,
}

/// One full export from the HR system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HrSnapshot {
    pub departments: Vec<DepartmentRow>,
    pub employees: Vec<EmployeeRow>,
    pub entitlements: Vec<EntitlementRow>,
    pub holidays: Vec<HolidayRow>,
}

pub trait HrSource: Send + Sync {
    fn snapshot(&self) -> Result<HrSnapshot, SyncError>;
}

/// Write side the sync job is allowed to touch. Every upsert is keyed by the
/// HR system's external code.
pub trait HrSyncTarget: DirectoryAdmin {
    /// Holidays for the years the incoming calendar covers replace stored ones.
    fn upsert_calendar(&self, calendar: HolidayCalendar) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub departments: usize,
    pub employees: usize,
    pub ledgers: usize,
    pub calendars: usize,
    pub skipped_employees: usize,
    pub skipped_ledgers: usize,
}

pub struct HrSync<T> {
    target: Arc<T>,
}

impl<T> HrSync<T>
where
    T: HrSyncTarget + 'static,
{
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    pub fn run<S: HrSource + ?Sized>(&self, source: &S) -> Result<SyncReport, SyncError> {
        let snapshot = source.snapshot()?;
        self.apply(snapshot)
    }

    pub fn apply(&self, snapshot: HrSnapshot) -> Result<SyncReport, SyncError> {
        let HrSnapshot {
            departments,
            employees,
            entitlements,
            holidays,
        } = snapshot;
        let mut report = SyncReport::default();

        let by_email: HashMap<String, EmployeeId> = employees
            .iter()
            .map(|row| {
                (
                    normalize_email(&row.email),
                    EmployeeId(row.employee_id.clone()),
                )
            })
            .collect();

        for row in departments {
            let manager = self.resolve_manager(&by_email, row.manager_email.as_deref())?;
            self.target.upsert_department(Department {
                id: DepartmentId(row.code),
                name: row.name,
                description: row.description,
                manager,
                location: row.location,
                active: true,
            })?;
            report.departments += 1;
        }

        let known_departments: HashSet<DepartmentId> = self
            .target
            .list_departments()?
            .into_iter()
            .map(|department| department.id)
            .collect();

        let mut imported = HashSet::new();
        for row in employees {
            let department = row.department_code.clone().map(DepartmentId);
            let Some(department) = department.filter(|code| known_departments.contains(code))
            else {
                warn!(
                    employee = %row.employee_id,
                    department = row.department_code.as_deref().unwrap_or(""),
                    "skipping employee with unknown department"
                );
                report.skipped_employees += 1;
                continue;
            };

            let id = EmployeeId(row.employee_id);
            let supervisor = self
                .resolve_manager(&by_email, row.manager_email.as_deref())?
                .filter(|boss| boss != &id);
            self.target.upsert_employee(Employee {
                id: id.clone(),
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                role: map_role(&row.role),
                department: Some(department),
                supervisor,
                active: row.status.trim().eq_ignore_ascii_case("active"),
                calendar: row.calendar_id.map(CalendarId),
            })?;
            imported.insert(id);
            report.employees += 1;
        }

        for row in entitlements {
            let employee = EmployeeId(row.employee_id);
            if !imported.contains(&employee) && self.target.get_employee(&employee)?.is_none() {
                warn!(employee = %employee, year = row.year, "skipping entitlement for unknown employee");
                report.skipped_ledgers += 1;
                continue;
            }

            let breakdown = (row.base_days.is_some()
                || row.seniority_days.is_some()
                || row.extra_days.is_some())
            .then(|| EntitlementBreakdown {
                base_days: row.base_days.unwrap_or(0),
                seniority_days: row.seniority_days.unwrap_or(0),
                extra_days: row.extra_days.unwrap_or(0),
            });
            self.target.upsert_ledger(EntitlementLedger {
                employee_id: employee,
                year: row.year,
                total_days: row.total_days,
                breakdown,
                comment: row.comments,
            })?;
            report.ledgers += 1;
        }

        for calendar in group_calendars(holidays) {
            self.target.upsert_calendar(calendar)?;
            report.calendars += 1;
        }

        info!(
            departments = report.departments,
            employees = report.employees,
            ledgers = report.ledgers,
            calendars = report.calendars,
            skipped_employees = report.skipped_employees,
            skipped_ledgers = report.skipped_ledgers,
            "hr sync applied"
        );
        Ok(report)
    }

    /// Managers are matched against the snapshot first, then against the
    /// directory, so a partial export keeps existing reporting lines.
    fn resolve_manager(
        &self,
        snapshot: &HashMap<String, EmployeeId>,
        email: Option<&str>,
    ) -> Result<Option<EmployeeId>, SyncError> {
        let Some(email) = email.map(normalize_email).filter(|email| !email.is_empty()) else {
            return Ok(None);
        };
        if let Some(id) = snapshot.get(&email) {
            return Ok(Some(id.clone()));
        }
        let stored = self.target.find_by_email(&email)?;
        if stored.is_none() {
            warn!(manager_email = %email, "manager e-mail matches no employee");
        }
        Ok(stored.map(|employee| employee.id))
    }
}

/// Map an HR system role label onto the closed role set. Unknown labels fall
/// back to individual contributor.
pub fn map_role(label: &str) -> Role {
    match label.trim().to_ascii_lowercase().as_str() {
        "manager" | "director" | "supervisor" => Role::Supervisor,
        "hr_staff" | "hr" => Role::Hr,
        "admin" | "administrator" => Role::Administrator,
        _ => Role::IndividualContributor,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn group_calendars(rows: Vec<HolidayRow>) -> Vec<HolidayCalendar> {
    let mut grouped: BTreeMap<String, (String, BTreeSet<NaiveDate>)> = BTreeMap::new();
    for row in rows {
        let entry = grouped
            .entry(row.calendar_id)
            .or_insert_with(|| (row.name, BTreeSet::new()));
        entry.1.insert(row.date);
    }
    grouped
        .into_iter()
        .map(|(id, (name, holidays))| HolidayCalendar {
            id: CalendarId(id),
            name,
            holidays,
        })
        .collect()
}
