use crate::infra::{Backend, LeaveService};
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use clap::Args;
use leave_desk::error::AppError;
use leave_desk::leave::{
    EmployeeId, InMemoryLeaveStore, InMemoryNotifier, LeaveCategory, LeaveError, LifecyclePolicy,
    NewLeaveRequest, RequestState,
};
use leave_desk::sync::{
    CsvExportSource, DepartmentRow, EmployeeRow, EntitlementRow, HrSnapshot, HrSync, SyncError,
    SyncReport,
};
use std::path::PathBuf;

const SAMPLE_ALLOWANCE: u32 = 10;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First day of the scripted vacation (YYYY-MM-DD). Defaults to the
    /// Monday at least two weeks from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Seed the directory from an HR export instead of the built-in sample.
    #[arg(long)]
    pub(crate) export_dir: Option<PathBuf>,
    /// Employee who files the requests.
    #[arg(long, default_value = "E-101")]
    pub(crate) requester: String,
    /// Supervisor who decides them.
    #[arg(long, default_value = "E-100")]
    pub(crate) approver: String,
    /// Refuse requests that overlap a pending or approved one.
    #[arg(long)]
    pub(crate) prevent_overlap: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        export_dir,
        requester,
        approver,
        prevent_overlap,
    } = args;

    let start = start.unwrap_or_else(|| upcoming_monday(Local::now().date_naive()));
    let requester = EmployeeId(requester);
    let approver = EmployeeId(approver);

    let backend = Backend::in_memory(LifecyclePolicy {
        prevent_overlap,
        ..LifecyclePolicy::default()
    });
    let report = match &export_dir {
        Some(dir) => HrSync::new(backend.store.clone()).run(&CsvExportSource::from_dir(dir))?,
        None => seed_sample_directory(&backend.store, start.year())?,
    };

    println!("Leave desk demo");
    match &export_dir {
        Some(dir) => println!("Directory source: HR export at {}", dir.display()),
        None => println!("Directory source: built-in sample"),
    }
    println!(
        "Imported {} departments, {} employees, {} ledgers, {} calendars",
        report.departments, report.employees, report.ledgers, report.calendars
    );

    let service = &backend.service;
    let employee = service.employee(&requester)?;
    println!("\nRequester: {} ({})", employee.full_name(), requester);
    print_balance(service, &requester, start.year());

    let first = service.create_request(&requester, vacation(start, start + Duration::days(4)))?;
    println!(
        "\n- Filed {} for {} -> {} ({} working days, {})",
        first.id, first.start_date, first.end_date, first.working_days, first.state
    );

    let decided = service.transition_request(
        &first.id,
        &approver,
        RequestState::Approved,
        Some("Enjoy the break".to_string()),
    )?;
    println!("- {} approved {} on {}", approver, decided.id, decided_on(&decided));
    print_balance(service, &requester, start.year());

    if prevent_overlap {
        let overlapping = service.create_request(
            &requester,
            vacation(start + Duration::days(2), start + Duration::days(3)),
        );
        report_refusal("Overlapping request", overlapping);
    }

    let long_start = start + Duration::days(14);
    let overdraw = service.create_request(
        &requester,
        vacation(long_start, long_start + Duration::days(20)),
    );
    report_refusal("Three-week request", overdraw);

    let pending = service.create_request(
        &requester,
        vacation(start + Duration::days(7), start + Duration::days(7)),
    )?;
    println!("\n- Filed {} for a single day on {}", pending.id, pending.start_date);
    let cancelled = service.cancel_request(&pending.id, &requester)?;
    println!("- Requester withdrew {} -> {}", cancelled.id, cancelled.state);

    print_inbox(&backend.notifier, &approver);
    print_inbox(&backend.notifier, &requester);

    Ok(())
}

/// Populate `store` with a two-person team and ledgers for `year` and the
/// following year.
pub(crate) fn seed_sample_directory(
    store: &std::sync::Arc<InMemoryLeaveStore>,
    year: i32,
) -> Result<SyncReport, SyncError> {
    HrSync::new(store.clone()).apply(sample_snapshot(year))
}

fn sample_snapshot(year: i32) -> HrSnapshot {
    let person = |id: &str, first: &str, last: &str, role: &str, manager: Option<&str>| EmployeeRow {
        employee_id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}@example.com", first, last).to_ascii_lowercase(),
        department_code: Some("ENG".to_string()),
        role: role.to_string(),
        manager_email: manager.map(str::to_string),
        status: "active".to_string(),
        calendar_id: None,
    };
    let allowance = |id: &str, year: i32, total_days: u32| EntitlementRow {
        employee_id: id.to_string(),
        year,
        total_days,
        base_days: None,
        seniority_days: None,
        extra_days: None,
        comments: None,
    };

    HrSnapshot {
        departments: vec![DepartmentRow {
            code: "ENG".to_string(),
            name: "Engineering".to_string(),
            description: Some("Product engineering".to_string()),
            manager_email: Some("marta.lopez@example.com".to_string()),
            location: None,
        }],
        employees: vec![
            person("E-100", "Marta", "Lopez", "manager", None),
            person(
                "E-101",
                "Ana",
                "Ruiz",
                "employee",
                Some("marta.lopez@example.com"),
            ),
            person("E-103", "Eva", "Soler", "hr_staff", None),
        ],
        entitlements: [year, year + 1]
            .into_iter()
            .flat_map(|year| {
                [
                    allowance("E-100", year, 25),
                    allowance("E-101", year, SAMPLE_ALLOWANCE),
                ]
            })
            .collect(),
        holidays: Vec::new(),
    }
}

fn upcoming_monday(today: NaiveDate) -> NaiveDate {
    let mut day = today + Duration::days(14);
    while day.weekday() != Weekday::Mon {
        day += Duration::days(1);
    }
    day
}

fn vacation(start_date: NaiveDate, end_date: NaiveDate) -> NewLeaveRequest {
    NewLeaveRequest {
        start_date,
        end_date,
        category: LeaveCategory::Vacation,
        comment: None,
    }
}

fn decided_on(request: &leave_desk::leave::LeaveRequest) -> String {
    request
        .decided_at
        .map(|at| at.date_naive().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_balance(service: &LeaveService, employee: &EmployeeId, year: i32) {
    match service.entitlement(employee, year) {
        Ok(balance) => println!(
            "  Balance {}: {} total, {} used, {} available",
            balance.year, balance.total_days, balance.used_days, balance.available_days
        ),
        Err(err) => println!("  Balance {year} unavailable: {err}"),
    }
}

fn report_refusal<T>(label: &str, outcome: Result<T, LeaveError>) {
    match outcome {
        Ok(_) => println!("\n- {label} was accepted"),
        Err(err) => println!("\n- {label} refused: {err}"),
    }
}

fn print_inbox(notifier: &InMemoryNotifier, recipient: &EmployeeId) {
    let inbox = match notifier.inbox(recipient) {
        Ok(inbox) => inbox,
        Err(err) => {
            println!("\nNotifications for {recipient} unavailable: {err}");
            return;
        }
    };
    if inbox.is_empty() {
        println!("\nNotifications for {recipient}: none");
        return;
    }
    println!("\nNotifications for {recipient}");
    for notification in inbox {
        println!(
            "- [{}] {}: {}",
            notification.kind.label(),
            notification.request_id,
            notification.message
        );
    }
}
