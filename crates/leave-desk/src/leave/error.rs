use std::fmt;

use chrono::NaiveDate;

use super::domain::{DepartmentId, EmployeeId, RequestId, RequestState};
use super::repository::RepositoryError;

/// Error raised by the lifecycle manager and the entitlement ledger.
#[derive(Debug, thiserror::Error)]
pub enum LeaveError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("{start} to {end} spans more than {max_days} days")]
    RangeTooLong {
        start: NaiveDate,
        end: NaiveDate,
        max_days: u32,
    },
    #[error("cannot move a {from} request to {to}")]
    InvalidStateTransition {
        from: RequestState,
        to: RequestState,
    },
    #[error("{actor} is not allowed to {action}")]
    Forbidden {
        actor: EmployeeId,
        action: &'static str,
    },
    #[error(
        "insufficient vacation balance for {year}: {available} days available, {requested} requested"
    )]
    InsufficientBalance {
        year: i32,
        available: i64,
        requested: u32,
    },
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("dates overlap request {existing}")]
    OverlappingRequest { existing: RequestId },
    #[error("invalid directory change: {reason}")]
    InvalidDirectoryChange { reason: &'static str },
    #[error("request changed concurrently; reload and retry")]
    ConcurrentModification(#[source] RepositoryError),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] RepositoryError),
}

impl From<RepositoryError> for LeaveError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict | RepositoryError::Duplicate => {
                Self::ConcurrentModification(value)
            }
            RepositoryError::Overlap(existing) => Self::OverlappingRequest { existing },
            RepositoryError::NotFound | RepositoryError::Unavailable(_) => {
                Self::StoreUnavailable(value)
            }
        }
    }
}

/// The record a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Request(RequestId),
    Employee(EmployeeId),
    Ledger { employee: EmployeeId, year: i32 },
    Department(DepartmentId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Request(id) => write!(f, "leave request {id}"),
            Missing::Employee(id) => write!(f, "employee {id}"),
            Missing::Ledger { employee, year } => {
                write!(f, "entitlement ledger for {employee} in {year}")
            }
            Missing::Department(id) => write!(f, "department {id}"),
        }
    }
}
