//! Vacation request lifecycle and entitlement accounting.
//!
//! The [`leave`] module owns the request state machine and the derived
//! entitlement ledger; [`sync`] keeps the directory, ledgers, and holiday
//! calendars aligned with the HR system export.

pub mod config;
pub mod error;
pub mod leave;
pub mod sync;
pub mod telemetry;
