use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

/// Working-day count for a date range, split by calendar year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingDays {
    pub total: u32,
    pub by_year: BTreeMap<i32, u32>,
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Count Monday-to-Friday dates in `[start, end]` that `is_holiday` does not
/// exclude. An inverted range counts nothing.
pub fn count_working_days<F, E>(
    start: NaiveDate,
    end: NaiveDate,
    mut is_holiday: F,
) -> Result<WorkingDays, E>
where
    F: FnMut(NaiveDate) -> Result<bool, E>,
{
    let mut days = WorkingDays::default();
    let mut cursor = Some(start);

    while let Some(date) = cursor.filter(|date| *date <= end) {
        if is_weekday(date) && !is_holiday(date)? {
            days.total += 1;
            *days.by_year.entry(date.year()).or_insert(0) += 1;
        }
        cursor = date.succ_opt();
    }

    Ok(days)
}
