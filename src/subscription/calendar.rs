use time::{util::days_in_year_month, Date, Duration, Month, OffsetDateTime};

use crate::packages::repo_types::{DurationUnit, PlanDuration};

/// Adds a plan duration to `start` using calendar arithmetic.
///
/// Month and year steps keep the day of month when it exists in the target
/// month and clamp to its last day otherwise (Jan 31 + 1 month is Feb 29 in a
/// leap year). Returns `None` when the result leaves the supported date range.
pub fn add_duration(start: OffsetDateTime, duration: PlanDuration) -> Option<OffsetDateTime> {
    let value = i64::from(duration.value);
    match duration.unit {
        DurationUnit::Days => start.checked_add(Duration::days(value)),
        DurationUnit::Months => add_months(start, value),
        DurationUnit::Years => add_months(start, value.checked_mul(12)?),
    }
}

fn add_months(start: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let date = start.date();
    let index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1;
    let target = index.checked_add(months)?;

    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(target.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(days_in_year_month(year, month));

    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(start.replace_date(date))
}
