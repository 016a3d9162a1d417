//! Subscription expiry arithmetic.

use chrono::{DateTime, Months, Utc};

/// Extends a subscription by `months` calendar months.
///
/// Renewal stacks on top of remaining time: the base is `current` when it is
/// still in the future, otherwise `now`. Month arithmetic clamps to the last
/// day of the target month (Jan 31 + 1 month lands on Feb 28/29), and
/// saturates instead of overflowing.
pub fn extend(current: Option<DateTime<Utc>>, months: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = match current {
        Some(expires_at) if expires_at > now => expires_at,
        _ => now,
    };
    base.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
