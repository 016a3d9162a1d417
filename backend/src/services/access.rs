//! Request-time access decision for a product.

use chrono::{DateTime, Utc};

use crate::{
    error::AccessDenied,
    models::entitlement::{Entitlement, EntitlementStatus},
};

/// Decides whether `entitlement` grants access at `now`.
///
/// Missing and non-active records are `NoSubscription`; an active record past
/// its expiry is `SubscriptionExpired`.
pub fn check_access(
    entitlement: Option<&Entitlement>,
    now: DateTime<Utc>,
) -> Result<&Entitlement, AccessDenied> {
    let entitlement = entitlement.ok_or(AccessDenied::NoSubscription)?;
    if entitlement.status != EntitlementStatus::Active {
        return Err(AccessDenied::NoSubscription);
    }
    if entitlement.is_expired(now) {
        return Err(AccessDenied::SubscriptionExpired);
    }
    Ok(entitlement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
    }

    fn entitlement(status: EntitlementStatus, expires_at: Option<DateTime<Utc>>) -> Entitlement {
        let mut entitlement = Entitlement::new("rategen");
        entitlement.status = status;
        entitlement.expires_at = expires_at;
        entitlement
    }

    #[test]
    fn missing_entitlement_has_no_subscription() {
        assert_eq!(check_access(None, now()), Err(AccessDenied::NoSubscription));
    }

    #[test]
    fn expired_active_entitlement_is_rejected_as_expired() {
        let e = entitlement(EntitlementStatus::Active, Some(now() - Duration::days(1)));
        assert_eq!(
            check_access(Some(&e), now()),
            Err(AccessDenied::SubscriptionExpired)
        );
    }

    #[test]
    fn disabled_wins_over_future_expiry() {
        let e = entitlement(EntitlementStatus::Disabled, Some(now() + Duration::days(300)));
        assert_eq!(check_access(Some(&e), now()), Err(AccessDenied::NoSubscription));
    }

    #[test]
    fn guard_agrees_with_has_access() {
        for status in [
            EntitlementStatus::Active,
            EntitlementStatus::Inactive,
            EntitlementStatus::Disabled,
        ] {
            for offset in [None, Some(-86_400), Some(-1), Some(0), Some(1), Some(86_400)] {
                let expires_at = offset.map(|secs| now() + Duration::seconds(secs));
                let e = entitlement(status, expires_at);
                assert_eq!(
                    check_access(Some(&e), now()).is_ok(),
                    e.has_access(now()),
                    "{status:?} {offset:?}"
                );
            }
        }
    }
}
