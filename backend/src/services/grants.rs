//! Applying grants (approved purchases, completed trainings) to entitlements.
//!
//! Callers are responsible for invoking this exactly once per approval; the
//! repositories guarantee that by claiming the `pending` state first.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::{
    models::{
        entitlement::{EntitlementSet, EntitlementStatus},
        purchase::{Purchase, PurchaseItems},
        training::EntitlementGrant,
    },
    services::expiry,
};

/// A request to create or extend one product's entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub product_key: String,
    pub months: u32,
    pub seats: u32,
    pub license_type: Option<String>,
}

/// Creates or extends the entitlement for `grant.product_key`.
///
/// A grant always leaves the record `active`, even if it was disabled or
/// expired. Seats only grow here; existing device bindings are untouched.
pub fn apply_grant(entitlements: &mut EntitlementSet, grant: &Grant, now: DateTime<Utc>) {
    let is_new = !entitlements.contains(&grant.product_key);
    let entitlement = entitlements.get_or_insert(&grant.product_key);

    entitlement.status = EntitlementStatus::Active;
    entitlement.expires_at = Some(expiry::extend(entitlement.expires_at, grant.months, now));
    entitlement.seats = if is_new {
        grant.seats.max(1)
    } else {
        entitlement.seats.max(grant.seats)
    };
    if let Some(license_type) = &grant.license_type {
        entitlement.license_type = Some(license_type.clone());
    }
}

pub fn apply_all(entitlements: &mut EntitlementSet, grants: &[Grant], now: DateTime<Utc>) {
    for grant in grants {
        apply_grant(entitlements, grant, now);
    }
}

/// Grants produced by approving `purchase`, one per product.
///
/// Cart lines naming the same product collapse to the largest month count
/// and the largest seat count; they are not summed.
pub fn grants_for_purchase(purchase: &Purchase) -> Vec<Grant> {
    match &purchase.items {
        PurchaseItems::Cart { lines } => {
            let mut by_product: BTreeMap<&str, Grant> = BTreeMap::new();
            for line in lines {
                let months = line.months();
                by_product
                    .entry(line.product_key.as_str())
                    .and_modify(|grant| {
                        grant.months = grant.months.max(months);
                        grant.seats = grant.seats.max(line.qty);
                        if line.license_type.is_some() {
                            grant.license_type = line.license_type.clone();
                        }
                    })
                    .or_insert_with(|| Grant {
                        product_key: line.product_key.clone(),
                        months,
                        seats: line.qty,
                        license_type: line.license_type.clone(),
                    });
            }
            by_product.into_values().collect()
        }
        PurchaseItems::Legacy {
            product_key,
            requested_months,
            approved_months,
        } => {
            let months = approved_months
                .filter(|months| *months > 0)
                .unwrap_or(*requested_months);
            // A zero-month record would reactivate without extending.
            if months == 0 {
                return Vec::new();
            }
            vec![Grant {
                product_key: product_key.clone(),
                months,
                seats: 1,
                license_type: None,
            }]
        }
    }
}

/// Grants configured on a training, applied when installation completes.
pub fn grants_for_training(grants: &[EntitlementGrant]) -> Vec<Grant> {
    grants
        .iter()
        .map(|grant| Grant {
            product_key: grant.product_key.clone(),
            months: grant.months,
            seats: grant.seats,
            license_type: grant.license_type.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            entitlement::DeviceBinding,
            purchase::{BillingInterval, PurchaseLine, PurchaseStatus},
        },
        types::{PurchaseId, UserId},
    };
    use chrono::{Duration, Months, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 10, 0, 0).unwrap()
    }

    fn grant(product_key: &str, months: u32, seats: u32) -> Grant {
        Grant {
            product_key: product_key.into(),
            months,
            seats,
            license_type: None,
        }
    }

    fn purchase(items: PurchaseItems) -> Purchase {
        Purchase {
            id: PurchaseId::new(),
            user_id: UserId::new(),
            email: "buyer@example.com".into(),
            items,
            coupon_code: None,
            subtotal: 0,
            discount: 0,
            total: 0,
            currency: "NGN".into(),
            status: PurchaseStatus::Approved,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn line(product_key: &str, qty: u32, periods: u32, interval: BillingInterval) -> PurchaseLine {
        PurchaseLine {
            product_key: product_key.into(),
            qty,
            periods,
            billing_interval: interval,
            license_type: None,
        }
    }

    #[test]
    fn first_grant_creates_an_active_entitlement() {
        let mut set = EntitlementSet::new();
        apply_grant(&mut set, &grant("rategen", 1, 2), now());

        let entitlement = set.get("rategen").expect("created");
        assert_eq!(entitlement.status, EntitlementStatus::Active);
        assert_eq!(entitlement.seats, 2);
        assert_eq!(
            entitlement.expires_at,
            Some(now().checked_add_months(Months::new(1)).unwrap())
        );
        assert!(entitlement.devices.is_empty());
    }

    #[test]
    fn zero_seat_grant_still_yields_one_seat() {
        let mut set = EntitlementSet::new();
        apply_grant(&mut set, &grant("rategen", 1, 0), now());
        assert_eq!(set.get("rategen").unwrap().seats, 1);
    }

    #[test]
    fn grant_reactivates_disabled_and_inactive_entitlements() {
        for status in [EntitlementStatus::Disabled, EntitlementStatus::Inactive] {
            let mut set = EntitlementSet::new();
            let entitlement = set.get_or_insert("revit");
            entitlement.status = status;
            entitlement.expires_at = Some(now() + Duration::days(90));

            apply_grant(&mut set, &grant("revit", 1, 1), now());
            assert_eq!(set.get("revit").unwrap().status, EntitlementStatus::Active);
        }
    }

    #[test]
    fn renewal_stacks_on_remaining_time() {
        let mut set = EntitlementSet::new();
        let current = now() + Duration::days(10);
        set.get_or_insert("revit").expires_at = Some(current);

        apply_grant(&mut set, &grant("revit", 3, 1), now());
        assert_eq!(
            set.get("revit").unwrap().expires_at,
            Some(current.checked_add_months(Months::new(3)).unwrap())
        );
    }

    #[test]
    fn seats_never_shrink_via_grants() {
        let sequences: [&[u32]; 4] = [&[1, 3, 2], &[5, 1], &[2, 2, 2], &[1]];
        for seats in sequences {
            let mut set = EntitlementSet::new();
            set.get_or_insert("rategen").seats = 2;
            for &requested in seats {
                apply_grant(&mut set, &grant("rategen", 1, requested), now());
            }
            let expected = seats.iter().copied().max().unwrap().max(2);
            assert_eq!(set.get("rategen").unwrap().seats, expected, "{seats:?}");
        }
    }

    #[test]
    fn grants_leave_device_bindings_alone() {
        let mut set = EntitlementSet::new();
        set.get_or_insert("rategen")
            .devices
            .push(DeviceBinding::new("fp".into(), None, now()));
        apply_grant(&mut set, &grant("rategen", 1, 1), now());
        assert_eq!(set.get("rategen").unwrap().devices.len(), 1);
    }

    #[test]
    fn license_type_is_recorded_when_supplied() {
        let mut set = EntitlementSet::new();
        let mut with_type = grant("revit", 1, 1);
        with_type.license_type = Some("commercial".into());
        apply_grant(&mut set, &with_type, now());
        apply_grant(&mut set, &grant("revit", 1, 1), now());
        assert_eq!(
            set.get("revit").unwrap().license_type.as_deref(),
            Some("commercial")
        );
    }

    #[test]
    fn duplicate_cart_lines_take_the_max_months_not_the_sum() {
        let purchase = purchase(PurchaseItems::Cart {
            lines: vec![
                line("rategen", 1, 1, BillingInterval::Monthly),
                line("rategen", 2, 3, BillingInterval::Monthly),
            ],
        });
        assert_eq!(grants_for_purchase(&purchase), vec![grant("rategen", 3, 2)]);
    }

    #[test]
    fn cart_lines_convert_yearly_periods_to_months() {
        let purchase = purchase(PurchaseItems::Cart {
            lines: vec![
                line("revit", 3, 2, BillingInterval::Yearly),
                line("rategen", 1, 6, BillingInterval::Monthly),
            ],
        });
        assert_eq!(
            grants_for_purchase(&purchase),
            vec![grant("rategen", 6, 1), grant("revit", 24, 3)]
        );
    }

    #[test]
    fn legacy_purchases_prefer_approved_months() {
        let requested_only = purchase(PurchaseItems::Legacy {
            product_key: "rategen".into(),
            requested_months: 6,
            approved_months: None,
        });
        assert_eq!(grants_for_purchase(&requested_only), vec![grant("rategen", 6, 1)]);

        let approved = purchase(PurchaseItems::Legacy {
            product_key: "rategen".into(),
            requested_months: 6,
            approved_months: Some(3),
        });
        assert_eq!(grants_for_purchase(&approved), vec![grant("rategen", 3, 1)]);
    }

    #[test]
    fn legacy_purchases_without_months_grant_nothing() {
        let empty = purchase(PurchaseItems::Legacy {
            product_key: "rategen".into(),
            requested_months: 0,
            approved_months: None,
        });
        assert!(grants_for_purchase(&empty).is_empty());

        let zero_approval = purchase(PurchaseItems::Legacy {
            product_key: "rategen".into(),
            requested_months: 4,
            approved_months: Some(0),
        });
        assert_eq!(grants_for_purchase(&zero_approval), vec![grant("rategen", 4, 1)]);

        let mut set = EntitlementSet::new();
        apply_grant(&mut set, &grant("rategen", 2, 1), now());
        set.get_mut("rategen").unwrap().status = EntitlementStatus::Disabled;
        apply_all(&mut set, &grants_for_purchase(&empty), now());
        assert_eq!(set.get("rategen").unwrap().status, EntitlementStatus::Disabled);
    }

    #[test]
    fn training_grants_map_one_to_one() {
        let grants = grants_for_training(&[
            EntitlementGrant {
                product_key: "revit".into(),
                months: 12,
                seats: 1,
                license_type: Some("student".into()),
            },
            EntitlementGrant {
                product_key: "bimCourse".into(),
                months: 6,
                seats: 1,
                license_type: None,
            },
        ]);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].license_type.as_deref(), Some("student"));

        let mut set = EntitlementSet::new();
        apply_all(&mut set, &grants, now());
        assert!(set.get("revit").unwrap().has_access(now()));
        assert!(set.get("bimCourse").unwrap().has_access(now()));
    }
}
