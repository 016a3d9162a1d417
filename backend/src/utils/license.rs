//! Offline license tokens for the desktop plugins.
//!
//! The token is an HS256 JWT signed with the license secret. It lists every
//! entitlement with its effective status at issue time so a plugin can
//! gate features without calling the API.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::{entitlement::EffectiveStatus, user::User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntitlement {
    pub status: EffectiveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseClaims {
    pub sub: String,
    pub email: String,
    pub ents: BTreeMap<String, LicenseEntitlement>,
    pub iat: i64,
    pub exp: i64,
}

impl LicenseClaims {
    pub fn for_user(user: &User, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ents = user
            .entitlements
            .iter()
            .map(|entitlement| {
                (
                    entitlement.product_key.clone(),
                    LicenseEntitlement {
                        status: entitlement.effective_status(now),
                        exp: entitlement.expires_at.map(|at| at.timestamp()),
                    },
                )
            })
            .collect();

        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            ents,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

pub fn issue_license_token(
    user: &User,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = LicenseClaims::for_user(user, now, ttl);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

pub fn verify_license_token(token: &str, secret: &str) -> anyhow::Result<LicenseClaims> {
    let data = decode::<LicenseClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{entitlement::EntitlementStatus, user::UserRole};

    #[test]
    fn claims_report_effective_status_per_product() {
        let now = Utc::now();
        let mut user = User::new("lic@example.com", "hash".into(), "Lic".into(), UserRole::User);
        let rategen = user.entitlements.get_or_insert("rategen");
        rategen.status = EntitlementStatus::Active;
        rategen.expires_at = Some(now + Duration::days(10));
        let revit = user.entitlements.get_or_insert("revit");
        revit.status = EntitlementStatus::Active;
        revit.expires_at = Some(now - Duration::days(1));
        user.entitlements.get_or_insert("planswift").status = EntitlementStatus::Disabled;

        let token = issue_license_token(&user, "license-secret", Duration::days(15), now)
            .expect("issue");
        let claims = verify_license_token(&token, "license-secret").expect("verify");

        assert_eq!(claims.email, "lic@example.com");
        assert_eq!(claims.exp - claims.iat, 15 * 86_400);
        assert_eq!(claims.ents["rategen"].status, EffectiveStatus::Active);
        assert_eq!(
            claims.ents["rategen"].exp,
            Some((now + Duration::days(10)).timestamp())
        );
        assert_eq!(claims.ents["revit"].status, EffectiveStatus::Expired);
        assert_eq!(claims.ents["planswift"].status, EffectiveStatus::Disabled);
        assert_eq!(claims.ents["planswift"].exp, None);
    }

    #[test]
    fn license_tokens_do_not_verify_with_the_access_secret() {
        let user = User::new("lic@example.com", "hash".into(), "Lic".into(), UserRole::User);
        let token = issue_license_token(&user, "license-secret", Duration::days(15), Utc::now())
            .expect("issue");
        assert!(verify_license_token(&token, "jwt-secret").is_err());
    }
}
