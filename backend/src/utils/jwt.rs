use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: String,
    /// The user's `refresh_version` at issue time.
    pub rv: i32,
    pub typ: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(user: &User, typ: TokenType, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            rv: user.refresh_version,
            typ,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

pub fn create_token(
    user: &User,
    typ: TokenType,
    secret: &str,
    ttl: Duration,
) -> anyhow::Result<String> {
    let claims = Claims::new(user, typ, Utc::now(), ttl);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

/// Decodes `token` and checks that it is of the expected type.
pub fn verify_token(token: &str, secret: &str, expected: TokenType) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    if token_data.claims.typ != expected {
        anyhow::bail!("expected a {:?} token", expected);
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn user() -> User {
        User::new("bob@example.com", "hash".into(), "Bob".into(), UserRole::MiniAdmin)
    }

    #[test]
    fn access_token_carries_role_and_refresh_version() {
        let mut user = user();
        user.refresh_version = 4;
        let token = create_token(&user, TokenType::Access, "secret", Duration::minutes(15))
            .expect("create token");
        let claims = verify_token(&token, "secret", TokenType::Access).expect("verify token");
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "mini_admin");
        assert_eq!(claims.rv, 4);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let token = create_token(&user(), TokenType::Refresh, "secret", Duration::days(30))
            .expect("create token");
        assert!(verify_token(&token, "secret", TokenType::Access).is_err());
        assert!(verify_token(&token, "secret", TokenType::Refresh).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(&user(), TokenType::Access, "secret", Duration::minutes(15))
            .expect("create token");
        assert!(verify_token(&token, "other", TokenType::Access).is_err());
    }
}
