use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(password_hash.to_string())
}

/// `Ok(false)` for a wrong password; `Err` only for an unparsable hash.
pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification error: {}", e)),
    }
}

/// Checks a login attempt against an optional stored hash.
///
/// Unknown accounts still pay for one hash so response timing does not
/// reveal which emails are registered.
pub fn verify_login(password: &str, hash: Option<&str>) -> anyhow::Result<bool> {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            hash_password(password)?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let pw = "Corr3ct-horse";
        let hash = hash_password(pw).expect("hash should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(pw, &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn unknown_accounts_never_verify() {
        assert!(!verify_login("anything", None).unwrap());
    }

    #[test]
    fn malformed_hashes_are_errors() {
        assert!(verify_password("pw", "not-a-hash").is_err());
    }
}
