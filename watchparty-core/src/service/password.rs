use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use tokio::task;

use crate::{Error, Result};

pub const MIN_ROOM_PASSWORD_LEN: usize = 1;
pub const MAX_ROOM_PASSWORD_LEN: usize = 128;

/// Reject empty or oversized room passwords before spending a hash on them.
pub fn validate_room_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_ROOM_PASSWORD_LEN..=MAX_ROOM_PASSWORD_LEN).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "Room password must be {MIN_ROOM_PASSWORD_LEN}-{MAX_ROOM_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a room password with Argon2id.
///
/// Room passwords gate short-lived rooms, so this uses the OWASP minimum
/// profile (19 MiB, 2 iterations, 1 lane) rather than account-grade cost.
/// Runs on a blocking thread.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        let params = ParamsBuilder::new()
            .m_cost(19_456)
            .t_cost(2)
            .p_cost(1)
            .output_len(32)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build Argon2 params: {e}")))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
            .to_string();

        Ok(password_hash)
    })
    .await
    .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

/// Verify a password against a stored PHC hash on a blocking thread.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

        // Parameters are read back from the PHC string.
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_password() {
        let hash = hash_password("movie-night").await.unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hash = hash_password("movie-night").await.unwrap();
        assert!(verify_password("movie-night", &hash).await.unwrap());
        assert!(!verify_password("Movie-Night", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_uniqueness() {
        let hash1 = hash_password("same").await.unwrap();
        let hash2 = hash_password("same").await.unwrap();
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_internal_error() {
        let result = verify_password("x", "not-a-phc-string").await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_validate_room_password() {
        assert!(validate_room_password("").is_err());
        assert!(validate_room_password(&"p".repeat(129)).is_err());
        assert!(validate_room_password("secret").is_ok());
    }
}
