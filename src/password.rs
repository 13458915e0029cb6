//! Password hashing (argon2, PHC string format)

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password does not match")]
    Mismatch,
}

/// Hash `password` with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `Ok(())` if `password` matches `hashed_password`
pub fn check_password(password: &str, hashed_password: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hashed_password)
        .map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::distributions::Alphanumeric;

    fn random_string(len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    #[test]
    fn test_hash_and_check() {
        let password = random_string(6);
        let hashed1 = hash_password(&password).unwrap();
        assert!(!hashed1.is_empty());
        assert!(check_password(&password, &hashed1).is_ok());

        let wrong = format!("{}x", password);
        assert_eq!(check_password(&wrong, &hashed1), Err(PasswordError::Mismatch));

        // Same input, different salt
        let hashed2 = hash_password(&password).unwrap();
        assert_ne!(hashed1, hashed2);
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            check_password("secret", "not-a-phc-string"),
            Err(PasswordError::MalformedHash(_))
        ));
    }
}
