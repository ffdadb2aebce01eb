use bcrypt::{hash, verify};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(bcrypt::BcryptError),
    #[error("Password verification failed: {0}")]
    VerificationFailed(bcrypt::BcryptError),
}

/// bcrypt with a configurable cost.
///
/// Holds a hash of a throwaway password so that a login attempt for an
/// unknown account still pays for one full verification.
#[derive(Clone)]
pub struct PasswordManager {
    cost: u32,
    dummy_hash: String,
}

impl PasswordManager {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = hash("doccontrol-dummy-password", cost).map_err(PasswordError::HashingFailed)?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash(password, self.cost).map_err(PasswordError::HashingFailed)
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        verify(password, hash).map_err(PasswordError::VerificationFailed)
    }

    /// Burns the same time as `verify` against a real hash. Always false.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = verify(password, &self.dummy_hash);
        false
    }
}
