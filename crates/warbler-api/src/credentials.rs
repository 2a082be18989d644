//! Account creation and password checks.

use anyhow::anyhow;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use uuid::Uuid;

use warbler_db::models::{NewUser, UserRow};
use warbler_db::{Database, UniqueField, unique_violation};

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("{} already taken", taken_label(.0))]
    Taken(UniqueField),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub fn taken_label(field: &UniqueField) -> &'static str {
    match field {
        UniqueField::Username => "Username",
        UniqueField::Email => "Email",
    }
}

/// Argon2id hashing with configurable cost. Verification reads the cost back
/// out of the stored PHC string, so changing it never locks anyone out.
#[derive(Clone)]
pub struct Hasher {
    params: Params,
    /// Hash checked against when the username is unknown, so a failed login
    /// costs the same either way.
    dummy_hash: String,
}

impl Hasher {
    pub fn with_cost(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        let dummy_hash = hash_with(&params, &Uuid::new_v4().to_string())?;
        Ok(Self { params, dummy_hash })
    }

    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        hash_with(&self.params, password)
    }
}

fn hash_with(params: &Params, password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub struct Signup<'a> {
    pub username: &'a str,
    pub email: &'a str,
    /// `None` models an absent form field.
    pub password: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Hash the password and store a new user. An empty or absent password is
/// rejected before storage is touched.
pub fn signup(db: &Database, hasher: &Hasher, req: Signup<'_>) -> Result<UserRow, SignupError> {
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or(SignupError::EmptyPassword)?;

    let password_hash = hasher.hash(password)?;
    let id = Uuid::new_v4().to_string();

    db.create_user(&NewUser {
        id: &id,
        username: req.username,
        email: req.email,
        password_hash: &password_hash,
        image_url: req.image_url,
    })
    .map_err(|e| match unique_violation(&e) {
        Some(field) => SignupError::Taken(field),
        None => SignupError::Storage(e),
    })
}

/// Returns the user when the username exists and the password matches.
/// An unknown username and a wrong password both yield `None`.
pub fn authenticate(
    db: &Database,
    hasher: &Hasher,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<UserRow>> {
    let Some(user) = db.get_user_by_username(username)? else {
        verify_password(password, &hasher.dummy_hash)?;
        return Ok(None);
    };

    if verify_password(password, &user.password)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}
