//! User administration rules over an external user store.
//!
//! Login and sessions live outside this crate; callers pass the acting
//! user's id and role explicitly.

use crate::error::UserError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const MIN_PASSWORD_LEN: usize = 6;

const HASH_ROUNDS: u32 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    #[serde(rename = "administrador")]
    Administrator,
    #[default]
    #[serde(rename = "usuario")]
    User,
}

impl Role {
    /// Parses a stored role value; anything unrecognised is a plain user.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "administrador" | "admin" | "administrator" => Role::Administrator,
            _ => Role::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "administrador",
            Role::User => "usuario",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

/// Capability check for admin-only operations.
pub fn is_admin(role: Role) -> bool {
    matches!(role, Role::Administrator)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub fullname: String,
    pub role: Role,
}

/// Fields accepted when creating or editing a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserForm {
    pub username: String,
    /// Required on create; on update an empty value keeps the old password.
    pub password: String,
    pub fullname: String,
    pub role: Role,
}

/// The user who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub role: Role,
}

/// Persistence for user records. Implementations own password hashing.
pub trait UserStore {
    fn get(&self, id: u64) -> Option<User>;
    /// All users, newest (highest id) first.
    fn list(&self) -> Vec<User>;
    fn username_exists(&self, username: &str, exclude_id: Option<u64>) -> bool;
    fn count_admins(&self) -> usize;
    fn insert(&mut self, form: &UserForm) -> u64;
    /// Returns false if `id` does not exist. `password` of `None` keeps the
    /// stored one.
    fn update(&mut self, id: u64, form: &UserForm, password: Option<&str>) -> bool;
    fn delete(&mut self, id: u64) -> bool;
}

/// Enforces the administration rules on top of a [`UserStore`].
pub struct UserAdmin<S> {
    store: S,
}

impl<S: UserStore> UserAdmin<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list_users(&self, actor: Actor) -> Result<Vec<User>, UserError> {
        require_admin(actor)?;
        Ok(self.store.list())
    }

    pub fn get_user(&self, actor: Actor, id: u64) -> Result<User, UserError> {
        require_admin(actor)?;
        self.store.get(id).ok_or(UserError::NotFound(id))
    }

    pub fn create_user(&mut self, actor: Actor, form: UserForm) -> Result<u64, UserError> {
        require_admin(actor)?;
        let form = normalized(form);
        if form.username.is_empty() {
            return Err(UserError::MissingField("username"));
        }
        // Stored as given; only edits trim the password.
        if form.password.is_empty() {
            return Err(UserError::MissingField("password"));
        }
        check_password(&form.password)?;
        if self.store.username_exists(&form.username, None) {
            return Err(UserError::UsernameTaken(form.username));
        }
        let id = self.store.insert(&form);
        tracing::info!("created user '{}' as {}", form.username, form.role.as_str());
        Ok(id)
    }

    pub fn update_user(&mut self, actor: Actor, id: u64, form: UserForm) -> Result<(), UserError> {
        require_admin(actor)?;
        let mut form = normalized(form);
        form.password = form.password.trim().to_string();
        if form.username.is_empty() {
            return Err(UserError::MissingField("username"));
        }
        if self.store.username_exists(&form.username, Some(id)) {
            return Err(UserError::UsernameTaken(form.username));
        }
        let password = (!form.password.is_empty()).then_some(form.password.as_str());
        if let Some(pw) = password {
            check_password(pw)?;
        }
        let current = self.store.get(id).ok_or(UserError::NotFound(id))?;
        if is_admin(current.role) && !is_admin(form.role) && self.store.count_admins() <= 1 {
            return Err(UserError::LastAdministrator);
        }
        if !self.store.update(id, &form, password) {
            return Err(UserError::NotFound(id));
        }
        tracing::info!(
            "updated user '{}'{}",
            form.username,
            if password.is_some() { " with new password" } else { "" }
        );
        Ok(())
    }

    pub fn delete_user(&mut self, actor: Actor, id: u64) -> Result<User, UserError> {
        require_admin(actor)?;
        if actor.id == id {
            return Err(UserError::SelfDeletion);
        }
        let user = self.store.get(id).ok_or(UserError::NotFound(id))?;
        if is_admin(user.role) && self.store.count_admins() <= 1 {
            return Err(UserError::LastAdministrator);
        }
        if !self.store.delete(id) {
            return Err(UserError::NotFound(id));
        }
        tracing::info!("deleted user '{}'", user.username);
        Ok(user)
    }
}

fn require_admin(actor: Actor) -> Result<(), UserError> {
    if is_admin(actor.role) {
        Ok(())
    } else {
        Err(UserError::Forbidden)
    }
}

fn check_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

fn normalized(mut form: UserForm) -> UserForm {
    form.username = form.username.trim().to_string();
    form.fullname = form.fullname.trim().to_string();
    form
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

/// Process-local [`UserStore`] for tests and single-process tools. Passwords
/// are kept as iterated SHA-256 digests salted with the user id; this is not
/// a substitute for a dedicated password hash (PBKDF2, argon2) in a
/// persistent deployment.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: BTreeMap<u64, StoredUser>,
    next_id: u64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `password` matches the stored digest for `username`.
    pub fn verify_password(&self, username: &str, password: &str) -> bool {
        self.users
            .values()
            .find(|u| u.user.username == username)
            .is_some_and(|u| u.password_hash == hash_password(u.user.id, password))
    }
}

impl UserStore for InMemoryUserStore {
    fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|u| u.user.clone())
    }

    fn list(&self) -> Vec<User> {
        self.users.values().rev().map(|u| u.user.clone()).collect()
    }

    fn username_exists(&self, username: &str, exclude_id: Option<u64>) -> bool {
        self.users
            .values()
            .any(|u| u.user.username == username && Some(u.user.id) != exclude_id)
    }

    fn count_admins(&self) -> usize {
        self.users.values().filter(|u| is_admin(u.user.role)).count()
    }

    fn insert(&mut self, form: &UserForm) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.users.insert(
            id,
            StoredUser {
                user: User {
                    id,
                    username: form.username.clone(),
                    fullname: form.fullname.clone(),
                    role: form.role,
                },
                password_hash: hash_password(id, &form.password),
            },
        );
        id
    }

    fn update(&mut self, id: u64, form: &UserForm, password: Option<&str>) -> bool {
        let Some(stored) = self.users.get_mut(&id) else {
            return false;
        };
        stored.user.username = form.username.clone();
        stored.user.fullname = form.fullname.clone();
        stored.user.role = form.role;
        if let Some(pw) = password {
            stored.password_hash = hash_password(id, pw);
        }
        true
    }

    fn delete(&mut self, id: u64) -> bool {
        self.users.remove(&id).is_some()
    }
}

fn hash_password(id: u64, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(password.as_bytes());
        digest = hasher.finalize();
    }
    hex::encode(digest)
}
