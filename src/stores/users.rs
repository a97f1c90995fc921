//! User accounts.
//!
//! Emails are stored normalized (trimmed, lowercase) and are unique; the
//! check happens at write time in every implementation. Passwords are
//! hashed before they reach any store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::password;

pub const DUPLICATE_EMAIL: &str = "El email ya está registrado";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "vendedor")]
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "vendedor",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The non-secret part of a [`User`]: what the API returns and what tokens
/// carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fechaModificacion")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait UserStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    /// All users, ordered by name.
    async fn find_all(&self) -> Result<Vec<User>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_active(&self) -> Result<Vec<User>>;

    /// Hashes the password and rejects emails already in use.
    async fn create(&self, user: NewUser) -> Result<User>;
    /// Returns `None` when the user does not exist. A supplied password is
    /// re-hashed.
    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>>;
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
    async fn count_active(&self) -> Result<u64>;

    /// Compares a plaintext password against the stored hash. Only the
    /// login flow should need this.
    fn verify_password(&self, user: &User, password: &str) -> bool {
        password::verify_password(password, &user.password_hash)
    }
}

pub(crate) fn sort_by_name(users: &mut [User]) {
    users.sort_by_key(|u| u.name.to_lowercase());
}

/// A [`UserChanges`] whose new password, if any, is already hashed. Built
/// before a store takes any lock.
pub(crate) struct HashedChanges {
    changes: UserChanges,
    password_hash: Option<String>,
}

impl HashedChanges {
    pub(crate) fn new(mut changes: UserChanges) -> Result<Self> {
        let password_hash = changes
            .password
            .take()
            .map(|plain| password::hash_password(&plain))
            .transpose()?;
        Ok(Self {
            changes,
            password_hash,
        })
    }

    pub(crate) fn email(&self) -> Option<String> {
        self.changes.email.as_deref().map(normalize_email)
    }
}

/// Applies a partial update in place: stores the new hash, normalizes a
/// supplied email and bumps the modification timestamp. Email uniqueness is
/// left to the caller, which can see the other users.
pub(crate) fn apply_changes(user: &mut User, hashed: HashedChanges) {
    let HashedChanges {
        changes,
        password_hash,
    } = hashed;
    if let Some(hash) = password_hash {
        user.password_hash = hash;
    }
    if let Some(email) = changes.email.as_deref() {
        user.email = normalize_email(email);
    }
    if let Some(name) = changes.name {
        user.name = name;
    }
    if let Some(role) = changes.role {
        user.role = role;
    }
    if let Some(active) = changes.active {
        user.active = active;
    }
    user.updated_at = Utc::now();
}

/// Fallback account store used when no document database is configured.
/// Lives for the lifetime of the process and is lost on restart.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        sort_by_name(&mut users);
        Ok(users)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_active(&self) -> Result<Vec<User>> {
        let mut users: Vec<_> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.active)
            .cloned()
            .collect();
        sort_by_name(&mut users);
        Ok(users)
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let email = normalize_email(&user.email);
        let password_hash = password::hash_password(&user.password)?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(Error::validation(DUPLICATE_EMAIL));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email,
            password_hash,
            role: user.role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>> {
        let changes = HashedChanges::new(changes)?;

        let mut users = self.users.write().await;
        let Some(mut updated) = users.get(id).cloned() else {
            return Ok(None);
        };

        if let Some(email) = changes.email() {
            if users.values().any(|u| u.email == email && u.id != id) {
                return Err(Error::validation(DUPLICATE_EMAIL));
            }
        }
        apply_changes(&mut updated, changes);

        users.insert(updated.id.clone(), updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn count_active(&self) -> Result<u64> {
        Ok(self.users.read().await.values().filter(|u| u.active).count() as u64)
    }
}
