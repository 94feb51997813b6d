//! User accounts: who may log in, and with which role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockella_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A user account.
///
/// `password_hash` never leaves the process: it is skipped when serializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Trimmed and lowercased; unique across accounts.
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub password_hash: String,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }

    fn audit_label(&self) -> String {
        format!("user '{}'", self.email)
    }
}

/// A plaintext password that passed the length rule. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: String) -> DomainResult<Self> {
        if raw.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub active: Option<bool>,
}

impl NewUser {
    /// Validate and build the account. The caller hashes the returned password
    /// into `password_hash` before storing.
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> DomainResult<(User, Password)> {
        let password = Password::parse(self.password)?;
        let user = User {
            id,
            name: name(&self.name)?,
            email: normalize_email(&self.email)?,
            role: role(&self.role)?,
            active: self.active.unwrap_or(true),
            created_at: now,
            password_hash: String::new(),
        };
        Ok((user, password))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// What an applied [`UserPatch`] changed that the caller must act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatchOutcome {
    pub email_changed: bool,
    pub role_changed: bool,
    pub deactivated: bool,
    /// To be hashed into `password_hash`.
    pub new_password: Option<Password>,
}

impl User {
    /// Apply a partial update; the account is untouched on error.
    pub fn apply_patch(&mut self, patch: UserPatch) -> DomainResult<UserPatchOutcome> {
        let name = patch.name.as_deref().map(name).transpose()?;
        let email = patch.email.as_deref().map(normalize_email).transpose()?;
        let role = patch.role.as_deref().map(role).transpose()?;
        let new_password = patch.password.map(Password::parse).transpose()?;

        let outcome = UserPatchOutcome {
            email_changed: email.as_ref().is_some_and(|e| *e != self.email),
            role_changed: role.as_ref().is_some_and(|r| *r != self.role),
            deactivated: self.active && patch.active == Some(false),
            new_password,
        };

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(role) = role {
            self.role = role;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        Ok(outcome)
    }
}

fn name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("user name is required"));
    }
    Ok(name.to_string())
}

fn role(raw: &str) -> DomainResult<Role> {
    let role = Role::new(raw.trim().to_ascii_lowercase());
    if !role.is_known() {
        return Err(DomainError::validation(format!(
            "unknown role '{}' (expected one of {})",
            raw.trim(),
            Role::KNOWN.join(", ")
        )));
    }
    Ok(role)
}

/// Trim and lowercase; require exactly one `@` with text on both sides and a
/// dotted domain.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("'{}' is not a valid email", raw.trim())));
    }
    Ok(email)
}
