use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

/// Role identifier used for RBAC.
///
/// Roles travel in the token as opaque strings; [`permissions_for_role`] is the
/// single place where they are turned into permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const EDITOR: &'static str = "editor";
    pub const EMPLOYEE: &'static str = "employee";
    pub const VIEWER: &'static str = "viewer";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Every role the mapping knows; user records may only carry these.
    pub const KNOWN: [&'static str; 4] = [Self::ADMIN, Self::EDITOR, Self::EMPLOYEE, Self::VIEWER];

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission mapping.
///
/// - `admin`: everything
/// - `editor`: catalog and category maintenance, movements, alert and movement reads
/// - `employee`: registers movements, reads products and movements
/// - `viewer`: read-only access to products, movements and alerts
///
/// Unknown roles grant nothing.
pub fn permissions_for_role(role: &str) -> Vec<Permission> {
    match role {
        Role::ADMIN => vec![permissions::ALL],
        Role::EDITOR => vec![
            permissions::PRODUCTS_READ,
            permissions::PRODUCTS_WRITE,
            permissions::CATEGORIES_MANAGE,
            permissions::MOVEMENTS_READ,
            permissions::MOVEMENTS_CREATE,
            permissions::ALERTS_READ,
        ],
        Role::EMPLOYEE => vec![
            permissions::PRODUCTS_READ,
            permissions::MOVEMENTS_READ,
            permissions::MOVEMENTS_CREATE,
        ],
        Role::VIEWER => vec![
            permissions::PRODUCTS_READ,
            permissions::MOVEMENTS_READ,
            permissions::ALERTS_READ,
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_resolves_to_wildcard() {
        let perms = permissions_for_role(Role::ADMIN);
        assert_eq!(perms.len(), 1);
        assert!(perms[0].is_wildcard());
    }

    #[test]
    fn viewer_cannot_register_movements() {
        let perms = permissions_for_role(Role::VIEWER);
        assert!(!perms.contains(&permissions::MOVEMENTS_CREATE));
        assert!(perms.contains(&permissions::MOVEMENTS_READ));
    }

    #[test]
    fn employee_cannot_read_alerts() {
        let perms = permissions_for_role(Role::EMPLOYEE);
        assert!(perms.contains(&permissions::MOVEMENTS_CREATE));
        assert!(!perms.contains(&permissions::ALERTS_READ));
    }

    #[test]
    fn only_admin_manages_users() {
        for role in [Role::EDITOR, Role::EMPLOYEE, Role::VIEWER] {
            assert!(!permissions_for_role(role).contains(&permissions::USERS_MANAGE));
        }
        assert!(permissions_for_role(Role::EDITOR).contains(&permissions::CATEGORIES_MANAGE));
    }

    #[test]
    fn known_roles_are_recognized() {
        assert!(Role::new(Role::EMPLOYEE).is_known());
        assert!(!Role::new("auditor").is_known());
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(permissions_for_role("auditor").is_empty());
    }
}
