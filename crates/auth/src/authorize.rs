use std::collections::BTreeSet;

use thiserror::Error;

use stockella_core::UserId;

use crate::{permissions_for_role, JwtClaims, Permission, Role};

/// The authenticated caller and its capability set.
///
/// Every engine and service operation takes an `Actor`; the permission check
/// happens at that boundary, not in the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Actor {
    pub fn new(user_id: UserId, roles: Vec<Role>, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            roles,
            permissions,
        }
    }

    /// Resolve permissions from the role mapping.
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let mut permissions: Vec<Permission> = Vec::new();
        for role in &roles {
            for p in permissions_for_role(role.as_str()) {
                if !permissions.contains(&p) {
                    permissions.push(p);
                }
            }
        }
        Self::new(user_id, roles, permissions)
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::from_roles(claims.sub, claims.roles.clone())
    }

    pub fn can(&self, required: &Permission) -> bool {
        authorize(self, required).is_ok()
    }

    /// Sorted, de-duplicated permission names (for display).
    pub fn permission_names(&self) -> Vec<String> {
        self.permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize an actor for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(actor: &Actor, required: &Permission) -> Result<(), AuthzError> {
    let granted = actor
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions;

    fn actor(role: &'static str) -> Actor {
        Actor::from_roles(UserId::new(), vec![Role::new(role)])
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let admin = actor(Role::ADMIN);
        assert!(admin.can(&permissions::CONFIG_MANAGE));
        assert!(admin.can(&permissions::AUDIT_READ));
        assert!(admin.can(&Permission::new("anything.at.all")));
    }

    #[test]
    fn missing_permission_is_forbidden_with_its_name() {
        let viewer = actor(Role::VIEWER);
        assert_eq!(
            authorize(&viewer, &permissions::MOVEMENTS_CREATE),
            Err(AuthzError::Forbidden("movements.create".into()))
        );
    }

    #[test]
    fn permissions_are_merged_across_roles() {
        let a = Actor::from_roles(
            UserId::new(),
            vec![Role::new(Role::EMPLOYEE), Role::new(Role::VIEWER)],
        );
        assert!(a.can(&permissions::MOVEMENTS_CREATE));
        assert!(a.can(&permissions::ALERTS_READ));
        let names = a.permission_names();
        let mut sorted = names.clone();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert_eq!(names.iter().filter(|n| *n == "products.read").count(), 1);
    }

    #[test]
    fn actor_without_roles_can_do_nothing() {
        let a = Actor::from_roles(UserId::new(), Vec::new());
        assert!(!a.can(&permissions::PRODUCTS_READ));
    }
}
