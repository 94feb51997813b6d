use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "movements.create").
/// The wildcard permission `"*"` grants everything and is what the `admin`
/// role resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    const fn well_known(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::well_known("*");

pub const PRODUCTS_READ: Permission = Permission::well_known("products.read");
pub const PRODUCTS_WRITE: Permission = Permission::well_known("products.write");
pub const PRODUCTS_DELETE: Permission = Permission::well_known("products.delete");

pub const MOVEMENTS_READ: Permission = Permission::well_known("movements.read");
pub const MOVEMENTS_CREATE: Permission = Permission::well_known("movements.create");

pub const ALERTS_READ: Permission = Permission::well_known("alerts.read");
pub const ALERTS_ACKNOWLEDGE: Permission = Permission::well_known("alerts.acknowledge");

pub const AUDIT_READ: Permission = Permission::well_known("audit.read");

pub const CONFIG_MANAGE: Permission = Permission::well_known("config.manage");

pub const CATEGORIES_MANAGE: Permission = Permission::well_known("categories.manage");

pub const USERS_MANAGE: Permission = Permission::well_known("users.manage");
