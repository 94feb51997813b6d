//! `stockella-auth` - pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API layer
//! turns a bearer token into an [`Actor`], and every service call receives
//! that actor as its capability set.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{authorize, Actor, AuthzError};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, IssuedToken, JwtValidator, TokenIssueError};
pub use password::{Argon2PasswordHasher, PasswordError, PasswordHasher};
pub use permissions::Permission;
pub use roles::{permissions_for_role, Role};
pub use user::{normalize_email, NewUser, Password, User, UserPatch, UserPatchOutcome};
