use stockella_auth::{Actor, Role};
use stockella_core::UserId;

/// Principal context for a request (authenticated identity + resolved permissions).
///
/// Inserted by the auth middleware; handlers pass `actor()` to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    actor: Actor,
}

impl PrincipalContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.actor.roles
    }
}
