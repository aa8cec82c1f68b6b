use lessonbay_auth::{Principal, Role};
use lessonbay_core::UserId;

/// Resolved caller for an authenticated request.
///
/// Inserted by the auth middleware; handlers never see an unresolved credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}

/// Caller on routes that also serve guests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaybePrincipal(pub Option<PrincipalContext>);

impl MaybePrincipal {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref().map(PrincipalContext::principal)
    }
}
