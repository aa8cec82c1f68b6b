//! `lessonbay-auth`: pure authentication/authorization boundary for class access.
//!
//! This crate is intentionally decoupled from HTTP. Storage, moderation state and
//! the credential provider are reached only through the traits declared here.

pub mod authorize;
pub mod capability;
pub mod class;
pub mod claims;
pub mod entitlement;
pub mod identity;
pub mod moderation;
pub mod principal;
pub mod roles;
pub mod store;

pub use authorize::{
    authorize, can_administer, can_create_class, AuthorizationGate, Decision, DenyReason, GateError, KickOutcome,
};
pub use capability::Capability;
pub use class::ClassResource;
pub use claims::{
    CredentialError, CredentialVerifier, Hs256CredentialVerifier, IdentityClaims, ProviderIdentity,
    TokenValidationError, validate_claims,
};
pub use entitlement::{
    compute_end_at, is_active, DurationUnits, Enrollment, EnrollmentState, EnrollmentStatus, PlanType,
    Purchase,
};
pub use identity::{reconcile, AuthError, IdentityResolver};
pub use moderation::{clamp_ban_minutes, KickRecord, ModerationRegistry};
pub use principal::Principal;
pub use roles::Role;
pub use store::{ClassStore, EnrollmentStore, StoreError, UserStore};
