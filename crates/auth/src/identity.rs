//! Credential → principal resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{CredentialError, CredentialVerifier, Principal, ProviderIdentity, Role, StoreError, UserStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("account suspended")]
    SuspendedAccount,

    /// Store or provider failure; says nothing about the caller's credential.
    #[error("identity resolution failed: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<CredentialError> for AuthError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Unavailable(msg) => AuthError::Internal(msg),
            _ => AuthError::Unauthenticated,
        }
    }
}

/// Merge the provider's view of a user with the local record.
///
/// Precedence, per field:
/// - `role`, `suspended`, `suspended_until`, `suspension_reason`: local record, when
///   one exists; otherwise provider role hint (default student) and not suspended.
/// - `email`, `display_name`: provider. A missing or blank name hint keeps the local
///   name, falling back to the email's local part for new records.
pub fn reconcile(provider: &ProviderIdentity, local: Option<&Principal>) -> Principal {
    let hinted_name = provider
        .display_name_hint
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    match local {
        Some(local) => Principal {
            id: provider.id,
            email: provider.email.clone(),
            display_name: hinted_name
                .map(str::to_string)
                .unwrap_or_else(|| local.display_name.clone()),
            role: local.role,
            suspended: local.suspended,
            suspended_until: local.suspended_until,
            suspension_reason: local.suspension_reason.clone(),
        },
        None => {
            let fallback = provider.email.split('@').next().unwrap_or_default();
            Principal::new(
                provider.id,
                provider.email.clone(),
                hinted_name.unwrap_or(fallback),
                Role::from_hint(provider.role_hint.as_deref()),
            )
        }
    }
}

/// Turns bearer credentials into reconciled, non-suspended principals.
pub struct IdentityResolver {
    verifier: Arc<dyn CredentialVerifier>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, users: Arc<dyn UserStore>) -> Self {
        Self { verifier, users }
    }

    /// Resolve a credential.
    ///
    /// The local record is written only as the last step of a successful resolution,
    /// so a request dropped while awaiting the provider or the store leaves no trace.
    /// Suspended accounts are rejected before the write. The write syncs profile
    /// fields only; role and suspension come back from the store, so an admin change
    /// that lands between the read and the write is kept and applied to this request.
    pub async fn resolve(&self, credential: Option<&str>, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let identity = self.verifier.verify(token, now).await.map_err(|e| {
            tracing::debug!(error = %e, "credential verification failed");
            AuthError::from(e)
        })?;

        let local = self.users.get_by_id(identity.id).await?;
        let principal = reconcile(&identity, local.as_ref());

        if principal.is_suspended(now) {
            tracing::info!(user_id = %principal.id, "suspended account attempted access");
            return Err(AuthError::SuspendedAccount);
        }

        let stored = self.users.sync_profile(principal).await?;
        if stored.is_suspended(now) {
            tracing::info!(user_id = %stored.id, "account suspended during resolution");
            return Err(AuthError::SuspendedAccount);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use lessonbay_core::UserId;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn provider(id: UserId, role: Option<&str>) -> ProviderIdentity {
        ProviderIdentity {
            id,
            email: "kim@example.com".to_string(),
            display_name_hint: Some("Kim".to_string()),
            role_hint: role.map(str::to_string),
        }
    }

    /// Verifier that accepts any token equal to a known key.
    struct StaticVerifier(HashMap<String, Result<ProviderIdentity, CredentialError>>);

    #[async_trait]
    impl CredentialVerifier for StaticVerifier {
        async fn verify(&self, token: &str, _now: DateTime<Utc>) -> Result<ProviderIdentity, CredentialError> {
            self.0
                .get(token)
                .cloned()
                .unwrap_or(Err(CredentialError::Rejected("unknown".to_string())))
        }
    }

    type RowEdit = Box<dyn FnOnce(&mut Principal) + Send>;

    #[derive(Default)]
    struct MemUsers {
        rows: Mutex<HashMap<UserId, Principal>>,
        writes: Mutex<usize>,
        /// Applied to the stored row right after a read hands out its snapshot.
        after_read: Mutex<Option<RowEdit>>,
    }

    #[async_trait]
    impl UserStore for MemUsers {
        async fn get_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let snapshot = rows.get(&id).cloned();
            if let (Some(edit), Some(row)) = (self.after_read.lock().unwrap().take(), rows.get_mut(&id)) {
                edit(row);
            }
            Ok(snapshot)
        }

        async fn upsert(&self, user: Principal) -> Result<Principal, StoreError> {
            *self.writes.lock().unwrap() += 1;
            self.rows.lock().unwrap().insert(user.id, user.clone());
            Ok(user)
        }

        async fn sync_profile(&self, user: Principal) -> Result<Principal, StoreError> {
            *self.writes.lock().unwrap() += 1;
            let mut rows = self.rows.lock().unwrap();
            let row = rows.entry(user.id).or_insert_with(|| user.clone());
            row.email = user.email;
            row.display_name = user.display_name;
            Ok(row.clone())
        }

        async fn list(&self) -> Result<Vec<Principal>, StoreError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
    }

    fn resolver(
        tokens: Vec<(&str, Result<ProviderIdentity, CredentialError>)>,
        users: Arc<MemUsers>,
    ) -> IdentityResolver {
        let map = tokens.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        IdentityResolver::new(Arc::new(StaticVerifier(map)), users)
    }

    #[test]
    fn reconcile_without_local_record_uses_provider_values() {
        let id = UserId::new();
        let p = reconcile(&provider(id, Some("teacher")), None);

        assert_eq!(p.role, Role::Teacher);
        assert!(!p.suspended);
        assert_eq!(p.suspended_until, None);
        assert_eq!(p.display_name, "Kim");
    }

    #[test]
    fn reconcile_local_role_and_suspension_override_provider() {
        let id = UserId::new();
        let mut local = Principal::new(id, "old@example.com", "Old Name", Role::Student);
        local.suspend(Some(now() + Duration::hours(1)), Some("abuse".to_string()));

        let p = reconcile(&provider(id, Some("admin")), Some(&local));

        assert_eq!(p.role, Role::Student);
        assert_eq!(p.suspended_until, local.suspended_until);
        assert_eq!(p.suspension_reason.as_deref(), Some("abuse"));
        assert_eq!(p.email, "kim@example.com");
        assert_eq!(p.display_name, "Kim");
    }

    #[test]
    fn reconcile_blank_name_hint_keeps_existing_name() {
        let id = UserId::new();
        let local = Principal::new(id, "kim@example.com", "Kim Local", Role::Teacher);
        let mut identity = provider(id, None);
        identity.display_name_hint = Some("   ".to_string());

        assert_eq!(reconcile(&identity, Some(&local)).display_name, "Kim Local");

        identity.display_name_hint = None;
        assert_eq!(reconcile(&identity, None).display_name, "kim");
    }

    #[tokio::test]
    async fn first_resolution_creates_local_record() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        let r = resolver(vec![("tok", Ok(provider(id, Some("teacher"))))], users.clone());

        let p = r.resolve(Some("tok"), now()).await.unwrap();

        assert_eq!(p.role, Role::Teacher);
        assert_eq!(users.rows.lock().unwrap().get(&id), Some(&p));
    }

    #[tokio::test]
    async fn demoted_local_role_wins_over_token() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        users
            .rows
            .lock()
            .unwrap()
            .insert(id, Principal::new(id, "kim@example.com", "Kim", Role::Student));
        let r = resolver(vec![("tok", Ok(provider(id, Some("admin"))))], users);

        assert_eq!(r.resolve(Some("tok"), now()).await.unwrap().role, Role::Student);
    }

    #[tokio::test]
    async fn missing_and_rejected_credentials_are_unauthenticated() {
        let users = Arc::new(MemUsers::default());
        let r = resolver(vec![], users.clone());

        assert_eq!(r.resolve(None, now()).await, Err(AuthError::Unauthenticated));
        assert_eq!(r.resolve(Some(""), now()).await, Err(AuthError::Unauthenticated));
        assert_eq!(r.resolve(Some("forged"), now()).await, Err(AuthError::Unauthenticated));
        assert_eq!(*users.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_outage_is_internal_not_unauthenticated() {
        let users = Arc::new(MemUsers::default());
        let r = resolver(
            vec![("tok", Err(CredentialError::Unavailable("timeout".to_string())))],
            users,
        );

        assert!(matches!(r.resolve(Some("tok"), now()).await, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn suspended_account_short_circuits_without_write() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        let mut local = Principal::new(id, "kim@example.com", "Kim", Role::Teacher);
        local.suspend(None, None);
        users.rows.lock().unwrap().insert(id, local);
        let r = resolver(vec![("tok", Ok(provider(id, Some("teacher"))))], users.clone());

        assert_eq!(r.resolve(Some("tok"), now()).await, Err(AuthError::SuspendedAccount));
        assert_eq!(*users.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn suspension_landing_mid_resolution_is_kept() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        users
            .rows
            .lock()
            .unwrap()
            .insert(id, Principal::new(id, "old@example.com", "Kim", Role::Student));
        *users.after_read.lock().unwrap() = Some(Box::new(|row: &mut Principal| {
            row.suspend(None, Some("chargeback".to_string()))
        }));
        let r = resolver(vec![("tok", Ok(provider(id, None)))], users.clone());

        assert_eq!(r.resolve(Some("tok"), now()).await, Err(AuthError::SuspendedAccount));

        let stored = users.rows.lock().unwrap().get(&id).cloned().unwrap();
        assert!(stored.suspended);
        assert_eq!(stored.suspension_reason.as_deref(), Some("chargeback"));
        assert_eq!(stored.email, "kim@example.com");
    }

    #[tokio::test]
    async fn demotion_landing_mid_resolution_is_kept() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        users
            .rows
            .lock()
            .unwrap()
            .insert(id, Principal::new(id, "kim@example.com", "Kim", Role::Teacher));
        *users.after_read.lock().unwrap() = Some(Box::new(|row: &mut Principal| row.role = Role::Student));
        let r = resolver(vec![("tok", Ok(provider(id, Some("teacher"))))], users.clone());

        let p = r.resolve(Some("tok"), now()).await.unwrap();

        assert_eq!(p.role, Role::Student);
        assert_eq!(users.rows.lock().unwrap().get(&id).map(|u| u.role), Some(Role::Student));
    }

    #[tokio::test]
    async fn lapsed_timed_suspension_resolves() {
        let id = UserId::new();
        let users = Arc::new(MemUsers::default());
        let mut local = Principal::new(id, "kim@example.com", "Kim", Role::Student);
        local.suspend(Some(now() - Duration::minutes(1)), None);
        users.rows.lock().unwrap().insert(id, local);
        let r = resolver(vec![("tok", Ok(provider(id, None)))], users);

        assert!(r.resolve(Some("tok"), now()).await.is_ok());
    }
}
