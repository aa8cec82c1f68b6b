use std::sync::Arc;

use tokio::task::JoinHandle;

use lessonbay_auth::{
    AuthorizationGate, ClassStore, CredentialVerifier, EnrollmentStore, Hs256CredentialVerifier, IdentityResolver,
    ModerationRegistry, UserStore,
};
use lessonbay_infra::{
    spawn_sweeper, FixedWindowLimiter, InMemoryClassStore, InMemoryEnrollmentStore, InMemoryModerationRegistry,
    InMemoryUserStore, LocalRoomOperator, Mailer, OneTimeCodeStore, RoomOperator, Sweep, TracingMailer,
};

use crate::config::ApiConfig;
use crate::middleware::{RateLimitState, TrustedProxies};

/// Backing stores for users, classes and enrollments.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub classes: Arc<dyn ClassStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            classes: Arc::new(InMemoryClassStore::new()),
            enrollments: Arc::new(InMemoryEnrollmentStore::new()),
        }
    }

    #[cfg(feature = "postgres")]
    pub async fn postgres(database_url: &str) -> anyhow::Result<Self> {
        use lessonbay_infra::store::postgres::{
            migrate, PostgresClassStore, PostgresEnrollmentStore, PostgresUserStore,
        };

        let pool = sqlx::PgPool::connect(database_url).await?;
        migrate(&pool).await?;
        Ok(Self {
            users: Arc::new(PostgresUserStore::new(pool.clone())),
            classes: Arc::new(PostgresClassStore::new(pool.clone())),
            enrollments: Arc::new(PostgresEnrollmentStore::new(pool)),
        })
    }
}

/// Everything a handler can reach.
///
/// Moderation and rate-limit state are owned here, one instance per process.
pub struct AppServices {
    pub users: Arc<dyn UserStore>,
    pub classes: Arc<dyn ClassStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub moderation: Arc<dyn ModerationRegistry>,
    pub gate: AuthorizationGate,
    pub resolver: Arc<IdentityResolver>,
    pub otp_limiter: Arc<FixedWindowLimiter>,
    pub signup_limiter: Arc<FixedWindowLimiter>,
    pub trusted_proxies: TrustedProxies,
    pub otp_codes: Arc<OneTimeCodeStore>,
    pub mailer: Arc<dyn Mailer>,
    pub rooms: Arc<dyn RoomOperator>,
    /// Expiring state purged by the background sweeper.
    sweep_targets: Vec<Arc<dyn Sweep>>,
}

impl AppServices {
    pub fn new(config: &ApiConfig, stores: Stores, mailer: Arc<dyn Mailer>, rooms: Arc<dyn RoomOperator>) -> Self {
        let kicks = Arc::new(InMemoryModerationRegistry::new());
        let moderation: Arc<dyn ModerationRegistry> = kicks.clone();
        let otp_limiter = Arc::new(FixedWindowLimiter::new("otp", config.otp_rule));
        let signup_limiter = Arc::new(FixedWindowLimiter::new("signup", config.signup_rule));
        let otp_codes = Arc::new(OneTimeCodeStore::new(config.otp_ttl));
        let sweep_targets: Vec<Arc<dyn Sweep>> = vec![
            kicks as Arc<dyn Sweep>,
            otp_limiter.clone() as Arc<dyn Sweep>,
            signup_limiter.clone() as Arc<dyn Sweep>,
            otp_codes.clone() as Arc<dyn Sweep>,
        ];
        let verifier: Arc<dyn CredentialVerifier> =
            Arc::new(Hs256CredentialVerifier::new(config.jwt_secret.as_bytes()));

        let gate = AuthorizationGate::new(stores.classes.clone(), stores.enrollments.clone(), moderation.clone());
        let resolver = Arc::new(IdentityResolver::new(verifier, stores.users.clone()));

        Self {
            users: stores.users,
            classes: stores.classes,
            enrollments: stores.enrollments,
            moderation,
            gate,
            resolver,
            otp_limiter,
            signup_limiter,
            trusted_proxies: TrustedProxies::new(config.trusted_proxies.iter().copied()),
            otp_codes,
            mailer,
            rooms,
            sweep_targets,
        }
    }

    /// In-memory stores with the given mailer; used by tests and local runs.
    pub fn in_memory(config: &ApiConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::new(config, Stores::in_memory(), mailer, default_rooms(config))
    }

    /// Start the periodic sweep of kicks, limiter buckets and one-time codes, when
    /// configured.
    pub fn spawn_background(&self, config: &ApiConfig) -> Option<JoinHandle<()>> {
        config
            .moderation_sweep
            .map(|every| spawn_sweeper(self.sweep_targets.clone(), every))
    }

    pub fn otp_rate_limit(&self) -> RateLimitState {
        RateLimitState {
            limiter: self.otp_limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }

    pub fn signup_rate_limit(&self) -> RateLimitState {
        RateLimitState {
            limiter: self.signup_limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

fn default_rooms(config: &ApiConfig) -> Arc<dyn RoomOperator> {
    Arc::new(LocalRoomOperator::new(
        config.room_url.clone(),
        config.room_secret.as_bytes(),
        config.room_token_ttl,
    ))
}

/// Build services from configuration.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);

    if config.persistent_stores {
        #[cfg(feature = "postgres")]
        {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set when USE_PERSISTENT_STORES=true"))?;
            let stores = Stores::postgres(url).await?;
            tracing::info!("using postgres stores");
            return Ok(AppServices::new(config, stores, mailer, default_rooms(config)));
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
        }
    }

    Ok(AppServices::in_memory(config, mailer))
}
