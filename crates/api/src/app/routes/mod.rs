use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod admin;
pub mod auth;
pub mod classes;
pub mod enrollments;
pub mod live;
pub mod system;

/// Routes that serve guests too; a credential, when sent, must still be valid.
pub fn guest_router() -> Router {
    Router::new()
        .route("/api/classes", get(classes::list_classes))
        .route("/api/classes/:id/access/:capability", get(classes::probe_access))
}

/// Routes that require a resolved, non-suspended caller.
pub fn protected_router() -> Router {
    Router::new()
        .route("/api/me", get(system::whoami))
        .route("/api/me/enrollments", get(enrollments::my_enrollments))
        .route("/api/classes", post(classes::create_class))
        .route("/api/classes/:id", delete(classes::delete_class))
        .route("/api/classes/:id/enroll", post(enrollments::enroll))
        .nest("/api/live", live::router())
        .nest("/api/admin", admin::router())
}
