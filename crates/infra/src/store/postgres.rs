//! Postgres-backed stores.
//!
//! Each store maps to one table from `migrations/0001_access.sql`. The enrollment
//! table's primary key is `(user_id, class_id)`, so `upsert` overwrites in place.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use lessonbay_auth::{
    ClassResource, ClassStore, DurationUnits, Enrollment, EnrollmentStatus, EnrollmentStore, PlanType, Principal,
    Role, StoreError, UserStore,
};
use lessonbay_core::{ClassId, UserId};

pub const SCHEMA: &str = include_str!("../../migrations/0001_access.sql");

/// Create the tables if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await.map_err(db_error)?;
    Ok(())
}

fn db_error(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "postgres store error");
    StoreError::Unavailable(e.to_string())
}

fn corrupt(e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn user_from_row(row: &PgRow) -> Result<Principal, StoreError> {
    let role: String = row.try_get("role").map_err(corrupt)?;
    Ok(Principal {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(corrupt)?),
        email: row.try_get("email").map_err(corrupt)?,
        display_name: row.try_get("display_name").map_err(corrupt)?,
        role: role.parse::<Role>().map_err(corrupt)?,
        suspended: row.try_get("suspended").map_err(corrupt)?,
        suspended_until: row.try_get::<Option<DateTime<Utc>>, _>("suspended_until").map_err(corrupt)?,
        suspension_reason: row.try_get("suspension_reason").map_err(corrupt)?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, display_name, role, suspended, suspended_until, suspension_reason
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn upsert(&self, user: Principal) -> Result<Principal, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, role, suspended, suspended_until, suspension_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                suspended = EXCLUDED.suspended,
                suspended_until = EXCLUDED.suspended_until,
                suspension_reason = EXCLUDED.suspension_reason
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.suspended)
        .bind(user.suspended_until)
        .bind(&user.suspension_reason)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(user)
    }

    async fn sync_profile(&self, user: Principal) -> Result<Principal, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, role, suspended, suspended_until, suspension_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name
            RETURNING id, email, display_name, role, suspended, suspended_until, suspension_reason
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.suspended)
        .bind(user.suspended_until)
        .bind(&user.suspension_reason)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        user_from_row(&row)
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, display_name, role, suspended, suspended_until, suspension_reason
            FROM users
            ORDER BY email
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(user_from_row).collect()
    }
}

pub struct PostgresClassStore {
    pool: Arc<PgPool>,
}

impl PostgresClassStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn class_from_row(row: &PgRow) -> Result<ClassResource, StoreError> {
    Ok(ClassResource {
        id: ClassId::from_uuid(row.try_get::<Uuid, _>("id").map_err(corrupt)?),
        teacher_id: UserId::from_uuid(row.try_get::<Uuid, _>("teacher_id").map_err(corrupt)?),
        title: row.try_get("title").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
    })
}

#[async_trait]
impl ClassStore for PostgresClassStore {
    async fn get_by_id(&self, id: ClassId) -> Result<Option<ClassResource>, StoreError> {
        let row = sqlx::query("SELECT id, teacher_id, title, created_at FROM classes WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(class_from_row).transpose()
    }

    async fn insert(&self, class: ClassResource) -> Result<ClassResource, StoreError> {
        sqlx::query("INSERT INTO classes (id, teacher_id, title, created_at) VALUES ($1, $2, $3, $4)")
            .bind(class.id.as_uuid())
            .bind(class.teacher_id.as_uuid())
            .bind(&class.title)
            .bind(class.created_at)
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(class)
    }

    async fn delete(&self, id: ClassId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<ClassResource>, StoreError> {
        let rows = sqlx::query("SELECT id, teacher_id, title, created_at FROM classes ORDER BY created_at DESC, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(class_from_row).collect()
    }
}

pub struct PostgresEnrollmentStore {
    pool: Arc<PgPool>,
}

impl PostgresEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment, StoreError> {
    let plan: String = row.try_get("plan_type").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let units: i32 = row.try_get("duration_units").map_err(corrupt)?;

    Ok(Enrollment {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(corrupt)?),
        class_id: ClassId::from_uuid(row.try_get::<Uuid, _>("class_id").map_err(corrupt)?),
        plan_type: plan.parse::<PlanType>().map_err(corrupt)?,
        duration_units: DurationUnits::from_i64(i64::from(units)),
        paid_amount: row.try_get("paid_amount").map_err(corrupt)?,
        end_at: row.try_get("end_at").map_err(corrupt)?,
        status: status.parse::<EnrollmentStatus>().map_err(corrupt)?,
    })
}

#[async_trait]
impl EnrollmentStore for PostgresEnrollmentStore {
    async fn get_by_user_and_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, class_id, plan_type, duration_units, paid_amount, end_at, status
            FROM enrollments
            WHERE user_id = $1 AND class_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(class_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn upsert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError> {
        let units = i32::try_from(enrollment.duration_units.get()).map_err(corrupt)?;
        sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, class_id, plan_type, duration_units, paid_amount, end_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, class_id) DO UPDATE SET
                plan_type = EXCLUDED.plan_type,
                duration_units = EXCLUDED.duration_units,
                paid_amount = EXCLUDED.paid_amount,
                end_at = EXCLUDED.end_at,
                status = EXCLUDED.status
            "#,
        )
        .bind(enrollment.user_id.as_uuid())
        .bind(enrollment.class_id.as_uuid())
        .bind(enrollment.plan_type.as_str())
        .bind(units)
        .bind(enrollment.paid_amount)
        .bind(enrollment.end_at)
        .bind(enrollment.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(enrollment)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, class_id, plan_type, duration_units, paid_amount, end_at, status
            FROM enrollments
            WHERE user_id = $1
            ORDER BY end_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(enrollment_from_row).collect()
    }
}
