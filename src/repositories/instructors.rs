use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::db::models::Instructor;
use crate::db::types::ApprovalStatus;

const COLUMNS: &str = "\
    id, email, hashed_password, full_name, bio, expertise, approval_status, \
    approved_at, approved_by, is_active, created_at, updated_at";

pub(crate) struct CreateInstructor<'a> {
    pub(crate) id: &'a str,
    pub(crate) email: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) full_name: &'a str,
    pub(crate) bio: Option<&'a str>,
    pub(crate) expertise: Vec<String>,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) is_active: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateInstructor {
    pub(crate) full_name: Option<String>,
    pub(crate) bio: Option<String>,
    pub(crate) expertise: Option<Vec<String>>,
    pub(crate) hashed_password: Option<String>,
    pub(crate) is_active: Option<bool>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateInstructor<'_>,
) -> Result<Instructor, sqlx::Error> {
    sqlx::query_as::<_, Instructor>(&format!(
        "INSERT INTO instructors (
            id, email, hashed_password, full_name, bio, expertise,
            approval_status, is_active, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.bio)
    .bind(Json(params.expertise))
    .bind(params.approval_status)
    .bind(params.is_active)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: &str,
) -> Result<Option<Instructor>, sqlx::Error> {
    sqlx::query_as::<_, Instructor>(&format!("SELECT {COLUMNS} FROM instructors WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Instructor>, sqlx::Error> {
    sqlx::query_as::<_, Instructor>(&format!("SELECT {COLUMNS} FROM instructors WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM instructors WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateInstructor,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE instructors SET
            full_name = COALESCE($1, full_name),
            bio = COALESCE($2, bio),
            expertise = COALESCE($3, expertise),
            hashed_password = COALESCE($4, hashed_password),
            is_active = COALESCE($5, is_active),
            updated_at = $6
         WHERE id = $7",
    )
    .bind(params.full_name)
    .bind(params.bio)
    .bind(params.expertise.map(Json))
    .bind(params.hashed_password)
    .bind(params.is_active)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn set_approval(
    pool: &PgPool,
    id: &str,
    status: ApprovalStatus,
    approved_by: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE instructors SET
            approval_status = $1,
            approved_at = $2,
            approved_by = $3,
            updated_at = $2
         WHERE id = $4",
    )
    .bind(status)
    .bind(now)
    .bind(approved_by)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM instructors WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Instructor, sqlx::Error> {
    sqlx::query_as::<_, Instructor>(&format!("SELECT {COLUMNS} FROM instructors WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}
