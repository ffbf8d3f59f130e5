use sqlx::{PgExecutor, PgPool};

use crate::db::models::Course;
use crate::db::types::CourseLevel;

const COLUMNS: &str = "\
    id, title, description, category, level, price, thumbnail_url, instructor_id, \
    is_published, enrollment_count, total_duration_minutes, created_at, updated_at";

pub(crate) struct CreateCourse<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: &'a str,
    pub(crate) category: &'a str,
    pub(crate) level: CourseLevel,
    pub(crate) price: f64,
    pub(crate) thumbnail_url: Option<&'a str>,
    pub(crate) instructor_id: &'a str,
    pub(crate) is_published: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateCourse {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) level: Option<CourseLevel>,
    pub(crate) price: Option<f64>,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateCourse<'_>) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (
            id, title, description, category, level, price, thumbnail_url,
            instructor_id, is_published, enrollment_count, total_duration_minutes,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,0,0,$10,$11)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.level)
    .bind(params.price)
    .bind(params.thumbnail_url)
    .bind(params.instructor_id)
    .bind(params.is_published)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, course_id: &str) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    course_id: &str,
    params: UpdateCourse,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE courses SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            category = COALESCE($3, category),
            level = COALESCE($4, level),
            price = COALESCE($5, price),
            thumbnail_url = COALESCE($6, thumbnail_url),
            updated_at = $7
         WHERE id = $8",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.level)
    .bind(params.price)
    .bind(params.thumbnail_url)
    .bind(params.updated_at)
    .bind(course_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn set_published(
    pool: &PgPool,
    course_id: &str,
    is_published: bool,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET is_published = $1, updated_at = $2 WHERE id = $3")
        .bind(is_published)
        .bind(updated_at)
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, course_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM courses WHERE id = $1").bind(course_id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn increment_enrollment_count<'e>(
    executor: impl PgExecutor<'e>,
    course_id: &str,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE courses SET enrollment_count = enrollment_count + 1, updated_at = $1 WHERE id = $2",
    )
    .bind(updated_at)
    .bind(course_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// `total_duration_minutes` is denormalized; recompute from the lesson rows
/// after every lesson mutation.
pub(crate) async fn recompute_total_duration(
    pool: &PgPool,
    course_id: &str,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE courses SET
            total_duration_minutes =
                (SELECT COALESCE(SUM(duration_minutes), 0) FROM lessons WHERE course_id = $1),
            updated_at = $2
         WHERE id = $1",
    )
    .bind(course_id)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_for_instructor(
    pool: &PgPool,
    instructor_id: &str,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COLUMNS} FROM courses WHERE instructor_id = $1 ORDER BY created_at DESC",
    ))
    .bind(instructor_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_ids_for_instructor(
    pool: &PgPool,
    instructor_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<String>, sqlx::Error> {
    match course_id {
        Some(course_id) => {
            sqlx::query_scalar::<_, String>(
                "SELECT id FROM courses WHERE instructor_id = $1 AND id = $2",
            )
            .bind(instructor_id)
            .bind(course_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_scalar::<_, String>("SELECT id FROM courses WHERE instructor_id = $1")
                .bind(instructor_id)
                .fetch_all(pool)
                .await
        }
    }
}
