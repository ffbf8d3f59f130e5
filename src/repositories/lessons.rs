use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::db::models::Lesson;

const COLUMNS: &str = "\
    id, course_id, title, video_url, duration_minutes, order_index, materials, \
    created_at, updated_at";

pub(crate) struct CreateLesson<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) video_url: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) order_index: i32,
    pub(crate) materials: Vec<String>,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateLesson {
    pub(crate) title: Option<String>,
    pub(crate) video_url: Option<String>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) materials: Option<Vec<String>>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateLesson<'_>) -> Result<Lesson, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!(
        "INSERT INTO lessons (
            id, course_id, title, video_url, duration_minutes, order_index,
            materials, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.video_url)
    .bind(params.duration_minutes)
    .bind(params.order_index)
    .bind(Json(params.materials))
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    lesson_id: &str,
) -> Result<Option<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!("SELECT {COLUMNS} FROM lessons WHERE id = $1"))
        .bind(lesson_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_for_course<'e>(
    executor: impl PgExecutor<'e>,
    course_id: &str,
) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY order_index",
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn next_order_index(pool: &PgPool, course_id: &str) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(order_index), 0) + 1 FROM lessons WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    lesson_id: &str,
    params: UpdateLesson,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE lessons SET
            title = COALESCE($1, title),
            video_url = COALESCE($2, video_url),
            duration_minutes = COALESCE($3, duration_minutes),
            materials = COALESCE($4, materials),
            updated_at = $5
         WHERE id = $6",
    )
    .bind(params.title)
    .bind(params.video_url)
    .bind(params.duration_minutes)
    .bind(params.materials.map(Json))
    .bind(params.updated_at)
    .bind(lesson_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, lesson_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM lessons WHERE id = $1").bind(lesson_id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Closes the gap a delete leaves so order stays 1..n. Lookup always goes by
/// lesson id; the order index is presentation order only.
pub(crate) async fn resequence(
    pool: &PgPool,
    course_id: &str,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE lessons SET order_index = ranked.seq, updated_at = $2
         FROM (
             SELECT id, ROW_NUMBER() OVER (ORDER BY order_index)::int AS seq
             FROM lessons WHERE course_id = $1
         ) AS ranked
         WHERE lessons.id = ranked.id AND lessons.order_index <> ranked.seq",
    )
    .bind(course_id)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}
