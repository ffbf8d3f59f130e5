use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::{Enrollment, LessonProgress};
use crate::db::types::{CourseLevel, EnrollmentStatus, PaymentStatus};

const COLUMNS: &str = "\
    id, student_id, course_id, status, completion_percentage, payment_amount, \
    payment_status, enrolled_at, last_accessed_at, created_at, updated_at";

const PROGRESS_COLUMNS: &str =
    "id, enrollment_id, lesson_id, completed, completed_at, watch_time_seconds";

pub(crate) struct CreateEnrollment<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) status: EnrollmentStatus,
    pub(crate) payment_amount: f64,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) enrolled_at: time::PrimitiveDateTime,
}

/// Enrollment with its course and the course's instructor populated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EnrollmentWithCourseView {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) course_title: String,
    pub(crate) course_category: String,
    pub(crate) course_level: CourseLevel,
    pub(crate) course_thumbnail_url: Option<String>,
    pub(crate) course_total_duration_minutes: i32,
    pub(crate) instructor_id: String,
    pub(crate) instructor_name: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) payment_amount: f64,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) enrolled_at: time::PrimitiveDateTime,
    pub(crate) last_accessed_at: time::PrimitiveDateTime,
}

/// Enrollment with the student populated, for the instructor-facing listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EnrollmentWithStudentView {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) course_title: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) enrolled_at: time::PrimitiveDateTime,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create<'e>(
    executor: impl PgExecutor<'e>,
    params: CreateEnrollment<'_>,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO enrollments (
            id, student_id, course_id, status, completion_percentage,
            payment_amount, payment_status, enrolled_at, last_accessed_at,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,0,$5,$6,$7,$7,$7,$7)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.course_id)
    .bind(params.status)
    .bind(params.payment_amount)
    .bind(params.payment_status)
    .bind(params.enrolled_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    enrollment_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!("SELECT {COLUMNS} FROM enrollments WHERE id = $1"))
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_student_course(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM enrollments WHERE student_id = $1 AND course_id = $2",
    ))
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn exists(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn touch_last_accessed(
    pool: &PgPool,
    enrollment_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE enrollments SET last_accessed_at = $1, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(enrollment_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn apply_completion(
    pool: &PgPool,
    enrollment_id: &str,
    completion_percentage: i32,
    status: EnrollmentStatus,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE enrollments SET
            completion_percentage = $1,
            status = $2,
            last_accessed_at = $3,
            updated_at = $3
         WHERE id = $4",
    )
    .bind(completion_percentage)
    .bind(status)
    .bind(now)
    .bind(enrollment_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn create_progress_entry<'e>(
    executor: impl PgExecutor<'e>,
    enrollment_id: &str,
    lesson_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO lesson_progress (id, enrollment_id, lesson_id, completed, watch_time_seconds)
         VALUES ($1,$2,$3,FALSE,0)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(enrollment_id)
    .bind(lesson_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Snapshot rows can outlive their lesson; those sort after the live ones.
pub(crate) async fn list_progress(
    pool: &PgPool,
    enrollment_id: &str,
) -> Result<Vec<LessonProgress>, sqlx::Error> {
    sqlx::query_as::<_, LessonProgress>(
        "SELECT lp.id, lp.enrollment_id, lp.lesson_id, lp.completed, lp.completed_at,
                lp.watch_time_seconds
         FROM lesson_progress lp
         LEFT JOIN lessons l ON l.id = lp.lesson_id
         WHERE lp.enrollment_id = $1
         ORDER BY l.order_index NULLS LAST, lp.id",
    )
    .bind(enrollment_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_progress_entry(
    pool: &PgPool,
    enrollment_id: &str,
    lesson_id: &str,
) -> Result<Option<LessonProgress>, sqlx::Error> {
    sqlx::query_as::<_, LessonProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM lesson_progress
         WHERE enrollment_id = $1 AND lesson_id = $2",
    ))
    .bind(enrollment_id)
    .bind(lesson_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpdateProgressEntry {
    pub(crate) completed: bool,
    pub(crate) completed_at: Option<time::PrimitiveDateTime>,
    pub(crate) watch_time_seconds: i32,
}

pub(crate) async fn update_progress_entry(
    pool: &PgPool,
    progress_id: &str,
    params: UpdateProgressEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE lesson_progress SET completed = $1, completed_at = $2, watch_time_seconds = $3
         WHERE id = $4",
    )
    .bind(params.completed)
    .bind(params.completed_at)
    .bind(params.watch_time_seconds)
    .bind(progress_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// (completed, total) over the enrollment's progress snapshot.
pub(crate) async fn progress_counts(
    pool: &PgPool,
    enrollment_id: &str,
) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*) FILTER (WHERE completed), COUNT(*)
         FROM lesson_progress WHERE enrollment_id = $1",
    )
    .bind(enrollment_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
    status: Option<EnrollmentStatus>,
) -> Result<Vec<EnrollmentWithCourseView>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentWithCourseView>(
        "SELECT
            e.id,
            c.id AS course_id,
            c.title AS course_title,
            c.category AS course_category,
            c.level AS course_level,
            c.thumbnail_url AS course_thumbnail_url,
            c.total_duration_minutes AS course_total_duration_minutes,
            i.id AS instructor_id,
            i.full_name AS instructor_name,
            e.status,
            e.completion_percentage,
            e.payment_amount,
            e.payment_status,
            e.enrolled_at,
            e.last_accessed_at
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN instructors i ON i.id = c.instructor_id
         WHERE e.student_id = $1 AND ($2::enrollmentstatus IS NULL OR e.status = $2)
         ORDER BY e.last_accessed_at DESC",
    )
    .bind(student_id)
    .bind(status)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_courses(
    pool: &PgPool,
    course_ids: &[String],
) -> Result<Vec<EnrollmentWithStudentView>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentWithStudentView>(
        "SELECT
            e.id,
            c.id AS course_id,
            c.title AS course_title,
            s.id AS student_id,
            s.email AS student_email,
            s.full_name AS student_name,
            e.status,
            e.completion_percentage,
            e.enrolled_at,
            e.created_at
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN students s ON s.id = e.student_id
         WHERE e.course_id = ANY($1)
         ORDER BY e.created_at DESC",
    )
    .bind(course_ids)
    .fetch_all(pool)
    .await
}
