use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentInstructor, CurrentStudent};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Enrollment;
use crate::db::types::EnrollmentStatus;
use crate::repositories;
use crate::schemas::enrollment::{
    EnrollRequest, EnrollmentResponse, InstructorEnrollmentResponse, InstructorEnrollmentsQuery,
    MyCourseResponse, MyCoursesQuery, ProgressResponse, ProgressUpdateRequest,
};
use crate::schemas::Envelope;
use crate::services::{payments, progress};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(enroll))
        .route("/my-courses", get(my_courses))
        .route("/instructor", get(instructor_enrollments))
        .route("/course/:course_id", get(get_by_course))
        .route("/:enrollment_id", get(get_enrollment))
        .route("/:enrollment_id/progress/:lesson_id", put(update_progress))
}

async fn owned_enrollment(
    state: &AppState,
    enrollment_id: &str,
    student_id: &str,
) -> Result<Enrollment, ApiError> {
    let enrollment = repositories::enrollments::find_by_id(state.db(), enrollment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;

    if enrollment.student_id != student_id {
        return Err(ApiError::Forbidden("Not your enrollment"));
    }

    Ok(enrollment)
}

async fn enrollment_with_progress(
    state: &AppState,
    enrollment: Enrollment,
) -> Result<EnrollmentResponse, ApiError> {
    let entries = repositories::enrollments::list_progress(state.db(), &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list lesson progress"))?;

    Ok(EnrollmentResponse::from_db(enrollment)
        .with_progress(entries.into_iter().map(ProgressResponse::from_db).collect()))
}

async fn enroll(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Envelope<EnrollmentResponse>>), ApiError> {
    let course = repositories::courses::find_by_id(state.db(), &payload.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?;

    let course = course.ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
    if !course.is_published {
        return Err(ApiError::BadRequest("Course is not published".to_string()));
    }

    let existing = repositories::enrollments::exists(state.db(), &student.id, &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing enrollment"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Already enrolled in this course".to_string()));
    }

    let lessons = repositories::lessons::list_for_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?;

    let payment = payments::PaymentRecord::simulated(course.price);
    let now = primitive_now_utc();
    let enrollment_id = Uuid::new_v4().to_string();

    // Enrollment row, the per-lesson progress snapshot and the course counter
    // land atomically.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin enrollment transaction"))?;

    let enrollment = repositories::enrollments::create(
        &mut *tx,
        repositories::enrollments::CreateEnrollment {
            id: &enrollment_id,
            student_id: &student.id,
            course_id: &course.id,
            status: EnrollmentStatus::Active,
            payment_amount: payment.amount,
            payment_status: payment.status,
            enrolled_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create enrollment"))?;

    for lesson in &lessons {
        repositories::enrollments::create_progress_entry(&mut *tx, &enrollment_id, &lesson.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to snapshot lesson progress"))?;
    }

    repositories::courses::increment_enrollment_count(&mut *tx, &course.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to bump enrollment count"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit enrollment"))?;

    metrics::counter!("enrollments_total").increment(1);
    tracing::info!(student_id = %student.id, course_id = %course.id, enrollment_id = %enrollment.id, action = "enroll", "Student enrolled");

    let response = enrollment_with_progress(&state, enrollment).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(response).with_message("Enrolled"))))
}

async fn my_courses(
    Query(params): Query<MyCoursesQuery>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<MyCourseResponse>>>, ApiError> {
    let enrollments =
        repositories::enrollments::list_for_student(state.db(), &student.id, params.status)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list enrollments"))?;

    let responses: Vec<MyCourseResponse> =
        enrollments.into_iter().map(MyCourseResponse::from_view).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

/// Reading an enrollment counts as course activity and bumps
/// `last_accessed_at`.
async fn get_enrollment(
    Path(enrollment_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<EnrollmentResponse>>, ApiError> {
    let enrollment = owned_enrollment(&state, &enrollment_id, &student.id).await?;

    let now = primitive_now_utc();
    repositories::enrollments::touch_last_accessed(state.db(), &enrollment.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to touch enrollment"))?;

    let refreshed = repositories::enrollments::find_by_id(state.db(), &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;

    let response = enrollment_with_progress(&state, refreshed).await?;
    Ok(Json(Envelope::ok(response)))
}

async fn get_by_course(
    Path(course_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<EnrollmentResponse>>, ApiError> {
    let enrollment =
        repositories::enrollments::find_by_student_course(state.db(), &student.id, &course_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
            .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;

    let now = primitive_now_utc();
    repositories::enrollments::touch_last_accessed(state.db(), &enrollment.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to touch enrollment"))?;

    let refreshed = repositories::enrollments::find_by_id(state.db(), &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;

    let response = enrollment_with_progress(&state, refreshed).await?;
    Ok(Json(Envelope::ok(response)))
}

async fn update_progress(
    Path((enrollment_id, lesson_id)): Path<(String, String)>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<ProgressUpdateRequest>,
) -> Result<Json<Envelope<EnrollmentResponse>>, ApiError> {
    let enrollment = owned_enrollment(&state, &enrollment_id, &student.id).await?;

    if let Some(watch_time) = payload.watch_time {
        if watch_time < 0 {
            return Err(ApiError::BadRequest("watch_time must be non-negative".to_string()));
        }
    }

    // The snapshot is fixed at enrollment time; lessons added to the course
    // later are not trackable here.
    let entry =
        repositories::enrollments::find_progress_entry(state.db(), &enrollment.id, &lesson_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch lesson progress"))?
            .ok_or_else(|| ApiError::NotFound("Lesson not found in enrollment".to_string()))?;

    let now = primitive_now_utc();

    let completed = payload.completed.unwrap_or(entry.completed);
    // completed_at is sticky: set on the first completion, never cleared.
    let completed_at = match (entry.completed_at, completed) {
        (None, true) => Some(now),
        (existing, _) => existing,
    };
    let watch_time_seconds = payload.watch_time.unwrap_or(entry.watch_time_seconds);

    repositories::enrollments::update_progress_entry(
        state.db(),
        &entry.id,
        repositories::enrollments::UpdateProgressEntry {
            completed,
            completed_at,
            watch_time_seconds,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update lesson progress"))?;

    let (done, total) = repositories::enrollments::progress_counts(state.db(), &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count lesson progress"))?;

    let percentage = progress::completion_percentage(done, total);
    let status = progress::next_status(enrollment.status, percentage);

    repositories::enrollments::apply_completion(state.db(), &enrollment.id, percentage, status, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to apply completion"))?;

    if status == EnrollmentStatus::Completed && enrollment.status == EnrollmentStatus::Active {
        metrics::counter!("courses_completed_total").increment(1);
        tracing::info!(enrollment_id = %enrollment.id, action = "course_completed", "Enrollment reached 100%");
    }

    let refreshed = repositories::enrollments::find_by_id(state.db(), &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;

    let response = enrollment_with_progress(&state, refreshed).await?;
    Ok(Json(Envelope::ok(response)))
}

async fn instructor_enrollments(
    Query(params): Query<InstructorEnrollmentsQuery>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<InstructorEnrollmentResponse>>>, ApiError> {
    let course_ids = repositories::courses::list_ids_for_instructor(
        state.db(),
        &instructor.id,
        params.course_id.as_deref(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list instructor courses"))?;

    let enrollments = if course_ids.is_empty() {
        Vec::new()
    } else {
        repositories::enrollments::list_for_courses(state.db(), &course_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list course enrollments"))?
    };

    let responses: Vec<InstructorEnrollmentResponse> =
        enrollments.into_iter().map(InstructorEnrollmentResponse::from_view).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    async fn published_course_with_lessons(
        ctx: &test_support::TestContext,
        instructor_id: &str,
        lesson_count: usize,
    ) -> String {
        let course =
            test_support::insert_course(ctx.state.db(), instructor_id, "Rust Basics", true).await;
        for index in 0..lesson_count {
            test_support::insert_lesson(
                ctx.state.db(),
                &course.id,
                &format!("Lesson {}", index + 1),
                10,
                (index + 1) as i32,
            )
            .await;
        }
        course.id
    }

    #[tokio::test]
    async fn enroll_snapshots_lessons_and_bumps_counter() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let course_id = published_course_with_lessons(&ctx, &instructor.id, 3).await;
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": course_id})),
            ))
            .await
            .expect("enroll");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["completion_percentage"], 0);
        assert_eq!(body["data"]["progress"].as_array().expect("progress").len(), 3);

        // Duplicate enrollment is a conflict.
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": course_id})),
            ))
            .await
            .expect("duplicate enroll");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/courses/{course_id}"),
                None,
                None,
            ))
            .await
            .expect("course detail");
        let course = test_support::read_json(response).await;
        assert_eq!(course["data"]["enrollment_count"], 1);
    }

    #[tokio::test]
    async fn enroll_rejects_unpublished_and_unknown_courses() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let draft =
            test_support::insert_course(ctx.state.db(), &instructor.id, "Draft Course", false)
                .await;
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": draft.id})),
            ))
            .await
            .expect("enroll in draft");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": "no-such-course"})),
            ))
            .await
            .expect("enroll in unknown");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn progress_entries_follow_lesson_order() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let course =
            test_support::insert_course(ctx.state.db(), &instructor.id, "Rust Basics", true).await;
        let mut expected = Vec::new();
        for index in 0..5 {
            let lesson = test_support::insert_lesson(
                ctx.state.db(),
                &course.id,
                &format!("Lesson {}", index + 1),
                10,
                (index + 1) as i32,
            )
            .await;
            expected.push(lesson.id);
        }
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": course.id})),
            ))
            .await
            .expect("enroll");
        let body = test_support::read_json(response).await;
        let snapshot: Vec<String> = body["data"]["progress"]
            .as_array()
            .expect("progress")
            .iter()
            .map(|entry| entry["lesson_id"].as_str().expect("lesson id").to_string())
            .collect();
        assert_eq!(snapshot, expected);
    }

    #[tokio::test]
    async fn progress_rounds_half_up_and_completes_once() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let course_id = published_course_with_lessons(&ctx, &instructor.id, 3).await;
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": course_id})),
            ))
            .await
            .expect("enroll");
        let body = test_support::read_json(response).await;
        let enrollment_id = body["data"]["id"].as_str().expect("enrollment id").to_string();
        let lesson_ids: Vec<String> = body["data"]["progress"]
            .as_array()
            .expect("progress")
            .iter()
            .map(|entry| entry["lesson_id"].as_str().expect("lesson id").to_string())
            .collect();

        let mark = |lesson_id: String, completed: bool| {
            test_support::json_request(
                Method::PUT,
                &format!("/api/enrollments/{enrollment_id}/progress/{lesson_id}"),
                Some(&token),
                Some(json!({"completed": completed, "watch_time": 90})),
            )
        };

        let response =
            ctx.app.clone().oneshot(mark(lesson_ids[0].clone(), true)).await.expect("mark 1/3");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["completion_percentage"], 33);
        assert_eq!(body["data"]["status"], "active");

        for lesson_id in &lesson_ids[1..] {
            ctx.app.clone().oneshot(mark(lesson_id.clone(), true)).await.expect("mark");
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/enrollments/{enrollment_id}"),
                Some(&token),
                None,
            ))
            .await
            .expect("get enrollment");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["completion_percentage"], 100);
        assert_eq!(body["data"]["status"], "completed");
        let completed_at = body["data"]["progress"][0]["completed_at"].clone();
        assert!(completed_at.is_string());

        // Un-completing drops the percentage but never reverts the status,
        // and completed_at stays put.
        let response =
            ctx.app.clone().oneshot(mark(lesson_ids[0].clone(), false)).await.expect("unmark");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["completion_percentage"], 67);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["progress"][0]["completed"], false);
        assert_eq!(body["data"]["progress"][0]["completed_at"], completed_at);

        // Unknown lesson in the snapshot is 404.
        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::PUT,
                &format!("/api/enrollments/{enrollment_id}/progress/no-such-lesson"),
                Some(&token),
                Some(json!({"completed": true})),
            ))
            .await
            .expect("unknown lesson");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn my_courses_filters_by_status() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let course_id = published_course_with_lessons(&ctx, &instructor.id, 1).await;
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&token),
                Some(json!({"course_id": course_id})),
            ))
            .await
            .expect("enroll");
        let body = test_support::read_json(response).await;
        let enrollment_id = body["data"]["id"].as_str().expect("enrollment id").to_string();
        let lesson_id =
            body["data"]["progress"][0]["lesson_id"].as_str().expect("lesson id").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/enrollments/my-courses?status=completed",
                Some(&token),
                None,
            ))
            .await
            .expect("filter completed");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 0);

        ctx.app
            .clone()
            .oneshot(test_support::json_request(
                Method::PUT,
                &format!("/api/enrollments/{enrollment_id}/progress/{lesson_id}"),
                Some(&token),
                Some(json!({"completed": true})),
            ))
            .await
            .expect("complete lesson");

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/enrollments/my-courses?status=completed",
                Some(&token),
                None,
            ))
            .await
            .expect("filter completed again");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["course"]["title"], "Rust Basics");
    }

    #[tokio::test]
    async fn instructor_sees_enrollments_for_own_courses_only() {
        let ctx = test_support::setup_test_context().await;

        let owner = test_support::insert_instructor(ctx.state.db(), "owner@test.local").await;
        let other = test_support::insert_instructor(ctx.state.db(), "other@test.local").await;
        let course_id = published_course_with_lessons(&ctx, &owner.id, 1).await;
        let student =
            test_support::insert_student(ctx.state.db(), "learner@test.local", "pass-word").await;
        let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

        ctx.app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/enrollments",
                Some(&student_token),
                Some(json!({"course_id": course_id})),
            ))
            .await
            .expect("enroll");

        let owner_token = test_support::bearer_token(&owner.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/enrollments/instructor",
                Some(&owner_token),
                None,
            ))
            .await
            .expect("owner list");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["student_email"], "learner@test.local");

        let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/enrollments/instructor?course_id={course_id}"),
                Some(&other_token),
                None,
            ))
            .await
            .expect("other list");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 0);
    }
}
