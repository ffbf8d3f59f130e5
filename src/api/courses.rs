use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentInstructor;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Course;
use crate::repositories;
use crate::schemas::course::{
    CourseCreate, CourseDetailResponse, CourseListQuery, CourseResponse, CourseUpdate,
    LessonCreate, LessonResponse, LessonUpdate, PublishRequest,
};
use crate::schemas::Envelope;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published).post(create_course))
        .route("/instructor/mine", get(list_mine))
        .route(
            "/:course_id",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/:course_id/publish", patch(set_published))
        .route("/:course_id/lessons", get(list_lessons).post(create_lesson))
        .route(
            "/:course_id/lessons/:lesson_id",
            patch(update_lesson).delete(delete_lesson),
        )
}

/// Loads the course and checks ownership, in that order. A caller probing a
/// foreign course id learns whether it exists before whether it is theirs.
async fn owned_course(
    state: &AppState,
    course_id: &str,
    instructor_id: &str,
) -> Result<Course, ApiError> {
    let course = repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    if course.instructor_id != instructor_id {
        return Err(ApiError::Forbidden("Not the course owner"));
    }

    Ok(course)
}

async fn list_published(
    Query(params): Query<CourseListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<CourseResponse>>>, ApiError> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, title, description, category, level, price, thumbnail_url, instructor_id,
                is_published, enrollment_count, total_duration_minutes, created_at, updated_at
         FROM courses WHERE is_published = TRUE",
    );

    if let Some(category) = params.category.as_ref() {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }
    if let Some(level) = params.level {
        builder.push(" AND level = ");
        builder.push_bind(level);
    }
    if let Some(search) = params.search.as_ref() {
        let pattern = format!("%{search}%");
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(" ORDER BY created_at DESC");
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    let courses = builder
        .build_query_as::<Course>()
        .fetch_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;

    let responses: Vec<CourseResponse> = courses.into_iter().map(CourseResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn get_course(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CourseDetailResponse>>, ApiError> {
    let course = repositories::courses::find_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?;

    // Unpublished courses are invisible on the public surface.
    let course = match course {
        Some(course) if course.is_published => course,
        _ => return Err(ApiError::NotFound("Course not found".to_string())),
    };

    let lessons = repositories::lessons::list_for_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?;

    Ok(Json(Envelope::ok(CourseDetailResponse {
        course: CourseResponse::from_db(course),
        lessons: lessons.into_iter().map(LessonResponse::from_db).collect(),
    })))
}

async fn list_mine(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<CourseResponse>>>, ApiError> {
    let courses = repositories::courses::list_for_instructor(state.db(), &instructor.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list instructor courses"))?;

    let responses: Vec<CourseResponse> = courses.into_iter().map(CourseResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn create_course(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<Envelope<CourseResponse>>), ApiError> {
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: &payload.description,
            category: &payload.category,
            level: payload.level,
            price: payload.price,
            thumbnail_url: payload.thumbnail_url.as_deref(),
            instructor_id: &instructor.id,
            is_published: false,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create course"))?;

    tracing::info!(instructor_id = %instructor.id, course_id = %course.id, action = "course_create", "Course created");

    Ok((StatusCode::CREATED, Json(Envelope::ok(CourseResponse::from_db(course)))))
}

async fn update_course(
    Path(course_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<CourseUpdate>,
) -> Result<Json<Envelope<CourseResponse>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;

    if let Some(price) = payload.price {
        if price < 0.0 {
            return Err(ApiError::BadRequest("price must be non-negative".to_string()));
        }
    }

    repositories::courses::update(
        state.db(),
        &course_id,
        repositories::courses::UpdateCourse {
            title: payload.title,
            description: payload.description,
            category: payload.category,
            level: payload.level,
            price: payload.price,
            thumbnail_url: payload.thumbnail_url,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update course"))?;

    let updated = repositories::courses::fetch_one_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated course"))?;

    Ok(Json(Envelope::ok(CourseResponse::from_db(updated))))
}

async fn delete_course(
    Path(course_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;

    repositories::courses::delete(state.db(), &course_id).await.map_err(|e| {
        ApiError::conflict_on_fk(
            e,
            "Course has enrollments and cannot be deleted",
            "Failed to delete course",
        )
    })?;

    tracing::info!(instructor_id = %instructor.id, course_id = %course_id, action = "course_delete", "Course deleted");

    Ok(Json(Envelope::ok(()).with_message("Course deleted")))
}

async fn set_published(
    Path(course_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<PublishRequest>,
) -> Result<Json<Envelope<CourseResponse>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;

    if payload.is_published {
        let lessons = repositories::lessons::list_for_course(state.db(), &course_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?;
        if lessons.is_empty() {
            return Err(ApiError::BadRequest(
                "Course must have at least one lesson to be published".to_string(),
            ));
        }
    }

    repositories::courses::set_published(
        state.db(),
        &course_id,
        payload.is_published,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update publish state"))?;

    let updated = repositories::courses::fetch_one_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated course"))?;

    tracing::info!(instructor_id = %instructor.id, course_id = %course_id, is_published = payload.is_published, action = "course_publish", "Publish state changed");

    Ok(Json(Envelope::ok(CourseResponse::from_db(updated))))
}

async fn list_lessons(
    Path(course_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<LessonResponse>>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;

    let lessons = repositories::lessons::list_for_course(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list lessons"))?;

    let responses: Vec<LessonResponse> = lessons.into_iter().map(LessonResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn create_lesson(
    Path(course_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<LessonCreate>,
) -> Result<(StatusCode, Json<Envelope<LessonResponse>>), ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;
    validate_payload(&payload)?;

    let order_index = repositories::lessons::next_order_index(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute lesson order"))?;

    let now = primitive_now_utc();
    let lesson = repositories::lessons::create(
        state.db(),
        repositories::lessons::CreateLesson {
            id: &Uuid::new_v4().to_string(),
            course_id: &course_id,
            title: &payload.title,
            video_url: payload.video_url.as_deref(),
            duration_minutes: payload.duration_minutes,
            order_index,
            materials: payload.materials.clone(),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create lesson"))?;

    repositories::courses::recompute_total_duration(state.db(), &course_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recompute course duration"))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(LessonResponse::from_db(lesson)))))
}

async fn update_lesson(
    Path((course_id, lesson_id)): Path<(String, String)>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<LessonUpdate>,
) -> Result<Json<Envelope<LessonResponse>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;
    let lesson = find_course_lesson(&state, &course_id, &lesson_id).await?;

    if let Some(duration) = payload.duration_minutes {
        if duration < 0 {
            return Err(ApiError::BadRequest("duration_minutes must be non-negative".to_string()));
        }
    }

    let now = primitive_now_utc();
    repositories::lessons::update(
        state.db(),
        &lesson.id,
        repositories::lessons::UpdateLesson {
            title: payload.title,
            video_url: payload.video_url,
            duration_minutes: payload.duration_minutes,
            materials: payload.materials,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update lesson"))?;

    repositories::courses::recompute_total_duration(state.db(), &course_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recompute course duration"))?;

    let updated = repositories::lessons::find_by_id(state.db(), &lesson.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated lesson"))?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))?;

    Ok(Json(Envelope::ok(LessonResponse::from_db(updated))))
}

async fn delete_lesson(
    Path((course_id, lesson_id)): Path<(String, String)>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    owned_course(&state, &course_id, &instructor.id).await?;
    let lesson = find_course_lesson(&state, &course_id, &lesson_id).await?;

    repositories::lessons::delete(state.db(), &lesson.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete lesson"))?;

    let now = primitive_now_utc();
    repositories::lessons::resequence(state.db(), &course_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to resequence lessons"))?;
    repositories::courses::recompute_total_duration(state.db(), &course_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recompute course duration"))?;

    Ok(Json(Envelope::ok(()).with_message("Lesson deleted")))
}

async fn find_course_lesson(
    state: &AppState,
    course_id: &str,
    lesson_id: &str,
) -> Result<crate::db::models::Lesson, ApiError> {
    let lesson = repositories::lessons::find_by_id(state.db(), lesson_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch lesson"))?;

    match lesson {
        Some(lesson) if lesson.course_id == course_id => Ok(lesson),
        _ => Err(ApiError::NotFound("Lesson not found".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn unpublished_course_is_hidden_from_public_detail() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let course =
            test_support::insert_course(ctx.state.db(), &instructor.id, "Hidden Course", false)
                .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/courses/{}", course.id),
                None,
                None,
            ))
            .await
            .expect("get course");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/courses", None, None))
            .await
            .expect("list courses");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn lesson_lifecycle_maintains_order_and_duration() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let token = test_support::bearer_token(&instructor.id, ctx.state.settings());
        let course =
            test_support::insert_course(ctx.state.db(), &instructor.id, "Rust Basics", false)
                .await;

        let mut lesson_ids = Vec::new();
        for (title, minutes) in [("Intro", 10), ("Ownership", 25), ("Borrowing", 15)] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    &format!("/api/courses/{}/lessons", course.id),
                    Some(&token),
                    Some(json!({"title": title, "duration_minutes": minutes})),
                ))
                .await
                .expect("create lesson");
            let status = response.status();
            let created = test_support::read_json(response).await;
            assert_eq!(status, StatusCode::CREATED, "response: {created}");
            lesson_ids.push(created["data"]["id"].as_str().expect("lesson id").to_string());
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/courses/{}/lessons/{}", course.id, lesson_ids[1]),
                Some(&token),
                None,
            ))
            .await
            .expect("delete lesson");
        assert_eq!(response.status(), StatusCode::OK);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/courses/{}/lessons", course.id),
                Some(&token),
                None,
            ))
            .await
            .expect("list lessons");
        let body = test_support::read_json(response).await;
        let lessons = body["data"].as_array().expect("lessons");
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[0]["order_index"], 1);
        assert_eq!(lessons[1]["order_index"], 2);
        assert_eq!(lessons[1]["title"], "Borrowing");

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/courses/instructor/mine",
                Some(&token),
                None,
            ))
            .await
            .expect("list mine");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"][0]["total_duration_minutes"], 25);
    }

    #[tokio::test]
    async fn publish_requires_a_lesson_and_exposes_course() {
        let ctx = test_support::setup_test_context().await;

        let instructor =
            test_support::insert_instructor(ctx.state.db(), "teach@test.local").await;
        let token = test_support::bearer_token(&instructor.id, ctx.state.settings());
        let course =
            test_support::insert_course(ctx.state.db(), &instructor.id, "Empty Course", false)
                .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/courses/{}/publish", course.id),
                Some(&token),
                Some(json!({"is_published": true})),
            ))
            .await
            .expect("publish empty course");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        test_support::insert_lesson(ctx.state.db(), &course.id, "Only Lesson", 30, 1).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/courses/{}/publish", course.id),
                Some(&token),
                Some(json!({"is_published": true})),
            ))
            .await
            .expect("publish course");
        assert_eq!(response.status(), StatusCode::OK);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/courses/{}", course.id),
                None,
                None,
            ))
            .await
            .expect("public detail");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["title"], "Empty Course");
        assert_eq!(body["data"]["lessons"].as_array().expect("lessons").len(), 1);
    }

    #[tokio::test]
    async fn foreign_instructor_cannot_touch_course() {
        let ctx = test_support::setup_test_context().await;

        let owner = test_support::insert_instructor(ctx.state.db(), "owner@test.local").await;
        let other = test_support::insert_instructor(ctx.state.db(), "other@test.local").await;
        let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
        let course =
            test_support::insert_course(ctx.state.db(), &owner.id, "Owned Course", false).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/courses/{}", course.id),
                Some(&other_token),
                Some(json!({"title": "Hijacked"})),
            ))
            .await
            .expect("update foreign course");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::PATCH,
                "/api/courses/missing-id",
                Some(&other_token),
                Some(json!({"title": "Whatever"})),
            ))
            .await
            .expect("update missing course");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
