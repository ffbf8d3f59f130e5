use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::{normalize_email, validate_password_len, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Instructor, Student};
use crate::db::types::ApprovalStatus;
use crate::repositories;
use crate::schemas::user::{
    AdminCreate, AdminResponse, ApprovalRequest, InstructorCreate, InstructorResponse,
    InstructorUpdate, RegisterRequest, StudentResponse, StudentUpdate,
};
use crate::schemas::Envelope;

#[derive(Debug, Deserialize)]
struct UserListQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    #[serde(alias = "isActive")]
    is_active: Option<bool>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/:student_id",
            get(get_student).patch(update_student).delete(delete_student),
        )
        .route("/instructors", get(list_instructors).post(create_instructor))
        .route(
            "/instructors/:instructor_id",
            get(get_instructor).patch(update_instructor).delete(delete_instructor),
        )
        .route("/instructors/:instructor_id/approval", patch(set_instructor_approval))
        .route("/admins", post(create_admin))
}

async fn list_students(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<StudentResponse>>>, ApiError> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, email, hashed_password, full_name, is_active, created_at, updated_at
         FROM students",
    );

    if let Some(is_active) = params.is_active {
        builder.push(" WHERE is_active = ");
        builder.push_bind(is_active);
    }

    builder.push(" ORDER BY created_at DESC");
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    let students = builder
        .build_query_as::<Student>()
        .fetch_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list students"))?;

    let responses: Vec<StudentResponse> =
        students.into_iter().map(StudentResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn create_student(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<StudentResponse>>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    let taken = repositories::email_taken(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?;
    if taken {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let student = repositories::students::create(
        state.db(),
        repositories::students::CreateStudent {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            full_name: &payload.full_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create student"))?;

    tracing::info!(admin_id = %admin.id, student_id = %student.id, action = "student_create", "Admin created student");

    Ok((StatusCode::CREATED, Json(Envelope::ok(StudentResponse::from_db(student)))))
}

async fn get_student(
    Path(student_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<StudentResponse>>, ApiError> {
    let student = repositories::students::find_by_id(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    Ok(Json(Envelope::ok(StudentResponse::from_db(student))))
}

async fn update_student(
    Path(student_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<Envelope<StudentResponse>>, ApiError> {
    repositories::students::find_by_id(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let hashed_password = hash_optional_password(payload.password.as_deref())?;

    repositories::students::update(
        state.db(),
        &student_id,
        repositories::students::UpdateStudent {
            full_name: payload.full_name,
            hashed_password,
            is_active: payload.is_active,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update student"))?;

    let updated = repositories::students::fetch_one_by_id(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated student"))?;

    tracing::info!(admin_id = %admin.id, student_id = %updated.id, action = "student_update", "Admin updated student");

    Ok(Json(Envelope::ok(StudentResponse::from_db(updated))))
}

async fn delete_student(
    Path(student_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let deleted = repositories::students::delete(state.db(), &student_id).await.map_err(|e| {
        ApiError::conflict_on_fk(
            e,
            "Student has enrollments or purchases and cannot be deleted",
            "Failed to delete student",
        )
    })?;

    if !deleted {
        return Err(ApiError::NotFound("Student not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, student_id = %student_id, action = "student_delete", "Admin deleted student");

    Ok(Json(Envelope::ok(()).with_message("Student deleted")))
}

async fn list_instructors(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<InstructorResponse>>>, ApiError> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, email, hashed_password, full_name, bio, expertise, approval_status,
                approved_at, approved_by, is_active, created_at, updated_at
         FROM instructors",
    );

    if let Some(is_active) = params.is_active {
        builder.push(" WHERE is_active = ");
        builder.push_bind(is_active);
    }

    builder.push(" ORDER BY created_at DESC");
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    let instructors = builder
        .build_query_as::<Instructor>()
        .fetch_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list instructors"))?;

    let responses: Vec<InstructorResponse> =
        instructors.into_iter().map(InstructorResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn create_instructor(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<InstructorCreate>,
) -> Result<(StatusCode, Json<Envelope<InstructorResponse>>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    let taken = repositories::email_taken(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?;
    if taken {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let instructor = repositories::instructors::create(
        state.db(),
        repositories::instructors::CreateInstructor {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            full_name: &payload.full_name,
            bio: payload.bio.as_deref(),
            expertise: payload.expertise.clone(),
            approval_status: ApprovalStatus::Pending,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create instructor"))?;

    tracing::info!(admin_id = %admin.id, instructor_id = %instructor.id, action = "instructor_create", "Admin created instructor");

    Ok((StatusCode::CREATED, Json(Envelope::ok(InstructorResponse::from_db(instructor)))))
}

async fn get_instructor(
    Path(instructor_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<InstructorResponse>>, ApiError> {
    let instructor = repositories::instructors::find_by_id(state.db(), &instructor_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch instructor"))?
        .ok_or_else(|| ApiError::NotFound("Instructor not found".to_string()))?;

    Ok(Json(Envelope::ok(InstructorResponse::from_db(instructor))))
}

async fn update_instructor(
    Path(instructor_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<InstructorUpdate>,
) -> Result<Json<Envelope<InstructorResponse>>, ApiError> {
    repositories::instructors::find_by_id(state.db(), &instructor_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch instructor"))?
        .ok_or_else(|| ApiError::NotFound("Instructor not found".to_string()))?;

    let hashed_password = hash_optional_password(payload.password.as_deref())?;

    repositories::instructors::update(
        state.db(),
        &instructor_id,
        repositories::instructors::UpdateInstructor {
            full_name: payload.full_name,
            bio: payload.bio,
            expertise: payload.expertise,
            hashed_password,
            is_active: payload.is_active,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update instructor"))?;

    let updated = repositories::instructors::fetch_one_by_id(state.db(), &instructor_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated instructor"))?;

    tracing::info!(admin_id = %admin.id, instructor_id = %updated.id, action = "instructor_update", "Admin updated instructor");

    Ok(Json(Envelope::ok(InstructorResponse::from_db(updated))))
}

async fn delete_instructor(
    Path(instructor_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let deleted =
        repositories::instructors::delete(state.db(), &instructor_id).await.map_err(|e| {
            ApiError::conflict_on_fk(
                e,
                "Instructor still owns courses and cannot be deleted",
                "Failed to delete instructor",
            )
        })?;

    if !deleted {
        return Err(ApiError::NotFound("Instructor not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, instructor_id = %instructor_id, action = "instructor_delete", "Admin deleted instructor");

    Ok(Json(Envelope::ok(()).with_message("Instructor deleted")))
}

async fn set_instructor_approval(
    Path(instructor_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ApprovalRequest>,
) -> Result<Json<Envelope<InstructorResponse>>, ApiError> {
    repositories::instructors::find_by_id(state.db(), &instructor_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch instructor"))?
        .ok_or_else(|| ApiError::NotFound("Instructor not found".to_string()))?;

    let status =
        if payload.approve { ApprovalStatus::Approved } else { ApprovalStatus::Rejected };

    repositories::instructors::set_approval(
        state.db(),
        &instructor_id,
        status,
        &admin.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update approval status"))?;

    let updated = repositories::instructors::fetch_one_by_id(state.db(), &instructor_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated instructor"))?;

    tracing::info!(admin_id = %admin.id, instructor_id = %instructor_id, approved = payload.approve, action = "instructor_approval", "Admin set instructor approval");

    Ok(Json(Envelope::ok(InstructorResponse::from_db(updated))))
}

async fn create_admin(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminCreate>,
) -> Result<(StatusCode, Json<Envelope<AdminResponse>>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    let taken = repositories::email_taken(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?;
    if taken {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let created = repositories::admins::create(
        state.db(),
        repositories::admins::CreateAdmin {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            full_name: &payload.full_name,
            role: payload.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create admin"))?;

    tracing::info!(admin_id = %admin.id, created_admin_id = %created.id, action = "admin_create", "Admin created admin");

    Ok((StatusCode::CREATED, Json(Envelope::ok(AdminResponse::from_db(created)))))
}

fn hash_optional_password(password: Option<&str>) -> Result<Option<String>, ApiError> {
    match password {
        Some(password) => {
            validate_password_len(password)?;
            let hashed = security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
            Ok(Some(hashed))
        }
        None => Ok(None),
    }
}

fn default_limit() -> i64 {
    100
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn admin_can_manage_students() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let token = test_support::bearer_token(&admin.id, ctx.state.settings());

        let create_payload = json!({
            "email": "new.student@test.local",
            "full_name": "New Student",
            "password": "student-pass"
        });

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/users/students",
                Some(&token),
                Some(create_payload),
            ))
            .await
            .expect("create student");

        let status = response.status();
        let created = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {created}");
        let student_id = created["data"]["id"].as_str().expect("student id").to_string();
        assert_eq!(created["data"]["email"], "new.student@test.local");

        let update_payload = json!({
            "full_name": "Renamed Student",
            "is_active": false
        });

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/users/students/{student_id}"),
                Some(&token),
                Some(update_payload),
            ))
            .await
            .expect("update student");

        let status = response.status();
        let updated = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {updated}");
        assert_eq!(updated["data"]["full_name"], "Renamed Student");
        assert_eq!(updated["data"]["is_active"], false);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/users/students/{student_id}"),
                Some(&token),
                None,
            ))
            .await
            .expect("delete student");
        assert_eq!(response.status(), StatusCode::OK);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/users/students/{student_id}"),
                Some(&token),
                None,
            ))
            .await
            .expect("get deleted student");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_email_across_tables_is_conflict() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let token = test_support::bearer_token(&admin.id, ctx.state.settings());
        test_support::insert_student(ctx.state.db(), "shared@test.local", "pass-word").await;

        let payload = json!({
            "email": "shared@test.local",
            "full_name": "Duplicate Instructor",
            "password": "teach-pass"
        });

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/users/instructors",
                Some(&token),
                Some(payload),
            ))
            .await
            .expect("create instructor");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn approval_flips_instructor_status() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let token = test_support::bearer_token(&admin.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/users/instructors",
                Some(&token),
                Some(json!({
                    "email": "pending@test.local",
                    "full_name": "Pending Instructor",
                    "password": "teach-pass"
                })),
            ))
            .await
            .expect("create instructor");
        let created = test_support::read_json(response).await;
        let instructor_id = created["data"]["id"].as_str().expect("instructor id").to_string();
        assert_eq!(created["data"]["approval_status"], "pending");

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::PATCH,
                &format!("/api/users/instructors/{instructor_id}/approval"),
                Some(&token),
                Some(json!({"approve": true})),
            ))
            .await
            .expect("approve instructor");

        let status = response.status();
        let approved = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {approved}");
        assert_eq!(approved["data"]["approval_status"], "approved");
        assert!(approved["data"]["approved_at"].is_string());
    }

    #[tokio::test]
    async fn student_token_cannot_access_admin_routes() {
        let ctx = test_support::setup_test_context().await;

        let student =
            test_support::insert_student(ctx.state.db(), "plain@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/users/students",
                Some(&token),
                None,
            ))
            .await
            .expect("list students");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
