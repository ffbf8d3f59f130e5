use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentPrincipal, Principal};
use crate::api::validation::{normalize_email, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::auth::TokenResponse;
use crate::schemas::user::{
    AdminResponse, InstructorResponse, LoginRequest, PrincipalResponse, RegisterRequest,
    StudentResponse,
};
use crate::schemas::Envelope;

/// Max attempts per window for auth endpoints.
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/instructor/login", post(instructor_login))
        .route("/admin/login", post(admin_login))
        .route("/me", get(me))
}

async fn rate_limit(state: &AppState, action: &str, email: &str) -> Result<(), ApiError> {
    let rate_key = format!("rl:{action}:{email}");
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests("Too many attempts, try again later"))
    }
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<TokenResponse>>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    rate_limit(&state, "register", &email).await?;

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

    let token = security::create_access_token(&student.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    let response = TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: PrincipalResponse::Student(StudentResponse::from_db(student)),
    };

    Ok((StatusCode::CREATED, Json(Envelope::ok(response).with_message("Registered"))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<TokenResponse>>, ApiError> {
    let email = normalize_email(&payload.email);
    rate_limit(&state, "login", &email).await?;

    let student = repositories::students::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    check_password(&payload.password, &student.hashed_password)?;

    if !student.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(&student.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(Envelope::ok(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: PrincipalResponse::Student(StudentResponse::from_db(student)),
    })))
}

async fn instructor_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<TokenResponse>>, ApiError> {
    let email = normalize_email(&payload.email);
    rate_limit(&state, "instructor-login", &email).await?;

    let instructor = repositories::instructors::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load instructor"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    check_password(&payload.password, &instructor.hashed_password)?;

    if !instructor.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(&instructor.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(Envelope::ok(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: PrincipalResponse::Instructor(InstructorResponse::from_db(instructor)),
    })))
}

async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<TokenResponse>>, ApiError> {
    let email = normalize_email(&payload.email);
    rate_limit(&state, "admin-login", &email).await?;

    let admin = repositories::admins::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load admin"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    check_password(&payload.password, &admin.hashed_password)?;

    if !admin.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(&admin.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(Envelope::ok(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: PrincipalResponse::Admin(AdminResponse::from_db(admin)),
    })))
}

async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Envelope<PrincipalResponse>> {
    let response = match principal {
        Principal::Student(student) => PrincipalResponse::Student(StudentResponse::from_db(student)),
        Principal::Instructor(instructor) => {
            PrincipalResponse::Instructor(InstructorResponse::from_db(instructor))
        }
        Principal::Admin(admin) => PrincipalResponse::Admin(AdminResponse::from_db(admin)),
    };
    Json(Envelope::ok(response))
}

fn check_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let verified = security::verify_password(password, hash)
        .map_err(|_| ApiError::Unauthorized("Incorrect email or password"))?;
    if verified {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Incorrect email or password"))
    }
}
