use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Admin, Instructor, Student};
use crate::db::types::{ApprovalStatus, PrincipalKind};
use crate::repositories;

/// Token subjects are probed against the principal tables in this order.
/// The three id spaces are disjoint, so at most one probe can match.
pub(crate) const RESOLUTION_ORDER: [PrincipalKind; 3] =
    [PrincipalKind::Student, PrincipalKind::Instructor, PrincipalKind::Admin];

#[derive(Debug)]
pub(crate) enum Principal {
    Student(Student),
    Instructor(Instructor),
    Admin(Admin),
}

impl Principal {
    pub(crate) fn id(&self) -> &str {
        match self {
            Principal::Student(student) => &student.id,
            Principal::Instructor(instructor) => &instructor.id,
            Principal::Admin(admin) => &admin.id,
        }
    }
}

pub(crate) struct CurrentPrincipal(pub(crate) Principal);
pub(crate) struct CurrentStudent(pub(crate) Student);
pub(crate) struct CurrentInstructor(pub(crate) Instructor);
pub(crate) struct CurrentAdmin(pub(crate) Admin);

async fn resolve_principal(
    state: &AppState,
    principal_id: &str,
) -> Result<Option<Principal>, sqlx::Error> {
    for kind in RESOLUTION_ORDER {
        match kind {
            PrincipalKind::Student => {
                if let Some(student) =
                    repositories::students::find_by_id(state.db(), principal_id).await?
                {
                    return Ok(Some(Principal::Student(student)));
                }
            }
            PrincipalKind::Instructor => {
                if let Some(instructor) =
                    repositories::instructors::find_by_id(state.db(), principal_id).await?
                {
                    return Ok(Some(Principal::Instructor(instructor)));
                }
            }
            PrincipalKind::Admin => {
                if let Some(admin) =
                    repositories::admins::find_by_id(state.db(), principal_id).await?
                {
                    return Ok(Some(Principal::Admin(admin)));
                }
            }
        }
    }
    Ok(None)
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = bearer_token(parts)?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let principal = resolve_principal(&app_state, &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load principal"))?;

        principal.map(CurrentPrincipal).ok_or(ApiError::Unauthorized("User not found"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(parts, state).await?;

        match principal {
            Principal::Student(student) if student.is_active => Ok(CurrentStudent(student)),
            Principal::Student(_) => Err(ApiError::Unauthorized("Inactive user")),
            _ => Err(ApiError::Forbidden("Student access required")),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentInstructor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(parts, state).await?;

        let Principal::Instructor(instructor) = principal else {
            return Err(ApiError::Forbidden("Instructor access required"));
        };

        if !instructor.is_active {
            return Err(ApiError::Unauthorized("Inactive user"));
        }

        if instructor.approval_status != ApprovalStatus::Approved {
            return Err(ApiError::Forbidden("Instructor account is not approved"));
        }

        Ok(CurrentInstructor(instructor))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(parts, state).await?;

        let Principal::Admin(admin) = principal else {
            return Err(ApiError::Forbidden("Admin access required"));
        };

        if !admin.is_active {
            return Err(ApiError::Unauthorized("Inactive user"));
        }

        Ok(CurrentAdmin(admin))
    }
}
