use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Admin, Instructor, Student};
use crate::db::types::{AdminRole, ApprovalStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct InstructorCreate {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) bio: Option<String>,
    #[serde(default)]
    pub(crate) expertise: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminCreate {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: String,
    #[serde(default = "default_admin_role")]
    pub(crate) role: AdminRole,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentUpdate {
    #[serde(default)]
    #[serde(alias = "fullName")]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstructorUpdate {
    #[serde(default)]
    #[serde(alias = "fullName")]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) bio: Option<String>,
    #[serde(default)]
    pub(crate) expertise: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalRequest {
    pub(crate) approve: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl StudentResponse {
    pub(crate) fn from_db(student: Student) -> Self {
        Self {
            id: student.id,
            email: student.email,
            full_name: student.full_name,
            is_active: student.is_active,
            created_at: format_primitive(student.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct InstructorResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) bio: Option<String>,
    pub(crate) expertise: Vec<String>,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) approved_at: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl InstructorResponse {
    pub(crate) fn from_db(instructor: Instructor) -> Self {
        Self {
            id: instructor.id,
            email: instructor.email,
            full_name: instructor.full_name,
            bio: instructor.bio,
            expertise: instructor.expertise.0,
            approval_status: instructor.approval_status,
            approved_at: instructor.approved_at.map(format_primitive),
            is_active: instructor.is_active,
            created_at: format_primitive(instructor.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: AdminRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl AdminResponse {
    pub(crate) fn from_db(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            full_name: admin.full_name,
            role: admin.role,
            is_active: admin.is_active,
            created_at: format_primitive(admin.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum PrincipalResponse {
    Student(StudentResponse),
    Instructor(InstructorResponse),
    Admin(AdminResponse),
}

fn default_admin_role() -> AdminRole {
    AdminRole::Moderator
}
