use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AdminRole, ApprovalStatus, CourseLevel, EnrollmentStatus, PaymentStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Student {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Instructor {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) bio: Option<String>,
    pub(crate) expertise: Json<Vec<String>>,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) approved_at: Option<PrimitiveDateTime>,
    pub(crate) approved_by: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Admin {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: AdminRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) level: CourseLevel,
    pub(crate) price: f64,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) instructor_id: String,
    pub(crate) is_published: bool,
    pub(crate) enrollment_count: i32,
    pub(crate) total_duration_minutes: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Lesson {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) video_url: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) order_index: i32,
    pub(crate) materials: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Product {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) price: f64,
    pub(crate) file_url: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Cart {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CartItem {
    pub(crate) id: String,
    pub(crate) cart_id: String,
    pub(crate) product_id: String,
    pub(crate) added_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Purchase {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) total_amount: f64,
    pub(crate) card_masked: String,
    pub(crate) name_on_card: String,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct PurchaseItem {
    pub(crate) id: String,
    pub(crate) purchase_id: String,
    pub(crate) product_id: String,
    pub(crate) purchased_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) course_id: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) payment_amount: f64,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) enrolled_at: PrimitiveDateTime,
    pub(crate) last_accessed_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Per-lesson progress snapshot owned by an enrollment. `lesson_id` is the
/// stable id the lesson carried when the snapshot was taken; it may no longer
/// exist in the course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct LessonProgress {
    pub(crate) id: String,
    pub(crate) enrollment_id: String,
    pub(crate) lesson_id: String,
    pub(crate) completed: bool,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) watch_time_seconds: i32,
}
