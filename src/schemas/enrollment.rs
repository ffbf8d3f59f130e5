use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Enrollment, LessonProgress};
use crate::db::types::{CourseLevel, EnrollmentStatus, PaymentStatus};
use crate::repositories::enrollments::{EnrollmentWithCourseView, EnrollmentWithStudentView};

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollRequest {
    #[serde(alias = "courseId")]
    pub(crate) course_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MyCoursesQuery {
    #[serde(default)]
    pub(crate) status: Option<EnrollmentStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstructorEnrollmentsQuery {
    #[serde(default)]
    #[serde(alias = "courseId")]
    pub(crate) course_id: Option<String>,
}

/// Both fields optional; an omitted field leaves the stored value alone.
#[derive(Debug, Deserialize)]
pub(crate) struct ProgressUpdateRequest {
    #[serde(default)]
    pub(crate) completed: Option<bool>,
    #[serde(default)]
    #[serde(alias = "watchTime")]
    pub(crate) watch_time: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProgressResponse {
    pub(crate) lesson_id: String,
    pub(crate) completed: bool,
    pub(crate) completed_at: Option<String>,
    pub(crate) watch_time_seconds: i32,
}

impl ProgressResponse {
    pub(crate) fn from_db(entry: LessonProgress) -> Self {
        Self {
            lesson_id: entry.lesson_id,
            completed: entry.completed,
            completed_at: entry.completed_at.map(format_primitive),
            watch_time_seconds: entry.watch_time_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EnrollmentResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) course_id: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) payment_amount: f64,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) enrolled_at: String,
    pub(crate) last_accessed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) progress: Option<Vec<ProgressResponse>>,
}

impl EnrollmentResponse {
    pub(crate) fn from_db(enrollment: Enrollment) -> Self {
        Self {
            id: enrollment.id,
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
            status: enrollment.status,
            completion_percentage: enrollment.completion_percentage,
            payment_amount: enrollment.payment_amount,
            payment_status: enrollment.payment_status,
            enrolled_at: format_primitive(enrollment.enrolled_at),
            last_accessed_at: format_primitive(enrollment.last_accessed_at),
            progress: None,
        }
    }

    pub(crate) fn with_progress(mut self, progress: Vec<ProgressResponse>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Embedded course summary for the student's "my courses" listing.
#[derive(Debug, Serialize)]
pub(crate) struct EnrolledCourseSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) level: CourseLevel,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) total_duration_minutes: i32,
    pub(crate) instructor_id: String,
    pub(crate) instructor_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MyCourseResponse {
    pub(crate) id: String,
    pub(crate) course: EnrolledCourseSummary,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) payment_amount: f64,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) enrolled_at: String,
    pub(crate) last_accessed_at: String,
}

impl MyCourseResponse {
    pub(crate) fn from_view(view: EnrollmentWithCourseView) -> Self {
        Self {
            id: view.id,
            course: EnrolledCourseSummary {
                id: view.course_id,
                title: view.course_title,
                category: view.course_category,
                level: view.course_level,
                thumbnail_url: view.course_thumbnail_url,
                total_duration_minutes: view.course_total_duration_minutes,
                instructor_id: view.instructor_id,
                instructor_name: view.instructor_name,
            },
            status: view.status,
            completion_percentage: view.completion_percentage,
            payment_amount: view.payment_amount,
            payment_status: view.payment_status,
            enrolled_at: format_primitive(view.enrolled_at),
            last_accessed_at: format_primitive(view.last_accessed_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct InstructorEnrollmentResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) course_title: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) completion_percentage: i32,
    pub(crate) enrolled_at: String,
}

impl InstructorEnrollmentResponse {
    pub(crate) fn from_view(view: EnrollmentWithStudentView) -> Self {
        Self {
            id: view.id,
            course_id: view.course_id,
            course_title: view.course_title,
            student_id: view.student_id,
            student_email: view.student_email,
            student_name: view.student_name,
            status: view.status,
            completion_percentage: view.completion_percentage,
            enrolled_at: format_primitive(view.enrolled_at),
        }
    }
}
