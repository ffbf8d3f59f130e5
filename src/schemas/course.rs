use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Course, Lesson};
use crate::db::types::CourseLevel;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub(crate) description: String,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: String,
    #[serde(default = "default_level")]
    pub(crate) level: CourseLevel,
    #[validate(range(min = 0.0, message = "price must be non-negative"))]
    pub(crate) price: f64,
    #[serde(default)]
    #[serde(alias = "thumbnailUrl")]
    pub(crate) thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseUpdate {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) level: Option<CourseLevel>,
    #[serde(default)]
    pub(crate) price: Option<f64>,
    #[serde(default)]
    #[serde(alias = "thumbnailUrl")]
    pub(crate) thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishRequest {
    #[serde(alias = "isPublished")]
    pub(crate) is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LessonCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    #[serde(alias = "videoUrl")]
    pub(crate) video_url: Option<String>,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 0, message = "duration_minutes must be non-negative"))]
    pub(crate) duration_minutes: i32,
    #[serde(default)]
    pub(crate) materials: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonUpdate {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    #[serde(alias = "videoUrl")]
    pub(crate) video_url: Option<String>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    pub(crate) materials: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseListQuery {
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) level: Option<CourseLevel>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
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
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            category: course.category,
            level: course.level,
            price: course.price,
            thumbnail_url: course.thumbnail_url,
            instructor_id: course.instructor_id,
            is_published: course.is_published,
            enrollment_count: course.enrollment_count,
            total_duration_minutes: course.total_duration_minutes,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LessonResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) video_url: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) order_index: i32,
    pub(crate) materials: Vec<String>,
}

impl LessonResponse {
    pub(crate) fn from_db(lesson: Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title,
            video_url: lesson.video_url,
            duration_minutes: lesson.duration_minutes,
            order_index: lesson.order_index,
            materials: lesson.materials.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseDetailResponse {
    #[serde(flatten)]
    pub(crate) course: CourseResponse,
    pub(crate) lessons: Vec<LessonResponse>,
}

fn default_level() -> CourseLevel {
    CourseLevel::Beginner
}

pub(crate) const fn default_limit() -> i64 {
    50
}
