//! Remote course API
//!
//! The HTTP client with the auth interceptor, the wire types, and the
//! per-resource services that route reads and writes through the cache.

mod client;
mod courses;
mod enrollments;
mod lessons;
mod types;

pub use client::ApiClient;
pub use courses::CourseService;
pub use enrollments::EnrollmentService;
pub use lessons::LessonService;
pub use types::{Course, CourseUpdate, Enrollment, Lesson, NewCourse};
