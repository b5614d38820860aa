//! CLI command handlers

use crate::api::{ApiClient, CourseService, EnrollmentService, LessonService};
use crate::auth::SessionStore;
use crate::cache::QueryClient;
use crate::config::AppConfig;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs, wired together once at startup
pub struct App {
    pub session: Arc<SessionStore>,
    pub courses: CourseService,
    pub lessons: LessonService,
    pub enrollments: EnrollmentService,
}

impl App {
    /// Construct the query client, API client, and services from config.
    ///
    /// The cache lives exactly as long as this value; there is no global
    /// instance.
    pub fn build(config: &AppConfig) -> Result<Self> {
        let session = Arc::new(SessionStore::open_default()?);
        let api = Arc::new(ApiClient::new(
            &config.api.base_url,
            Arc::clone(&session),
            config.request_timeout(),
        )?);
        let queries = QueryClient::new();

        Ok(Self {
            session,
            courses: CourseService::new(queries.clone(), Arc::clone(&api))
                .with_configs(config.courses_list_config(), config.course_config()),
            lessons: LessonService::new(queries.clone(), Arc::clone(&api))
                .with_config(config.lessons_config()),
            enrollments: EnrollmentService::new(queries, api)
                .with_config(config.enrollment_config()),
        })
    }
}

/// Write a default configuration file
pub fn init(config_path: Option<&str>) -> Result<()> {
    let path = match config_path {
        Some(p) => Path::new(p).to_path_buf(),
        None => AppConfig::default_path(),
    };

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    AppConfig::new().save(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// Create and persist a session
pub fn login(app: &App, email: &str) -> Result<()> {
    let session = app.session.login(email)?;
    println!("Logged in as {}", session.email);
    Ok(())
}

/// Clear the stored session
pub fn logout(app: &App) -> Result<()> {
    app.session.clear();
    println!("Logged out");
    Ok(())
}

/// Show who is logged in
pub fn whoami(app: &App) -> Result<()> {
    match app.session.get() {
        Some(session) => {
            println!("{} (since {})", session.email, session.authenticated_at)
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

/// List a page of courses
pub async fn courses(app: &App, page: u32, limit: u32, query: Option<&str>) -> Result<()> {
    let courses = app.courses.list(page, limit, query).await?;

    if courses.is_empty() {
        println!("No courses found.");
        return Ok(());
    }

    println!("{:<6} {:<40} {:<12}", "ID", "TITLE", "STARTS");
    for course in &courses {
        println!(
            "{:<6} {:<40} {:<12}",
            course.id,
            truncate(&course.title, 40),
            course.start_date
        );
    }
    println!("\n{} course(s), page {}", courses.len(), page);
    Ok(())
}

/// Show a course with its lessons and enrollment state
pub async fn show(app: &App, id: i64) -> Result<()> {
    let course = app.courses.get(id).await?;
    let lessons = app.lessons.list_for_course(id).await?;
    let enrolled = app.enrollments.is_enrolled(id).await?;

    println!("{}", course.title);
    println!("{}", course.description);
    println!("\nStarts: {}", course.start_date);
    if let Some(phone) = &course.contact_phone {
        println!("Contact: {}", phone);
    }
    println!("Enrolled: {}", if enrolled { "yes" } else { "no" });

    println!("\nLessons:");
    if lessons.is_empty() {
        println!("  (no lessons yet)");
    }
    for lesson in &lessons {
        println!("  {:<6} {}", lesson.id, lesson.title);
    }
    Ok(())
}

/// Enroll in a course
pub async fn enroll(app: &App, id: i64) -> Result<()> {
    if app.enrollments.is_enrolled(id).await? {
        println!("Already enrolled in course {}", id);
        return Ok(());
    }

    let enrollment = app.enrollments.enroll(id).await?;
    println!(
        "Enrolled in course {} (enrollment #{})",
        enrollment.course_id, enrollment.id
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
