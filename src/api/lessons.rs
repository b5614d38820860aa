//! Cached lesson reads

use super::client::ApiClient;
use super::types::Lesson;
use crate::cache::{QueryClient, QueryConfig, QueryKey};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

const STALE_AFTER: Duration = Duration::from_secs(60);

/// Lesson access through the cache
#[derive(Debug)]
pub struct LessonService {
    queries: QueryClient,
    api: Arc<ApiClient>,
    config: QueryConfig,
}

impl LessonService {
    pub fn new(queries: QueryClient, api: Arc<ApiClient>) -> Self {
        Self {
            queries,
            api,
            config: QueryConfig::default().with_stale_after(STALE_AFTER),
        }
    }

    /// Override the query configuration
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Cache key for a course's lessons
    pub fn lessons_key(course_id: i64) -> QueryKey {
        QueryKey::new().part("lessons").part(course_id)
    }

    /// Fetch the lessons belonging to a course
    pub async fn list_for_course(&self, course_id: i64) -> Result<Vec<Lesson>> {
        let key = Self::lessons_key(course_id);
        let api = Arc::clone(&self.api);

        let value = self
            .queries
            .fetch(
                &key,
                move || {
                    let api = Arc::clone(&api);
                    async move {
                        api.get_json("/lessons", &[("courseId", course_id.to_string())])
                            .await
                    }
                },
                &self.config,
            )
            .await?;

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lessons_key_per_course() {
        assert_eq!(
            LessonService::lessons_key(42).to_string(),
            "[\"lessons\", 42]"
        );
        assert_ne!(LessonService::lessons_key(42), LessonService::lessons_key(7));
    }
}
