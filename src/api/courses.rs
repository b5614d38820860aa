//! Cached course reads and mutations

use super::client::ApiClient;
use super::types::{Course, CourseUpdate, NewCourse};
use crate::cache::{KeyPart, QueryClient, QueryConfig, QueryKey};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Staleness window for the paginated course list
const LIST_STALE_AFTER: Duration = Duration::from_secs(30);
/// Staleness window for a single course
const DETAIL_STALE_AFTER: Duration = Duration::from_secs(60);

/// Course catalog access through the cache
#[derive(Debug)]
pub struct CourseService {
    queries: QueryClient,
    api: Arc<ApiClient>,
    list_config: QueryConfig,
    detail_config: QueryConfig,
}

impl CourseService {
    /// Create a service with the default staleness windows
    pub fn new(queries: QueryClient, api: Arc<ApiClient>) -> Self {
        Self {
            queries,
            api,
            list_config: QueryConfig::default().with_stale_after(LIST_STALE_AFTER),
            detail_config: QueryConfig::default().with_stale_after(DETAIL_STALE_AFTER),
        }
    }

    /// Override the query configurations
    pub fn with_configs(mut self, list: QueryConfig, detail: QueryConfig) -> Self {
        self.list_config = list;
        self.detail_config = detail;
        self
    }

    /// Cache key for a single course
    pub fn course_key(id: i64) -> QueryKey {
        QueryKey::new().part("course").part(id)
    }

    /// Cache key for one page of the course list
    pub fn list_key(page: u32, limit: u32, q: Option<&str>) -> QueryKey {
        let mut params = json!({"page": page, "limit": limit});
        if let Some(q) = q {
            params["q"] = json!(q);
        }
        QueryKey::new().part("courses").part(KeyPart::json(&params))
    }

    /// Prefix covering every cached course-list page
    pub fn list_prefix() -> QueryKey {
        QueryKey::new().part("courses")
    }

    /// Fetch a page of courses, optionally filtered by a search term
    pub async fn list(&self, page: u32, limit: u32, q: Option<&str>) -> Result<Vec<Course>> {
        let key = Self::list_key(page, limit, q);
        let api = Arc::clone(&self.api);
        let q = q.map(str::to_string);

        let value = self
            .queries
            .fetch(
                &key,
                move || {
                    let api = Arc::clone(&api);
                    let q = q.clone();
                    async move {
                        let mut query = vec![
                            ("_page", page.to_string()),
                            ("_limit", limit.to_string()),
                        ];
                        if let Some(q) = q {
                            query.push(("q", q));
                        }
                        api.get_json("/courses", &query).await
                    }
                },
                &self.list_config,
            )
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    /// Fetch a single course
    pub async fn get(&self, id: i64) -> Result<Course> {
        let key = Self::course_key(id);
        let api = Arc::clone(&self.api);

        let value = self
            .queries
            .fetch(
                &key,
                move || {
                    let api = Arc::clone(&api);
                    async move { api.get_json(&format!("/courses/{}", id), &[]).await }
                },
                &self.detail_config,
            )
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    /// Create a course. Every cached list page is invalidated so the new
    /// course shows up on the next observation.
    pub async fn create(&self, course: &NewCourse) -> Result<Course> {
        let api = Arc::clone(&self.api);
        let body = serde_json::to_value(course)?;

        let created: Course = self
            .queries
            .mutate(Vec::new(), |_| {}, async move {
                let value = api.post_json("/courses", &body).await?;
                Ok(serde_json::from_value::<Course>(value)?)
            })
            .await?;

        self.queries.invalidate_prefix(&Self::list_prefix());
        Ok(created)
    }

    /// Apply a partial update to a course. The detail entry and the list
    /// pages are refetched on next observation.
    pub async fn update(&self, id: i64, update: &CourseUpdate) -> Result<Course> {
        let key = Self::course_key(id);
        let api = Arc::clone(&self.api);
        let body = serde_json::to_value(update)?;

        let updated: Course = self
            .queries
            .mutate(vec![key], |_| {}, async move {
                let value = api.patch_json(&format!("/courses/{}", id), &body).await?;
                Ok(serde_json::from_value::<Course>(value)?)
            })
            .await?;

        self.queries.invalidate_prefix(&Self::list_prefix());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_key_is_canonical_across_param_order() {
        // Same page/limit must collide regardless of construction order
        let a = CourseService::list_key(1, 10, None);
        let b = CourseService::list_key(1, 10, None);
        assert_eq!(a, b);

        let with_q = CourseService::list_key(1, 10, Some("rust"));
        assert_ne!(a, with_q);
    }

    #[test]
    fn test_list_keys_share_the_list_prefix() {
        let prefix = CourseService::list_prefix();
        assert!(CourseService::list_key(1, 10, None).starts_with(&prefix));
        assert!(CourseService::list_key(3, 20, Some("rust")).starts_with(&prefix));
        assert!(!CourseService::course_key(42).starts_with(&prefix));
    }
}
