//! Enrollment state and the optimistic enroll mutation

use super::client::ApiClient;
use super::types::Enrollment;
use crate::cache::{QueryClient, QueryConfig, QueryKey};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const STALE_AFTER: Duration = Duration::from_secs(60);

/// The mock backend ships a single seeded user
const DEFAULT_USER_ID: i64 = 1;

/// Enrollment access through the cache
#[derive(Debug)]
pub struct EnrollmentService {
    queries: QueryClient,
    api: Arc<ApiClient>,
    config: QueryConfig,
    user_id: i64,
}

impl EnrollmentService {
    pub fn new(queries: QueryClient, api: Arc<ApiClient>) -> Self {
        Self {
            queries,
            api,
            config: QueryConfig::default().with_stale_after(STALE_AFTER),
            user_id: DEFAULT_USER_ID,
        }
    }

    /// Override the query configuration
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Act as a different user
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Cache key for the user's enrollment state in a course
    pub fn enrolled_key(course_id: i64) -> QueryKey {
        QueryKey::new().part("enrolled").part(course_id)
    }

    /// Whether the user is enrolled in the course (cached)
    pub async fn is_enrolled(&self, course_id: i64) -> Result<bool> {
        let key = Self::enrolled_key(course_id);
        let api = Arc::clone(&self.api);
        let user_id = self.user_id;

        let value = self
            .queries
            .fetch(
                &key,
                move || {
                    let api = Arc::clone(&api);
                    async move {
                        let rows = api
                            .get_json(
                                "/enrollments",
                                &[
                                    ("courseId", course_id.to_string()),
                                    ("userId", user_id.to_string()),
                                ],
                            )
                            .await?;
                        let enrolled = rows.as_array().map(|r| !r.is_empty()).unwrap_or(false);
                        Ok(Value::Bool(enrolled))
                    }
                },
                &self.config,
            )
            .await?;

        Ok(value.as_bool().unwrap_or(false))
    }

    /// Enroll the user in a course with an optimistic local update.
    ///
    /// The cached enrolled flag flips to true before the remote write; a
    /// rejected write rolls it back, and either way the key is marked stale
    /// so the next observation fetches server truth.
    pub async fn enroll(&self, course_id: i64) -> Result<Enrollment> {
        let key = Self::enrolled_key(course_id);
        let api = Arc::clone(&self.api);
        let body = json!({"courseId": course_id, "userId": self.user_id});

        self.queries
            .mutate(
                vec![key.clone()],
                |store| store.set_data(&key, Value::Bool(true)),
                async move {
                    let value = api.post_json("/enrollments", &body).await?;
                    Ok(serde_json::from_value::<Enrollment>(value)?)
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrolled_key_shape() {
        assert_eq!(
            EnrollmentService::enrolled_key(7).to_string(),
            "[\"enrolled\", 7]"
        );
    }
}
