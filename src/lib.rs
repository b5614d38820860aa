//! coursetrack - Course catalog client with a stale-while-revalidate cache
//!
//! coursetrack browses a remote course catalog and manages enrollment. The
//! interesting machinery is the client-side query cache: remote reads are
//! deduplicated, trusted for a configurable staleness window, garbage
//! collected when unobserved, and enrollment writes are applied optimistically
//! and reconciled with server truth afterwards.
//!
//! # Architecture
//!
//! - **cache**: query cache and optimistic-mutation coordinator
//! - **api**: HTTP client with the auth interceptor, wire types, and the
//!   per-resource services (courses, lessons, enrollments)
//! - **auth**: file-backed session store (the credential provider)
//! - **config**: ~/.config/coursetrack/config.yaml
//! - **retry**: capped exponential backoff for fetches

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod retry;

// Collaborators
pub mod api;
pub mod auth;
pub mod commands;
pub mod logging;

// Re-exports
pub use error::{CoursetrackError, Result};
