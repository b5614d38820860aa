//! Client-side data cache and optimistic-mutation coordinator
//!
//! The cache decides when remote data is fetched, how long it is trusted,
//! how concurrent requests for the same resource are deduplicated, and how
//! local writes are applied immediately and reconciled with server truth.
//! Everything is enforced client-side; the remote API is an opaque async
//! function per resource.
//!
//! # Architecture
//!
//! - **store**: keyed entry table — generation-guarded writes, subscriber
//!   counting, garbage collection
//! - **inflight**: one abortable fetch per key; joiners share its outcome
//! - **query**: [`QueryClient::observe`]/[`QueryClient::fetch`] — staleness
//!   checks, retry policy, background refetch
//! - **mutation**: [`QueryClient::mutate`] — cancel, snapshot, optimistic
//!   apply, rollback on failure, settle always
//!
//! Writes to a key are ordered by generation, not completion time: a result
//! tagged with an older generation than the entry's current one is discarded.
//! That guard is what makes cancel-before-optimistic-apply sufficient even
//! when a fetch cannot truly be aborted mid-flight.
//!
//! # Example
//!
//! ```ignore
//! use coursetrack::cache::{QueryClient, QueryConfig, QueryKey};
//!
//! let client = QueryClient::new();
//! let key = QueryKey::new().part("course").part(42);
//!
//! let course = client
//!     .fetch(&key, move || fetch_course(42), &QueryConfig::default())
//!     .await?;
//! ```

mod entry;
mod inflight;
mod key;
mod mutation;
mod query;
mod store;

pub use entry::{QueryConfig, QuerySnapshot, QueryStatus};
pub use inflight::InflightRegistry;
pub use key::{KeyPart, QueryKey};
pub use query::QueryClient;
pub use store::{CacheStore, SubscriberGuard};
