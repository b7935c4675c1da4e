//! Shared test utilities for the loom workspace
//!
//! Fixtures describing a small blog domain, an in-memory user store that
//! counts how often it is hit, and helpers for reading responses of woven
//! schemas. Used by the integration suites of `loom-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use loom_test_utils::{init_tracing, response_json, user_silk, MockUserStore};
//!
//! #[tokio::test]
//! async fn test_with_fixtures() {
//!     init_tracing();
//!     let store = MockUserStore::seeded();
//!     // build containers around user_silk() and store.find(..)
//! }
//! ```

mod fixtures;
mod logging;
mod response;
mod store;

pub use fixtures::{email, positive_int, post_silk, user_silk, POST, ROLE, USER};
pub use logging::init_tracing;
pub use response::{error_messages, response_json};
pub use store::{MockUserStore, UserLoader};
