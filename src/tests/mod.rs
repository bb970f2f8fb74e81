//! Integration tests: each test builds the full router on a fresh SQLite file
//! and drives it with `tower::ServiceExt::oneshot`.
//!
//! - **api_tests**: users, tokens, subscriptions, catalogue
//! - **recipe_tests**: recipe CRUD, filters, favorites and cart
//! - **shopping_tests**: cart snapshot, aggregation and downloads
//! - **error_tests**: error envelope and conversions
//! - **config_tests**: configuration layering and validation
//! - **db_tests**: schema, cascades and fixtures
//! - **health_api_tests**: probes and metrics

mod common;

mod api_tests;
mod health_api_tests;
