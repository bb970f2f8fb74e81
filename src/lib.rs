//! # Foodgram Backend Library
//!
//! Recipe sharing over a REST API: users publish recipes with tags and
//! ingredients, follow authors, keep favorites and a shopping cart, and
//! download the cart as one aggregated shopping list.
//!
//! ## Core Components
//!
//! - [`shopping`]: cart snapshot, ingredient aggregation and PDF/text rendering
//! - [`routes`]: HTTP handlers and the application router
//! - [`auth`]: password hashing, API tokens and user extractors
//! - [`db`]: SQLite schema and fixture loading
//! - [`config`]: layered configuration
//! - [`error`]: `AppError` and the JSON error envelope
//! - [`middleware`]: rate limiting, request validation, security headers
//! - [`pagination`], [`metrics`], [`state`], [`types`]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod shopping;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
