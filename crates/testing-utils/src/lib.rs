//! # Summary Testing Utils
//!
//! Shared testing utilities for the summary scheduler workspace.
//!
//! ## Features
//!
//! - **Mock Repository**: in-memory users, diaries and summaries with failure injection
//! - **Mock Collaborators**: recording channel, `mockall` generator, gated generator
//! - **Test Containers**: Redis and PostgreSQL via testcontainers
//! - **Test Data Builders**: [`WorkMessageBuilder`]
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! summary-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
