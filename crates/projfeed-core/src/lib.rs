//! Core types and trait definitions for the projfeed project tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::DataStore`]; the event service and the
//! HTTP layer depend on that abstraction only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod error;
pub mod event;
pub mod record;
pub mod registry;
pub mod render;
pub mod store;
pub mod summary;
pub mod tables;
pub mod thread;

pub use error::{Error, Result};
