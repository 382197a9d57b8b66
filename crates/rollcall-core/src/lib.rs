//! Core types and operations for the Rollcall attendance backend.
//!
//! Holds the biometric log parser, the reconciler that folds parsed facts
//! into durable attendance state, and the [`store::AttendanceStore`] trait
//! those operations are written against. This crate is free of HTTP and
//! database dependencies.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;
pub mod holiday;
pub mod ingest;
pub mod login;
pub mod parse;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod store;
pub mod user;

pub use config::IngestConfig;
pub use error::{Error, Result};
