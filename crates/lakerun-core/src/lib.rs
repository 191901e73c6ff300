//! # lakerun-core
//!
//! Core abstractions for the lakerun pipeline coordination service.
//!
//! This crate provides the foundational types used across all lakerun
//! components:
//!
//! - **Identifiers**: Strongly-typed IDs for runs, events, and restores
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `lakerun-core` is the **only** crate allowed to define shared primitives.
//! All cross-component interaction happens via the types defined here.
//!
//! ## Example
//!
//! ```rust
//! use lakerun_core::RunId;
//!
//! // Generate a unique run ID before any persistence happens.
//! let run_id = RunId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;

pub use error::{Error, Result};
pub use id::{EventId, RestoreId, RunId};
