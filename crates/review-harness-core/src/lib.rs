//! # Review Harness Core
//!
//! Document annotation and cross-reference model for Review Harness:
//! data models, sectioning, issue queries, highlight rendering, location
//! resolution, and the conversation log.
//!
//! This crate contains no tokio, filesystem I/O, or other native-only
//! dependencies. All operations are synchronous functions over immutable
//! snapshots; the external services are expressed as async traits in
//! [`services`].
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`range`] | Half-open character intervals |
//! | [`models`] | Document, section, issue, analysis, message types |
//! | [`document`] | Building documents and offset lookups |
//! | [`annotations`] | Issue queries and reference verification |
//! | [`highlight`] | Interval-partition renderer |
//! | [`resolver`] | Reference ↔ page/section navigation |
//! | [`conversation`] | Append-only message log |
//! | [`services`] | Analysis service and response generator contracts |
//! | [`error`] | Error taxonomy |

pub mod annotations;
pub mod conversation;
pub mod document;
pub mod error;
pub mod highlight;
pub mod models;
pub mod range;
pub mod resolver;
pub mod services;

pub use error::{ReviewError, Result};
