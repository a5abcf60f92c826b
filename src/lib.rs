//! # Review Harness
//!
//! A document review workspace: a document is split into sections and
//! pages, an analysis service anchors issues to character ranges inside the
//! sections, and a side chat answers questions with references that resolve
//! to navigable locations.
//!
//! The document model, highlighting and reference resolution live in
//! [`review_harness_core`]. This crate adds the async session, plain-text
//! ingestion, simulated collaborators, export and the `rvw` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐
//! │  Ingest  │──▶│  Document  │──▶│  Workspace  │◀── send(text)
//! │  (text)  │   │  (core)    │   │  snapshot   │
//! └──────────┘   └────────────┘   └──────┬──────┘
//!                                        │
//!                  ┌─────────────────────┼─────────────────┐
//!                  ▼                     ▼                 ▼
//!            ┌──────────┐         ┌────────────┐    ┌────────────┐
//!            │ Analysis │         │ Generator  │    │  Renderer  │
//!            │ service  │         │ (FIFO)     │    │  Resolver  │
//!            └──────────┘         └────────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rvw analyze essay.md
//! rvw render essay.md --format html --select 2
//! rvw resolve essay.md page:3
//! rvw chat essay.md
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | Plain-text ingestion and heading-based sections |
//! | [`simulated`] | Simulated analysis service and response generator |
//! | [`workspace`] | Async session: analysis arrival, FIFO turns, cancellation |
//! | [`library`] | Uploaded documents, deduplicated by content |
//! | [`export`] | Whole-document rendering as text, HTML or JSON |

pub mod config;
pub mod export;
pub mod ingest;
pub mod library;
pub mod simulated;
pub mod workspace;
