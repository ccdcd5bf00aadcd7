//! services/api/src/lib.rs
//!
//! The companion service library: configuration, the adapters that implement the
//! core ports, and the axum web layer. The binaries in `src/bin` wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
