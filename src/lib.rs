//! Online HSP Document Library.
//!
//! Serves the HSP reference, documents and samples from the library
//! database, with an offline-built page cache in front of the renderer.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
