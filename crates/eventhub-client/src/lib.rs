//! Event Hub Client - HTTP access to remote sources
//!
//! This crate provides:
//!
//! - [`transport`] - the network seam and its `reqwest` implementation
//! - [`jsonapi`] - decoding of JSON-API style page envelopes
//! - [`cursor`] - pagination over a source's collection
//! - [`source`] - single-flight imports and event replay for one source
//!
//! # Overview
//!
//! A [`SourceClient`] walks every page of its source with a [`PageCursor`]
//! and hands each batch to a [`BatchHandler`]. Replays go out through the
//! same [`Transport`] using the source's update template.

pub mod cursor;
pub mod jsonapi;
pub mod source;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod stub;

// Re-export main client types
pub use cursor::PageCursor;
pub use source::{BatchHandler, SourceClient, DEFAULT_PAGE_SIZE};
pub use transport::{HttpTransport, Transport};
