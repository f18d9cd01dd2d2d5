//! axum integration for serving hypermedia documents
//!
//! Handlers build a descriptor, negotiate the format from `Accept`, and
//! return a [`HypermediaResponse`]. Build errors become a `500` problem
//! body; a half-built document is never sent.

pub mod response;

pub use response::{negotiate_from_headers, render, ErrorResponse, HypermediaResponse};
