//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the conversion page and file downloads
//! - **[`models`]**: Form input and view state exchanged with the browser

pub mod handlers;
pub mod models;
