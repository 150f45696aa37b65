//! HTTP request handlers.
//!
//! - [`convert`]: the conversion form (`GET /`, `POST /`)
//! - [`download`]: generated file downloads (`GET /download/{filename}`)

pub mod convert;
pub mod download;
