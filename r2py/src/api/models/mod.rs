//! API request and response data models.

pub mod conversions;
