//! Shared utilities.
//!
//! - **URL policy**: configuration-time validation of source and proxy URLs
//! - **Text hygiene**: plain-text-ification of third-party content before it
//!   reaches a terminal

pub mod text;
mod url_validator;

pub use url_validator::{ensure_public_http_url, UrlPolicyError};
