//! Company website fetching and contact-email extraction.
//!
//! This crate provides:
//! - [`PageFetcher`]: the fetch seam used by the website enrichment stage
//! - [`HttpFetcher`]: reqwest-backed implementation with classified failures
//! - [`extract_emails`]: pure HTML to email list routine

pub mod engine;
pub mod extract;

pub use engine::{HttpFetcher, PageFetcher};
pub use extract::extract_emails;
