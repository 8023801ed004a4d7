//! Pipeline stages and orchestration for bizscout.
//!
//! This crate ties the places, website, and domain-intelligence clients to
//! the record store: discovery inserts companies, website enrichment fills
//! their emails, and domain enrichment merges organization data and people.

pub mod discovery;
pub mod enrichment;
pub mod pipeline;
pub mod website;

#[cfg(test)]
pub(crate) mod testing;
