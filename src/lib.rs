//! DOI Fetcher Library
//!
//! Fetches PDF documents for a list of DOIs by driving a real browser through
//! a set of mirrors. Pages are polled until they show a document, a "not
//! available" notice or an anti-bot challenge (which the operator completes
//! by hand); documents are captured through native browser downloads, and
//! progress is kept in a ledger so interrupted runs resume.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
