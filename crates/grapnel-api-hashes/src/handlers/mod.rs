//! HTTP handlers for the Hash Registry API.

pub mod hashes;

pub use hashes::{lookup_handler, register_handler, stats_handler};
