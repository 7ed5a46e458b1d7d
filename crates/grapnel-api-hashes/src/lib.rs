//! Hash Registry API for Grapnel.
//!
//! Partners register the content hashes they discover and look up hashes seen
//! by the other partners.
//!
//! ## Features
//!
//! - **POST /hashes/register**: append-only batch registration with
//!   cross-partner match detection; matches are handed to the notification
//!   dispatcher
//! - **POST /hashes/lookup**: cache-aside lookup aggregating every partner
//!   that has reported a hash
//! - **GET /hashes/stats**: registry totals, cached for five minutes
//!
//! ## Rate Limiting
//!
//! Lookups are limited to 100 per minute and registrations to 50 per minute
//! for each source system. When the cache backing the limiter is unavailable
//! requests are admitted.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::HashApiError;
pub use router::{hashes_router, HashesState};
pub use services::hash_service::HashService;
