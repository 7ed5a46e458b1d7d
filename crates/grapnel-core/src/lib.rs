//! Grapnel Core Library
//!
//! Shared domain vocabulary for the Grapnel hash intelligence exchange.
//!
//! This crate provides:
//! - The closed enumerations every other crate speaks ([`SourceSystem`],
//!   [`HashType`], [`Severity`], [`NotificationType`], [`NotificationStatus`])
//! - Hash value normalization and validation
//! - Size limits for caller-supplied JSON objects (metadata, filters, audit details)
//!
//! # Example
//!
//! ```
//! use grapnel_core::{normalize_and_validate, Severity, SourceSystem};
//!
//! let hash = normalize_and_validate("  ABCDEF0123456789  ").unwrap();
//! assert_eq!(hash, "abcdef0123456789");
//!
//! let source: SourceSystem = "trace".parse().unwrap();
//! assert_eq!(source, SourceSystem::Trace);
//! assert!(Severity::Critical.is_broadcast());
//! ```

pub mod bounded;
pub mod hash;
pub mod types;

pub use bounded::{validate_bounded_object, BoundsError, JsonBounds};
pub use hash::{
    normalize_and_validate, normalize_hash, validate_hash_value, HashValueError, MAX_HASH_LEN,
    MIN_HASH_LEN,
};
pub use types::{
    HashType, MatchType, NotificationStatus, NotificationType, ParseEnumError, Severity, SourceSystem,
};
