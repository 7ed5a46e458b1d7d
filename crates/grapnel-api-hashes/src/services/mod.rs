//! Business logic for the Hash Registry API.

pub mod hash_service;
