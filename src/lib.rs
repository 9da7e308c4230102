//! Keygate - Per-Key Request Admission Control
//!
//! This crate bounds the request rate of arbitrary keys (users, clients,
//! API tokens) using a sliding window counter. Each key keeps two fixed
//! windows of counts and blends them with a linearly decaying weight, which
//! approximates a true sliding window in constant space per key.
//!
//! It also ships a small fixed-capacity LRU cache that is independent of the
//! limiter.

pub mod cache;
pub mod config;
pub mod error;
pub mod ratelimit;
