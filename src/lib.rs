//! Vidgate - public media URL metadata gateway
//!
//! This library crate exposes the core functionality for integration testing.

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod platform;
pub mod server;
pub mod validate;
