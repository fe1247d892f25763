//! Galleria - self-hosted media gallery server
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod error;
pub mod images;
pub mod library;
pub mod server;
pub mod streaming;
