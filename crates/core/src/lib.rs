//! Machinery Store Core - Shared domain types.
//!
//! This crate provides the types that cross the remote service boundary and
//! are shared by every client component:
//! - `client` - Remote adapter, domain cache, admin guard and view models
//! - `cli` - Command-line tools for browsing and administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no caching. All entities are owned by the remote service; these
//! are the shapes the client holds copies of.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices in minor units, emails, roles and catalog entities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
