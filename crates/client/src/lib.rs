//! Machinery Store client library.
//!
//! This crate provides everything between the user interface and the remote
//! store service: the remote adapter, the shared domain cache, the admin
//! bootstrap guard and the catalog and inquiry view models.
//!
//! # Modules
//!
//! - [`remote`] - Backend trait, HTTP backend and the active connection
//! - [`cache`] - Keyed query cache with de-duplication and invalidation
//! - [`client`] - [`StoreClient`], cached reads and invalidating writes
//! - [`admin`] - Access state machine and the one-time admin claim
//! - [`catalog`] - Category/name filtering and catalog summaries
//! - [`inquiry`] - Inquiry drafts and the pending/resolved board

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod inquiry;
pub mod remote;

pub use admin::{AccessState, AdminGuard, ClaimError, ClaimStatus};
pub use cache::{CacheEvent, CacheKey, CacheStats, CacheSubscription, CacheValue, DomainCache};
pub use client::{Resolution, StoreClient};
pub use config::{CacheConfig, ClientConfig, ConfigError};
pub use error::{ClientError, ValidationError};
pub use remote::{Connection, HttpBackend, RoleAssignment, StoreBackend};
