//! Core types for the machinery store.
//!
//! This module provides type-safe wrappers for the entities exposed by the
//! remote store service.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod id;
pub mod inquiry;
pub mod price;
pub mod role;

pub use cart::{Cart, CartItem, CartTotalError};
pub use catalog::{Category, Product, ProductInput};
pub use email::{Email, EmailError};
pub use id::*;
pub use inquiry::{Inquiry, InquiryInput};
pub use price::Price;
pub use role::{Principal, PrincipalError, UserProfile, UserRole};
