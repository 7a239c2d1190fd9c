//! Remote store service interface.
//!
//! # Architecture
//!
//! - The remote service owns every entity and all business rules
//! - [`StoreBackend`] mirrors its operations one-to-one
//! - [`HttpBackend`] speaks JSON over HTTP; tests plug in in-memory fakes
//!
//! A backend value is bound to one caller identity for its whole life. A new
//! login means a new backend.

mod connection;
mod http;

pub use connection::Connection;
pub use http::HttpBackend;

use async_trait::async_trait;
use machinery_store_core::{
    Cart, Category, Inquiry, InquiryId, InquiryInput, Principal, Product, ProductId, ProductInput,
    UserProfile, UserRole,
};
use secrecy::SecretString;

use crate::error::ClientError;

/// Arguments for `assignCallerUserRole`.
///
/// The one-time admin claim sends the caller's own principal, the `Admin`
/// role and the claim secret.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub user: Principal,
    pub role: UserRole,
    pub secret: Option<SecretString>,
}

impl RoleAssignment {
    /// Build the admin claim for `user`.
    #[must_use]
    pub const fn admin_claim(user: Principal, secret: SecretString) -> Self {
        Self {
            user,
            role: UserRole::Admin,
            secret: Some(secret),
        }
    }
}

/// Typed operations exposed by the remote store service.
///
/// Implementations report service rejections through
/// [`ClientError::from_remote_message`] so authorization failures are
/// distinguishable from other errors.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// The principal this backend calls as, if authenticated.
    fn caller(&self) -> Option<&Principal>;

    // Catalog
    async fn list_products(&self) -> Result<Vec<Product>, ClientError>;
    async fn get_product(&self, id: ProductId) -> Result<Product, ClientError>;
    async fn filter_products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ClientError>;
    async fn search_products_by_name(&self, term: &str) -> Result<Vec<Product>, ClientError>;
    async fn create_product(&self, input: &ProductInput) -> Result<(), ClientError>;
    async fn update_product(&self, id: ProductId, input: &ProductInput)
    -> Result<(), ClientError>;
    async fn delete_product(&self, id: ProductId) -> Result<(), ClientError>;

    // Categories
    async fn list_categories(&self) -> Result<Vec<Category>, ClientError>;
    async fn add_category(&self, category: &Category) -> Result<(), ClientError>;
    async fn remove_category(&self, category: &Category) -> Result<(), ClientError>;

    // Inquiries
    async fn submit_inquiry(&self, input: &InquiryInput) -> Result<(), ClientError>;
    async fn get_all_inquiries(&self) -> Result<Vec<Inquiry>, ClientError>;
    async fn mark_inquiry_resolved(&self, id: InquiryId) -> Result<(), ClientError>;

    // Roles
    async fn is_caller_admin(&self) -> Result<bool, ClientError>;
    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError>;
    async fn assign_caller_user_role(&self, assignment: &RoleAssignment)
    -> Result<(), ClientError>;

    // Profiles
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError>;
    async fn get_user_profile(&self, user: &Principal)
    -> Result<Option<UserProfile>, ClientError>;
    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError>;

    // Cart
    async fn add_to_cart(&self, product: ProductId, quantity: u64) -> Result<(), ClientError>;
    async fn remove_from_cart(&self, product: ProductId) -> Result<(), ClientError>;
    async fn clear_cart(&self) -> Result<(), ClientError>;
    async fn view_cart(&self) -> Result<Cart, ClientError>;
}
