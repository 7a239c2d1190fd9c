//! Cached store client.
//!
//! [`StoreClient`] owns the current remote session and the domain cache.
//! Reads go through the cache; writes go through [`DomainCache::mutate`] and
//! invalidate the keys they affect.
//!
//! Without a session, reads return empty defaults so anonymous browsing
//! never fails, while writes fail fast with [`ClientError::NotConnected`].

use std::future::Future;
use std::sync::Arc;

use machinery_store_core::{
    Cart, Category, Inquiry, InquiryId, Principal, Product, ProductId, ProductInput, UserProfile,
    UserRole,
};
use tracing::{info, instrument, warn};

use crate::cache::{CacheKey, CacheValue, DomainCache};
use crate::catalog::{CategoryFilter, validate_product};
use crate::config::CacheConfig;
use crate::error::{ClientError, ValidationError};
use crate::inquiry::InquiryDraft;
use crate::remote::{Connection, RoleAssignment, StoreBackend};

/// Outcome of [`StoreClient::resolve_inquiry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The remote service marked the inquiry resolved.
    Resolved,
    /// The cached list already showed it resolved; nothing was sent.
    AlreadyResolved,
}

/// Client for the remote store service with a shared domain cache.
///
/// Cheaply cloneable; every clone shares the session and the cache.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<StoreClientInner>,
}

struct StoreClientInner {
    connection: Connection,
    cache: DomainCache,
}

impl StoreClient {
    /// Create a disconnected client.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(StoreClientInner {
                connection: Connection::new(),
                cache: DomainCache::new(config),
            }),
        }
    }

    /// Start a session on `backend`. Anything cached by a previous session
    /// is dropped.
    pub fn connect(&self, backend: Arc<dyn StoreBackend>) {
        let caller = backend.caller().map(ToString::to_string);
        self.inner.connection.connect(backend);
        self.inner.cache.clear();
        info!(caller = ?caller, "Store session started");
    }

    /// End the current session and drop all cached data.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
        self.inner.cache.clear();
        info!("Store session ended");
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Identifies the current session; changes on every connect and
    /// disconnect.
    #[must_use]
    pub fn session(&self) -> u64 {
        self.inner.connection.session()
    }

    /// Principal of the current session, if authenticated.
    #[must_use]
    pub fn caller(&self) -> Option<Principal> {
        self.inner.connection.identity()
    }

    /// The shared domain cache.
    #[must_use]
    pub fn cache(&self) -> &DomainCache {
        &self.inner.cache
    }

    fn backend(&self) -> Option<Arc<dyn StoreBackend>> {
        self.inner.connection.backend()
    }

    /// Read `key` through the cache. Returns `None` when disconnected.
    async fn cached<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
        extract: fn(CacheValue) -> Option<T>,
    ) -> Result<Option<T>, ClientError>
    where
        F: Fn(Arc<dyn StoreBackend>) -> Fut,
        Fut: Future<Output = Result<CacheValue, ClientError>> + Send + 'static,
    {
        if !self.is_connected() {
            warn!(key = %key, "Not connected, returning empty result");
            return Ok(None);
        }

        // Resolve the backend per attempt so a retry after a session change
        // never calls the old session.
        let value = self
            .inner
            .cache
            .read(&key, || {
                let pending = self.backend().map(&fetch);
                async move {
                    match pending {
                        Some(pending) => pending.await,
                        None => Err(ClientError::NotConnected),
                    }
                }
            })
            .await;

        match value {
            Ok(value) => extract(value)
                .map(Some)
                .ok_or_else(|| ClientError::Decode(format!("unexpected cached value for {key}"))),
            Err(ClientError::NotConnected) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Run a write against the current session and invalidate `affected`
    /// on success.
    async fn write<T, F, Fut>(&self, affected: &[CacheKey], op: F) -> Result<T, ClientError>
    where
        F: FnOnce(Arc<dyn StoreBackend>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let backend = self.backend().ok_or(ClientError::NotConnected)?;
        self.inner.cache.mutate(op(backend), affected).await
    }

    // =========================================================================
    // Catalog Reads
    // =========================================================================

    /// Full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        let products = self
            .cached(
                CacheKey::Products,
                |b| async move { b.list_products().await.map(CacheValue::Products) },
                CacheValue::into_products,
            )
            .await?;
        Ok(products.unwrap_or_default())
    }

    /// Products in one category, filtered by the remote service. `All`
    /// reads the full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn products_in_category(
        &self,
        filter: &CategoryFilter,
    ) -> Result<Vec<Product>, ClientError> {
        let CategoryFilter::Named(name) = filter else {
            return self.list_products().await;
        };

        let owned = name.clone();
        let products = self
            .cached(
                CacheKey::ProductsByCategory(name.clone()),
                move |b| {
                    let name = owned.clone();
                    async move {
                        b.filter_products_by_category(&name)
                            .await
                            .map(CacheValue::Products)
                    }
                },
                CacheValue::into_products,
            )
            .await?;
        Ok(products.unwrap_or_default())
    }

    /// Products whose name matches `term`, searched by the remote service.
    /// A blank term reads the full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, ClientError> {
        let term = term.trim();
        if term.is_empty() {
            return self.list_products().await;
        }

        let owned = term.to_string();
        let products = self
            .cached(
                CacheKey::ProductsSearch(term.to_string()),
                move |b| {
                    let term = owned.clone();
                    async move {
                        b.search_products_by_name(&term)
                            .await
                            .map(CacheValue::Products)
                    }
                },
                CacheValue::into_products,
            )
            .await?;
        Ok(products.unwrap_or_default())
    }

    /// One product, or `None` if it does not exist or there is no session.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails for any other reason.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, ClientError> {
        let result = self
            .cached(
                CacheKey::Product(id),
                move |b| async move {
                    b.get_product(id)
                        .await
                        .map(|p| CacheValue::Product(Box::new(p)))
                },
                CacheValue::into_product,
            )
            .await;

        match result {
            Err(ClientError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        let categories = self
            .cached(
                CacheKey::Categories,
                |b| async move { b.list_categories().await.map(CacheValue::Categories) },
                CacheValue::into_categories,
            )
            .await?;
        Ok(categories.unwrap_or_default())
    }

    // =========================================================================
    // Catalog Writes
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call, `NotConnected`
    /// without a session, or the remote rejection.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<(), ClientError> {
        let input = validate_product(input)?;
        self.write(&[CacheKey::Products], |b| async move {
            b.create_product(&input).await
        })
        .await
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// See [`StoreClient::create_product`].
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<(), ClientError> {
        let input = validate_product(input)?;
        self.write(&[CacheKey::Products], |b| async move {
            b.update_product(id, &input).await
        })
        .await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ClientError> {
        self.write(&[CacheKey::Products], |b| async move {
            b.delete_product(id).await
        })
        .await
    }

    /// Add a category by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, `NotConnected` without
    /// a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn add_category(&self, name: &str) -> Result<Category, ClientError> {
        let category = Category::new(name).ok_or(ValidationError::EmptyCategory)?;
        let sent = category.clone();
        self.write(&[CacheKey::Categories], |b| async move {
            b.add_category(&sent).await
        })
        .await?;
        Ok(category)
    }

    /// Remove a category.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn remove_category(&self, category: &Category) -> Result<(), ClientError> {
        self.write(&[CacheKey::Categories], |b| async move {
            b.remove_category(category).await
        })
        .await
    }

    // =========================================================================
    // Inquiries
    // =========================================================================

    /// Validate and submit a purchase inquiry.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call, `NotConnected`
    /// without a session, or the remote rejection.
    #[instrument(skip(self, draft))]
    pub async fn submit_inquiry(&self, draft: &InquiryDraft) -> Result<(), ClientError> {
        let input = draft.validate()?;
        self.write(&[CacheKey::Inquiries], |b| async move {
            b.submit_inquiry(&input).await
        })
        .await
    }

    /// All inquiries (admin only on the remote service).
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn list_inquiries(&self) -> Result<Vec<Inquiry>, ClientError> {
        let inquiries = self
            .cached(
                CacheKey::Inquiries,
                |b| async move { b.get_all_inquiries().await.map(CacheValue::Inquiries) },
                CacheValue::into_inquiries,
            )
            .await?;
        Ok(inquiries.unwrap_or_default())
    }

    /// Mark an inquiry resolved. Skips the remote call when the cached list
    /// already shows it resolved.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn resolve_inquiry(&self, id: InquiryId) -> Result<Resolution, ClientError> {
        let known_resolved = self
            .inner
            .cache
            .peek(&CacheKey::Inquiries)
            .await
            .and_then(CacheValue::into_inquiries)
            .is_some_and(|inquiries| inquiries.iter().any(|i| i.id == id && i.resolved));
        if known_resolved {
            return Ok(Resolution::AlreadyResolved);
        }

        self.write(&[CacheKey::Inquiries], |b| async move {
            b.mark_inquiry_resolved(id).await
        })
        .await?;
        Ok(Resolution::Resolved)
    }

    // =========================================================================
    // Roles & Profiles
    // =========================================================================

    /// Whether the remote service considers the caller an admin. `false`
    /// without a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn is_admin(&self) -> Result<bool, ClientError> {
        let flag = self
            .cached(
                CacheKey::IsAdmin,
                |b| async move { b.is_caller_admin().await.map(CacheValue::Flag) },
                |v| v.as_flag(),
            )
            .await?;
        Ok(flag.unwrap_or(false))
    }

    /// The caller's role. `Guest` without a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn caller_role(&self) -> Result<UserRole, ClientError> {
        let role = self
            .cached(
                CacheKey::CallerRole,
                |b| async move { b.get_caller_user_role().await.map(CacheValue::Role) },
                |v| v.as_role(),
            )
            .await?;
        Ok(role.unwrap_or_default())
    }

    /// Forward a role assignment (used by the admin claim).
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self, assignment), fields(user = %assignment.user, role = %assignment.role))]
    pub async fn assign_caller_user_role(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), ClientError> {
        self.write(&[CacheKey::IsAdmin, CacheKey::CallerRole], |b| async move {
            b.assign_caller_user_role(assignment).await
        })
        .await
    }

    /// The caller's profile, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn caller_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        let profile = self
            .cached(
                CacheKey::CallerProfile,
                |b| async move {
                    b.get_caller_user_profile()
                        .await
                        .map(CacheValue::Profile)
                },
                CacheValue::into_profile,
            )
            .await?;
        Ok(profile.flatten())
    }

    /// Another identity's profile. Not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
        match self.backend() {
            Some(backend) => backend.get_user_profile(user).await,
            None => Ok(None),
        }
    }

    /// Save the caller's display name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, `NotConnected` without a
    /// session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn save_profile(&self, name: &str) -> Result<(), ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let profile = UserProfile {
            name: name.to_string(),
        };
        self.write(&[CacheKey::CallerProfile], |b| async move {
            b.save_caller_user_profile(&profile).await
        })
        .await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// The caller's cart. Empty without a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn cart(&self) -> Result<Cart, ClientError> {
        let cart = self
            .cached(
                CacheKey::Cart,
                |b| async move { b.view_cart().await.map(CacheValue::Cart) },
                CacheValue::into_cart,
            )
            .await?;
        Ok(cart.unwrap_or_default())
    }

    /// Add units of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns a validation error for zero quantity, `NotConnected` without
    /// a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, product: ProductId, quantity: u64) -> Result<(), ClientError> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity(product).into());
        }
        self.write(&[CacheKey::Cart], |b| async move {
            b.add_to_cart(product, quantity).await
        })
        .await
    }

    /// Remove a product line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product: ProductId) -> Result<(), ClientError> {
        self.write(&[CacheKey::Cart], |b| async move {
            b.remove_from_cart(product).await
        })
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without a session, or the remote rejection.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), ClientError> {
        self.write(&[CacheKey::Cart], |b| async move { b.clear_cart().await })
            .await
    }
}
