//! Integration tests for the Machinery Store client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p machinery-store-integration-tests
//! ```
//!
//! # Test Support
//!
//! [`FakeStore`] is an in-memory stand-in for the remote service that
//! enforces the same authorization rules, assigns ids, and counts every
//! call. [`FakeStore::backend_for`] hands out a [`FakeBackend`] bound to one
//! caller identity, so several identities can share one store. Individual
//! operations can be held open with [`FakeStore::hold`] to exercise
//! concurrent reads.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use machinery_store_client::{CacheConfig, ClientError, RoleAssignment, StoreBackend, StoreClient};
use machinery_store_core::{
    Cart, CartItem, Category, Inquiry, InquiryId, InquiryInput, Price, Principal, Product,
    ProductId, ProductInput, UserProfile, UserRole,
};
use secrecy::ExposeSecret;
use tokio::sync::watch;

/// Secret that unlocks the one-time admin claim.
pub const ADMIN_SECRET: &str = "open-sesame";

/// Holds an operation open until released.
#[derive(Clone)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Let every held and future call through.
    pub fn release(&self) {
        self.open.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.open.subscribe();
        loop {
            let open = *rx.borrow_and_update();
            if open || rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Default)]
struct StoreState {
    products: BTreeMap<ProductId, Product>,
    next_product_id: u64,
    categories: BTreeSet<Category>,
    inquiries: Vec<Inquiry>,
    next_inquiry_id: u64,
    roles: HashMap<Principal, UserRole>,
    admin_assigned: bool,
    profiles: HashMap<Principal, UserProfile>,
    carts: HashMap<Principal, Vec<CartItem>>,
}

/// In-memory remote service shared by every [`FakeBackend`] it creates.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    gates: Mutex<HashMap<&'static str, Gate>>,
    next_gates: Mutex<HashMap<&'static str, Gate>>,
}

impl FakeStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A backend calling as `caller` (anonymous when `None`).
    #[must_use]
    pub fn backend_for(self: &Arc<Self>, caller: Option<&str>) -> Arc<dyn StoreBackend> {
        Arc::new(FakeBackend {
            store: Arc::clone(self),
            caller: caller.and_then(|c| Principal::parse(c).ok()),
        })
    }

    /// Number of times `method` (remote name, e.g. `"listProducts"`) was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Hold every subsequent call of `method` until the gate is released.
    #[must_use]
    pub fn hold(&self, method: &'static str) -> Gate {
        let gate = Gate::new();
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, gate.clone());
        gate
    }

    /// Hold only the next call of `method`; later calls pass straight through.
    #[must_use]
    pub fn hold_next(&self, method: &'static str) -> Gate {
        let gate = Gate::new();
        self.next_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, gate.clone());
        gate
    }

    /// Insert a product directly, bypassing authorization.
    pub fn seed_product(&self, name: &str, category: &str, price: u64) -> ProductId {
        let mut state = self.lock();
        state.next_product_id += 1;
        let id = ProductId::new(state.next_product_id);
        state.products.insert(
            id,
            Product {
                id,
                name: name.to_string(),
                description: String::new(),
                price: Price::from_minor(price),
                stock: 5,
                available: true,
                category: category.to_string(),
                image_url: String::new(),
            },
        );
        if let Some(category) = Category::new(category) {
            state.categories.insert(category);
        }
        id
    }

    /// Make `caller` the admin without going through the claim.
    pub fn grant_admin(&self, caller: &str) {
        if let Ok(principal) = Principal::parse(caller) {
            let mut state = self.lock();
            state.roles.insert(principal, UserRole::Admin);
            state.admin_assigned = true;
        }
    }

    /// Directly read an inquiry's stored state.
    #[must_use]
    pub fn inquiry(&self, id: InquiryId) -> Option<Inquiry> {
        self.lock().inquiries.iter().find(|i| i.id == id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, method: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_default() += 1;

        let next = self
            .next_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(method);
        let gate = next.or_else(|| {
            self.gates
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(method)
                .cloned()
        });
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

/// A [`StoreClient`] with default cache settings, connected to `backend`.
#[must_use]
pub fn connected_client(backend: Arc<dyn StoreBackend>) -> StoreClient {
    let client = StoreClient::new(&CacheConfig::default());
    client.connect(backend);
    client
}

/// One caller's view of a [`FakeStore`].
pub struct FakeBackend {
    store: Arc<FakeStore>,
    caller: Option<Principal>,
}

impl FakeBackend {
    fn role(&self) -> UserRole {
        self.caller.as_ref().map_or(UserRole::Guest, |caller| {
            self.store
                .lock()
                .roles
                .get(caller)
                .copied()
                .unwrap_or(UserRole::User)
        })
    }

    fn require_admin(&self, action: &str) -> Result<(), ClientError> {
        if self.role().is_admin() {
            Ok(())
        } else {
            Err(ClientError::from_remote_message(format!(
                "Unauthorized: Only admins can {action}"
            )))
        }
    }

    fn require_caller(&self) -> Result<&Principal, ClientError> {
        self.caller.as_ref().ok_or_else(|| {
            ClientError::from_remote_message("Unauthorized: Anonymous callers cannot do this")
        })
    }
}

#[async_trait]
impl StoreBackend for FakeBackend {
    fn caller(&self) -> Option<&Principal> {
        self.caller.as_ref()
    }

    /// Answers with the catalog as it was when the call arrived.
    async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        let products: Vec<Product> = self.store.lock().products.values().cloned().collect();
        self.store.enter("listProducts").await;
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, ClientError> {
        self.store.enter("getProduct").await;
        self.store
            .lock()
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::from_remote_message("Product not found"))
    }

    async fn filter_products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ClientError> {
        self.store.enter("filterProductsByCategory").await;
        Ok(self
            .store
            .lock()
            .products
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }

    async fn search_products_by_name(&self, term: &str) -> Result<Vec<Product>, ClientError> {
        self.store.enter("searchProductsByName").await;
        let term = term.to_lowercase();
        Ok(self
            .store
            .lock()
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&term))
            .cloned()
            .collect())
    }

    async fn create_product(&self, input: &ProductInput) -> Result<(), ClientError> {
        self.store.enter("createProduct").await;
        self.require_admin("add products")?;
        let mut state = self.store.lock();
        state.next_product_id += 1;
        let id = ProductId::new(state.next_product_id);
        state.products.insert(
            id,
            Product {
                id,
                name: input.name.clone(),
                description: input.description.clone(),
                price: input.price,
                stock: input.stock,
                available: input.available,
                category: input.category.clone(),
                image_url: input.image_url.clone(),
            },
        );
        Ok(())
    }

    async fn update_product(&self, id: ProductId, input: &ProductInput) -> Result<(), ClientError> {
        self.store.enter("updateProduct").await;
        self.require_admin("update products")?;
        let mut state = self.store.lock();
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| ClientError::from_remote_message("Product not found"))?;
        product.name.clone_from(&input.name);
        product.description.clone_from(&input.description);
        product.price = input.price;
        product.stock = input.stock;
        product.available = input.available;
        product.category.clone_from(&input.category);
        product.image_url.clone_from(&input.image_url);
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), ClientError> {
        self.store.enter("deleteProduct").await;
        self.require_admin("delete products")?;
        self.store
            .lock()
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClientError::from_remote_message("Product not found"))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.store.enter("listCategories").await;
        Ok(self.store.lock().categories.iter().cloned().collect())
    }

    async fn add_category(&self, category: &Category) -> Result<(), ClientError> {
        self.store.enter("addCategory").await;
        self.require_admin("add categories")?;
        self.store.lock().categories.insert(category.clone());
        Ok(())
    }

    async fn remove_category(&self, category: &Category) -> Result<(), ClientError> {
        self.store.enter("removeCategory").await;
        self.require_admin("remove categories")?;
        self.store.lock().categories.remove(category);
        Ok(())
    }

    async fn submit_inquiry(&self, input: &InquiryInput) -> Result<(), ClientError> {
        self.store.enter("submitInquiry").await;
        let mut state = self.store.lock();
        state.next_inquiry_id += 1;
        let id = InquiryId::new(state.next_inquiry_id);
        state.inquiries.push(Inquiry {
            id,
            name: input.name.clone(),
            email: input.email.as_str().to_string(),
            phone: input.phone.clone(),
            message: input.message.clone(),
            product_id: input.product_id,
            resolved: false,
        });
        Ok(())
    }

    async fn get_all_inquiries(&self) -> Result<Vec<Inquiry>, ClientError> {
        self.store.enter("getAllInquiries").await;
        self.require_admin("view inquiries")?;
        Ok(self.store.lock().inquiries.clone())
    }

    async fn mark_inquiry_resolved(&self, id: InquiryId) -> Result<(), ClientError> {
        self.store.enter("markInquiryResolved").await;
        self.require_admin("resolve inquiries")?;
        let mut state = self.store.lock();
        let inquiry = state
            .inquiries
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ClientError::from_remote_message("Inquiry not found"))?;
        inquiry.resolved = true;
        Ok(())
    }

    async fn is_caller_admin(&self) -> Result<bool, ClientError> {
        self.store.enter("isCallerAdmin").await;
        Ok(self.role().is_admin())
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError> {
        self.store.enter("getCallerUserRole").await;
        Ok(self.role())
    }

    async fn assign_caller_user_role(&self, assignment: &RoleAssignment) -> Result<(), ClientError> {
        self.store.enter("assignCallerUserRole").await;
        let caller = self.require_caller()?.clone();

        if assignment.role.is_admin() {
            let mut state = self.store.lock();
            if state.admin_assigned {
                return Err(ClientError::from_remote_message(
                    "Admin role is already assigned",
                ));
            }
            let secret_matches = assignment
                .secret
                .as_ref()
                .is_some_and(|s| s.expose_secret() == ADMIN_SECRET);
            if !secret_matches || assignment.user != caller {
                return Err(ClientError::from_remote_message("Incorrect admin secret"));
            }
            state.admin_assigned = true;
            state.roles.insert(caller, UserRole::Admin);
            return Ok(());
        }

        self.require_admin("assign roles")?;
        self.store
            .lock()
            .roles
            .insert(assignment.user.clone(), assignment.role);
        Ok(())
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        self.store.enter("getCallerUserProfile").await;
        Ok(self
            .caller
            .as_ref()
            .and_then(|caller| self.store.lock().profiles.get(caller).cloned()))
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
        self.store.enter("getUserProfile").await;
        Ok(self.store.lock().profiles.get(user).cloned())
    }

    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        self.store.enter("saveCallerUserProfile").await;
        let caller = self.require_caller()?.clone();
        self.store.lock().profiles.insert(caller, profile.clone());
        Ok(())
    }

    async fn add_to_cart(&self, product: ProductId, quantity: u64) -> Result<(), ClientError> {
        self.store.enter("addToCart").await;
        let caller = self.require_caller()?.clone();
        let mut state = self.store.lock();
        if !state.products.contains_key(&product) {
            return Err(ClientError::from_remote_message("Product not found"));
        }
        let items = state.carts.entry(caller).or_default();
        match items.iter_mut().find(|item| item.product_id == product) {
            Some(item) => item.quantity += quantity,
            None => items.push(CartItem {
                product_id: product,
                quantity,
            }),
        }
        Ok(())
    }

    async fn remove_from_cart(&self, product: ProductId) -> Result<(), ClientError> {
        self.store.enter("removeFromCart").await;
        let caller = self.require_caller()?.clone();
        if let Some(items) = self.store.lock().carts.get_mut(&caller) {
            items.retain(|item| item.product_id != product);
        }
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), ClientError> {
        self.store.enter("clearCart").await;
        let caller = self.require_caller()?.clone();
        self.store.lock().carts.remove(&caller);
        Ok(())
    }

    async fn view_cart(&self) -> Result<Cart, ClientError> {
        self.store.enter("viewCart").await;
        let caller = self.require_caller()?;
        let state = self.store.lock();
        let items = state.carts.get(caller).cloned().unwrap_or_default();
        let products: Vec<Product> = state.products.values().cloned().collect();
        let cart = Cart {
            items,
            total_price: Price::ZERO,
        };
        let total_price = cart
            .total_for(&products)
            .map_err(|e| ClientError::from_remote_message(e.to_string()))?;
        Ok(Cart { total_price, ..cart })
    }
}
