//! JSON-over-HTTP implementation of [`StoreBackend`].
//!
//! Every operation is a `POST <base>/rpc/<method>` whose body is a JSON
//! object of named arguments. Successful calls answer with the JSON result
//! (or an empty body for unit results); rejections answer with a non-2xx
//! status and `{"error": "<message>"}`.

use std::sync::Arc;

use async_trait::async_trait;
use machinery_store_core::{
    Cart, Category, Inquiry, InquiryId, InquiryInput, Principal, Product, ProductId, ProductInput,
    UserProfile, UserRole,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::{RoleAssignment, StoreBackend};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Header carrying the caller's principal.
pub const CALLER_HEADER: &str = "X-Caller-Principal";
/// Header carrying a per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Characters of an error body kept in logs and error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for the remote store service.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base: String,
    caller: Option<Principal>,
}

impl HttpBackend {
    /// Create a backend calling `base_url`, optionally as `caller`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &Url,
        caller: Option<Principal>,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base: base_url.as_str().trim_end_matches('/').to_string(),
                caller,
            }),
        })
    }

    /// Execute a remote operation.
    #[instrument(skip(self, args))]
    async fn call<A, R>(&self, method: &str, args: &A) -> Result<R, ClientError>
    where
        A: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let endpoint = format!("{}/rpc/{method}", self.inner.base);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut request = self
            .inner
            .client
            .post(&endpoint)
            .header(REQUEST_ID_HEADER, &request_id)
            .json(args);
        if let Some(caller) = &self.inner.caller {
            request = request.header(CALLER_HEADER, caller.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned));

            return Err(message.map_or_else(
                || {
                    tracing::error!(
                        status = %status,
                        request_id = %request_id,
                        body = %preview(&body),
                        "Store service returned non-success status"
                    );
                    ClientError::Remote(format!("HTTP {status}: {}", preview(&body)))
                },
                |message| {
                    debug!(request_id = %request_id, error = %message, "Store service rejected call");
                    ClientError::from_remote_message(message)
                },
            ));
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                body = %preview(body),
                "Failed to decode store service response"
            );
            ClientError::from(e)
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[async_trait]
impl StoreBackend for HttpBackend {
    fn caller(&self) -> Option<&Principal> {
        self.inner.caller.as_ref()
    }

    async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        self.call("listProducts", &json!({})).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, ClientError> {
        self.call("getProduct", &json!({ "productId": id })).await
    }

    async fn filter_products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ClientError> {
        self.call("filterProductsByCategory", &json!({ "category": category }))
            .await
    }

    async fn search_products_by_name(&self, term: &str) -> Result<Vec<Product>, ClientError> {
        self.call("searchProductsByName", &json!({ "searchTerm": term }))
            .await
    }

    async fn create_product(&self, input: &ProductInput) -> Result<(), ClientError> {
        self.call("createProduct", &json!({ "productInput": input }))
            .await
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<(), ClientError> {
        self.call(
            "updateProduct",
            &json!({ "productId": id, "productInput": input }),
        )
        .await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), ClientError> {
        self.call("deleteProduct", &json!({ "productId": id })).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.call("listCategories", &json!({})).await
    }

    async fn add_category(&self, category: &Category) -> Result<(), ClientError> {
        self.call("addCategory", &json!({ "category": category })).await
    }

    async fn remove_category(&self, category: &Category) -> Result<(), ClientError> {
        self.call("removeCategory", &json!({ "category": category }))
            .await
    }

    async fn submit_inquiry(&self, input: &InquiryInput) -> Result<(), ClientError> {
        self.call("submitInquiry", &json!({ "inquiryInput": input }))
            .await
    }

    async fn get_all_inquiries(&self) -> Result<Vec<Inquiry>, ClientError> {
        self.call("getAllInquiries", &json!({})).await
    }

    async fn mark_inquiry_resolved(&self, id: InquiryId) -> Result<(), ClientError> {
        self.call("markInquiryResolved", &json!({ "inquiryId": id }))
            .await
    }

    async fn is_caller_admin(&self) -> Result<bool, ClientError> {
        self.call("isCallerAdmin", &json!({})).await
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError> {
        self.call("getCallerUserRole", &json!({})).await
    }

    async fn assign_caller_user_role(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), ClientError> {
        let secret = assignment.secret.as_ref().map(|s| s.expose_secret());
        self.call(
            "assignCallerUserRole",
            &json!({
                "user": assignment.user,
                "role": assignment.role,
                "secret": secret,
            }),
        )
        .await
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        self.call("getCallerUserProfile", &json!({})).await
    }

    async fn get_user_profile(
        &self,
        user: &Principal,
    ) -> Result<Option<UserProfile>, ClientError> {
        self.call("getUserProfile", &json!({ "user": user })).await
    }

    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        self.call("saveCallerUserProfile", &json!({ "profile": profile }))
            .await
    }

    async fn add_to_cart(&self, product: ProductId, quantity: u64) -> Result<(), ClientError> {
        self.call(
            "addToCart",
            &json!({ "productId": product, "quantity": quantity }),
        )
        .await
    }

    async fn remove_from_cart(&self, product: ProductId) -> Result<(), ClientError> {
        self.call("removeFromCart", &json!({ "productId": product }))
            .await
    }

    async fn clear_cart(&self) -> Result<(), ClientError> {
        self.call("clearCart", &json!({})).await
    }

    async fn view_cart(&self) -> Result<Cart, ClientError> {
        self.call("viewCart", &json!({})).await
    }
}
