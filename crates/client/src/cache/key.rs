//! Cache keys and cached value types.

use core::fmt;

use machinery_store_core::{Cart, Category, Inquiry, Product, ProductId, UserProfile, UserRole};

/// Identifies one cached query result.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Full catalog. Invalidating it invalidates every product-derived key.
    Products,
    ProductsByCategory(String),
    ProductsSearch(String),
    Product(ProductId),
    Categories,
    Inquiries,
    IsAdmin,
    CallerRole,
    CallerProfile,
    Cart,
}

impl CacheKey {
    /// Whether invalidating `self` must also invalidate `other`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Products,
                Self::Products
                | Self::ProductsByCategory(_)
                | Self::ProductsSearch(_)
                | Self::Product(_),
            )
            | (Self::Categories, Self::Categories)
            | (Self::Inquiries, Self::Inquiries)
            | (Self::IsAdmin, Self::IsAdmin)
            | (Self::CallerRole, Self::CallerRole)
            | (Self::CallerProfile, Self::CallerProfile)
            | (Self::Cart, Self::Cart) => true,
            (Self::ProductsByCategory(a), Self::ProductsByCategory(b))
            | (Self::ProductsSearch(a), Self::ProductsSearch(b)) => a == b,
            (Self::Product(a), Self::Product(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Products => write!(f, "products"),
            Self::ProductsByCategory(name) => write!(f, "products:category:{name}"),
            Self::ProductsSearch(term) => write!(f, "products:search:{term}"),
            Self::Product(id) => write!(f, "products:id:{id}"),
            Self::Categories => write!(f, "categories"),
            Self::Inquiries => write!(f, "inquiries"),
            Self::IsAdmin => write!(f, "isAdmin"),
            Self::CallerRole => write!(f, "callerRole"),
            Self::CallerProfile => write!(f, "callerProfile"),
            Self::Cart => write!(f, "cart"),
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Categories(Vec<Category>),
    Inquiries(Vec<Inquiry>),
    Flag(bool),
    Role(UserRole),
    Profile(Option<UserProfile>),
    Cart(Cart),
}

impl CacheValue {
    #[must_use]
    pub fn into_products(self) -> Option<Vec<Product>> {
        match self {
            Self::Products(products) => Some(products),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_product(self) -> Option<Product> {
        match self {
            Self::Product(product) => Some(*product),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_categories(self) -> Option<Vec<Category>> {
        match self {
            Self::Categories(categories) => Some(categories),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_inquiries(self) -> Option<Vec<Inquiry>> {
        match self {
            Self::Inquiries(inquiries) => Some(inquiries),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_role(&self) -> Option<UserRole> {
        match self {
            Self::Role(role) => Some(*role),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_profile(self) -> Option<Option<UserProfile>> {
        match self {
            Self::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_cart(self) -> Option<Cart> {
        match self {
            Self::Cart(cart) => Some(cart),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_covers_derived_keys() {
        let root = CacheKey::Products;
        assert!(root.covers(&CacheKey::ProductsByCategory("Tools".into())));
        assert!(root.covers(&CacheKey::ProductsSearch("till".into())));
        assert!(root.covers(&CacheKey::Product(ProductId::new(3))));
        assert!(!root.covers(&CacheKey::Categories));
        assert!(!root.covers(&CacheKey::Inquiries));
    }

    #[test]
    fn test_derived_keys_cover_only_themselves() {
        let tools = CacheKey::ProductsByCategory("Tools".into());
        assert!(tools.covers(&CacheKey::ProductsByCategory("Tools".into())));
        assert!(!tools.covers(&CacheKey::ProductsByCategory("Farm".into())));
        assert!(!tools.covers(&CacheKey::Products));
    }

    #[test]
    fn test_inquiries_covers_only_inquiries() {
        assert!(CacheKey::Inquiries.covers(&CacheKey::Inquiries));
        assert!(!CacheKey::Inquiries.covers(&CacheKey::Products));
    }

    #[test]
    fn test_display_matches_key_scheme() {
        assert_eq!(
            CacheKey::ProductsByCategory("Farm".into()).to_string(),
            "products:category:Farm"
        );
        assert_eq!(CacheKey::IsAdmin.to_string(), "isAdmin");
    }
}
