//! Catalog view model.
//!
//! Pure derivations over an already fetched product list: category and name
//! filtering, the category picker options and summary counts. Nothing here
//! touches the network, so it is safe to recompute on every render.

use core::fmt;

use machinery_store_core::{Category, Product, ProductInput};

use crate::error::ValidationError;

/// Label of the "no category filter" option.
pub const ALL_CATEGORIES: &str = "All";

/// Category selection for the catalog view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    /// Parse a picker value. Empty input and the `"All"` sentinel mean no
    /// filtering; anything else is matched exactly, whitespace included.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Named(value.to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => product.category == *name,
        }
    }
}

impl From<&Category> for CategoryFilter {
    fn from(category: &Category) -> Self {
        Self::Named(category.as_str().to_string())
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_CATEGORIES),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Whether `product`'s name contains `term`, ignoring case. A blank term
/// matches everything; otherwise surrounding whitespace is part of the term.
#[must_use]
pub fn name_matches(product: &Product, term: &str) -> bool {
    term.trim().is_empty() || product.name.to_lowercase().contains(&term.to_lowercase())
}

/// Products matching both the category filter and the name search, in their
/// original order.
#[must_use]
pub fn filter_products<'a>(
    products: &'a [Product],
    category: &CategoryFilter,
    term: &str,
) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| category.matches(p) && name_matches(p, term))
        .collect()
}

/// Options for the category picker: `"All"` followed by each category.
#[must_use]
pub fn category_options(categories: &[Category]) -> Vec<CategoryFilter> {
    std::iter::once(CategoryFilter::All)
        .chain(categories.iter().map(CategoryFilter::from))
        .collect()
}

/// Headline counts for a product list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub total: usize,
    pub available: usize,
    pub in_stock: usize,
}

impl CatalogSummary {
    #[must_use]
    pub fn of<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        products.into_iter().fold(Self::default(), |mut summary, p| {
            summary.total += 1;
            if p.available {
                summary.available += 1;
            }
            if p.in_stock() {
                summary.in_stock += 1;
            }
            summary
        })
    }
}

/// Trim a product input and reject blank names or categories.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyProductName`] or
/// [`ValidationError::EmptyCategory`].
pub fn validate_product(input: &ProductInput) -> Result<ProductInput, ValidationError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyProductName);
    }
    let category = Category::new(&input.category).ok_or(ValidationError::EmptyCategory)?;

    Ok(ProductInput {
        name: name.to_string(),
        description: input.description.trim().to_string(),
        category: category.as_str().to_string(),
        image_url: input.image_url.trim().to_string(),
        ..input.clone()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use machinery_store_core::{Price, ProductId};

    use super::*;

    fn product(id: u64, name: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: format!("{name} description"),
            price: Price::from_minor(1000),
            stock: 3,
            available: true,
            category: category.to_string(),
            image_url: String::new(),
        }
    }

    fn names(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_category_filter_without_search() {
        let products = vec![product(1, "Drill", "Tools"), product(2, "Tiller", "Farm")];
        let filtered = filter_products(&products, &CategoryFilter::parse("Tools"), "");
        assert_eq!(names(&filtered), vec!["Drill"]);
    }

    #[test]
    fn test_search_is_case_insensitive_on_name() {
        let products = vec![product(1, "Drill", "Tools"), product(2, "Tiller", "Farm")];
        let filtered = filter_products(&products, &CategoryFilter::parse("All"), "till");
        assert_eq!(names(&filtered), vec!["Tiller"]);
    }

    #[test]
    fn test_search_ignores_description() {
        let mut drill = product(1, "Drill", "Tools");
        drill.description = "pairs well with a tiller".to_string();
        let products = vec![drill];
        assert!(filter_products(&products, &CategoryFilter::All, "tiller").is_empty());
    }

    #[test]
    fn test_filters_compose_with_and() {
        let products = vec![
            product(1, "Drill", "Tools"),
            product(2, "Tiller", "Farm"),
            product(3, "Hand Tiller", "Tools"),
        ];
        let filtered = filter_products(&products, &CategoryFilter::parse("Tools"), "TILL");
        assert_eq!(names(&filtered), vec!["Hand Tiller"]);
    }

    #[test]
    fn test_category_match_is_exact() {
        let products = vec![product(1, "Drill", "Tools")];
        assert!(filter_products(&products, &CategoryFilter::parse("tools"), "").is_empty());
        assert!(filter_products(&products, &CategoryFilter::parse(" Tools "), "").is_empty());
        assert_eq!(CategoryFilter::parse(""), CategoryFilter::All);
    }

    #[test]
    fn test_search_term_is_not_trimmed() {
        let products = vec![product(1, "Tiller", "Farm"), product(2, "Power Tiller", "Farm")];
        assert_eq!(
            names(&filter_products(&products, &CategoryFilter::All, "till ")),
            Vec::<String>::new()
        );
        assert_eq!(
            names(&filter_products(&products, &CategoryFilter::All, " till")),
            vec!["Power Tiller"]
        );
        assert_eq!(
            filter_products(&products, &CategoryFilter::All, "   ").len(),
            2
        );
    }

    #[test]
    fn test_category_options_start_with_all() {
        let categories = vec![Category::new("Farm").unwrap(), Category::new("Tools").unwrap()];
        let options: Vec<String> = category_options(&categories)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(options, vec!["All", "Farm", "Tools"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut sold_out = product(2, "Tiller", "Farm");
        sold_out.stock = 0;
        let mut hidden = product(3, "Mower", "Farm");
        hidden.available = false;
        let products = vec![product(1, "Drill", "Tools"), sold_out, hidden];

        let summary = CatalogSummary::of(&products);
        assert_eq!(
            summary,
            CatalogSummary {
                total: 3,
                available: 2,
                in_stock: 1
            }
        );
    }

    #[test]
    fn test_validate_product_trims_and_rejects_blanks() {
        let mut input = ProductInput::from(&product(1, "  Drill ", " Tools "));
        let valid = validate_product(&input).unwrap();
        assert_eq!(valid.name, "Drill");
        assert_eq!(valid.category, "Tools");
        assert_eq!(valid.price, Price::from_minor(1000));

        input.category = "   ".to_string();
        assert_eq!(validate_product(&input), Err(ValidationError::EmptyCategory));

        input.name = String::new();
        assert_eq!(
            validate_product(&input),
            Err(ValidationError::EmptyProductName)
        );
    }
}
