//! Catalog browsing commands.

use machinery_store_client::catalog::{CatalogSummary, CategoryFilter, filter_products};
use machinery_store_core::{Product, ProductId};

use super::{CliError, Session};

fn print_product(product: &Product) {
    let availability = if product.in_stock() {
        format!("{} in stock", product.stock)
    } else {
        "out of stock".to_string()
    };
    println!(
        "{:>5}  {:<32} {:<16} {:>14}  {availability}",
        product.id,
        product.name,
        product.category,
        product.price.display(),
    );
}

/// List products, filtered by category and name.
///
/// The category narrows the remote query; the name search is applied to the
/// fetched list so both filters compose.
pub async fn list_products(session: &Session, category: &str, search: &str) -> Result<(), CliError> {
    let filter = CategoryFilter::parse(category);
    let products = session.client().products_in_category(&filter).await?;
    let shown = filter_products(&products, &filter, search);

    for product in &shown {
        print_product(product);
    }

    let summary = CatalogSummary::of(shown.iter().copied());
    println!(
        "{} products ({} available, {} in stock)",
        summary.total, summary.available, summary.in_stock
    );
    Ok(())
}

pub async fn show_product(session: &Session, id: ProductId) -> Result<(), CliError> {
    let product = session
        .client()
        .product(id)
        .await?
        .ok_or(CliError::ProductNotFound(id))?;

    print_product(&product);
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    if !product.image_url.is_empty() {
        println!("Image: {}", product.image_url);
    }
    Ok(())
}

pub async fn list_categories(session: &Session) -> Result<(), CliError> {
    for category in session.client().list_categories().await? {
        println!("{category}");
    }
    Ok(())
}
