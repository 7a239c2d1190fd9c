//! Admin access and catalog management commands.
//!
//! # Usage
//!
//! ```bash
//! # Claim the admin role (first time only)
//! ms-cli admin claim --token <secret>
//!
//! # Manage the catalog
//! ms-cli admin add-category Tools
//! ms-cli admin create-product -n "Rotary Tiller" -c Farm -p 4599900 -s 3
//! ```
//!
//! # Environment Variables
//!
//! - `STORE_IDENTITY` - Principal the claim is made for
//! - `STORE_ADMIN_TOKEN` - Default claim secret

use machinery_store_client::{AccessState, ClaimStatus, ValidationError};
use machinery_store_core::{Category, ProductId, ProductInput};
use secrecy::SecretString;

use super::{CliError, Session};

pub fn status(session: &Session) {
    match session.guard.state() {
        AccessState::Unauthenticated => println!("Not logged in (set STORE_IDENTITY)"),
        AccessState::AuthenticatedNonAdmin { principal, claim } => {
            println!("Logged in as {principal} (user)");
            if *claim == ClaimStatus::Locked {
                println!("Admin is already assigned to another account");
            }
        }
        AccessState::AuthenticatedAdmin { principal } => {
            println!("Logged in as {principal} (admin)");
        }
    }
}

/// Claim the admin role with `token` or the configured secret.
pub async fn claim(session: &mut Session, token: Option<String>) -> Result<(), CliError> {
    let token = token
        .map(SecretString::from)
        .or_else(|| session.config.admin_token.clone())
        .ok_or(CliError::MissingToken)?;

    let state = session.guard.claim(token).await?;
    if state.is_admin() {
        println!("Admin access granted. Welcome.");
    } else {
        println!("Claim accepted, but the service has not confirmed admin access yet");
    }
    Ok(())
}

pub async fn create_product(session: &Session, input: &ProductInput) -> Result<(), CliError> {
    session.guard.require_admin()?;
    session.client().create_product(input).await?;
    println!("Product '{}' created", input.name.trim());
    Ok(())
}

pub async fn delete_product(session: &Session, id: ProductId) -> Result<(), CliError> {
    session.guard.require_admin()?;
    session.client().delete_product(id).await?;
    println!("Product {id} deleted");
    Ok(())
}

pub async fn add_category(session: &Session, name: &str) -> Result<(), CliError> {
    session.guard.require_admin()?;
    let category = session.client().add_category(name).await?;
    println!("Category '{category}' added");
    Ok(())
}

pub async fn remove_category(session: &Session, name: &str) -> Result<(), CliError> {
    session.guard.require_admin()?;
    let category = Category::new(name).ok_or(machinery_store_client::ClientError::from(
        ValidationError::EmptyCategory,
    ))?;
    session.client().remove_category(&category).await?;
    println!("Category '{category}' removed");
    Ok(())
}
