//! Machinery Store CLI - Catalog browsing, inquiries and administration.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! ms-cli products
//! ms-cli products --category Tools --search drill
//! ms-cli categories
//!
//! # Send a purchase inquiry
//! ms-cli inquiry submit -n "Asha" -e asha@example.com -m "Price for the tiller?"
//!
//! # Claim admin access with STORE_ADMIN_TOKEN, then manage inquiries
//! ms-cli admin claim
//! ms-cli inquiry list
//! ms-cli inquiry resolve 7
//! ```
//!
//! # Commands
//!
//! - `products` / `product` / `categories` - Read the catalog
//! - `inquiry` - Submit, list and resolve inquiries
//! - `admin` - Role status, admin claim and catalog management
//!
//! Configuration comes from the environment (see `machinery_store_client::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use machinery_store_client::ClientConfig;
use machinery_store_core::{InquiryId, Price, ProductId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CliError, Session};

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(author, version, about = "Machinery Store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Only products in this category ("All" for every category)
        #[arg(short, long, default_value = "All")]
        category: String,

        /// Case-insensitive product name search
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Show one product
    Product {
        id: ProductId,
    },
    /// List categories
    Categories,
    /// Purchase inquiries
    Inquiry {
        #[command(subcommand)]
        action: InquiryAction,
    },
    /// Admin access and catalog management
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum InquiryAction {
    /// Submit a purchase inquiry
    Submit {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        message: String,

        #[arg(short, long, default_value = "")]
        phone: String,

        /// Product the inquiry is about
        #[arg(long)]
        product: Option<ProductId>,
    },
    /// List inquiries, pending first (admin)
    List,
    /// Mark an inquiry resolved (admin)
    Resolve {
        id: InquiryId,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Show the caller's access level
    Status,
    /// Claim the admin role with the one-time secret
    Claim {
        /// Admin secret (defaults to `STORE_ADMIN_TOKEN`)
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Create a product
    CreateProduct {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        category: String,

        /// Price in paise
        #[arg(short, long)]
        price: u64,

        #[arg(short, long, default_value_t = 0)]
        stock: u64,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        image_url: String,
    },
    /// Delete a product
    DeleteProduct {
        id: ProductId,
    },
    /// Add a category
    AddCategory {
        name: String,
    },
    /// Remove a category
    RemoveCategory {
        name: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = ClientConfig::from_env().expect("Failed to load configuration");

    // Must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "machinery_store_client=info,machinery_store_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let mut session = Session::open(config).await?;

    match cli.command {
        Commands::Products { category, search } => {
            commands::catalog::list_products(&session, &category, &search).await?;
        }
        Commands::Product { id } => commands::catalog::show_product(&session, id).await?,
        Commands::Categories => commands::catalog::list_categories(&session).await?,
        Commands::Inquiry { action } => match action {
            InquiryAction::Submit {
                name,
                email,
                message,
                phone,
                product,
            } => {
                let draft = machinery_store_client::inquiry::InquiryDraft {
                    name,
                    email,
                    phone,
                    message,
                    product_id: product,
                };
                commands::inquiry::submit(&session, &draft).await?;
            }
            InquiryAction::List => commands::inquiry::list(&session).await?,
            InquiryAction::Resolve { id } => commands::inquiry::resolve(&session, id).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Status => commands::admin::status(&session),
            AdminAction::Claim { token } => commands::admin::claim(&mut session, token).await?,
            AdminAction::CreateProduct {
                name,
                category,
                price,
                stock,
                description,
                image_url,
            } => {
                let input = machinery_store_core::ProductInput {
                    name,
                    description,
                    price: Price::from_minor(price),
                    stock,
                    available: true,
                    category,
                    image_url,
                };
                commands::admin::create_product(&session, &input).await?;
            }
            AdminAction::DeleteProduct { id } => {
                commands::admin::delete_product(&session, id).await?;
            }
            AdminAction::AddCategory { name } => {
                commands::admin::add_category(&session, &name).await?;
            }
            AdminAction::RemoveCategory { name } => {
                commands::admin::remove_category(&session, &name).await?;
            }
        },
    }

    session.close();
    Ok(())
}
