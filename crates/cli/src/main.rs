//! Velvet CLI - session and cart management against a Velvet backend.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password read from VELVET_PASSWORD or prompted on stdin)
//! velvet login -u ada
//!
//! # Show the local cart
//! velvet cart show
//!
//! # Add a line and sync it to the server
//! velvet cart add -p sku-42 -n "Velvet Tee" --price 19.99 -q 2
//! velvet cart push
//!
//! # Replace the local cart with the server's view
//! velvet cart pull
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `signup` - session lifecycle
//! - `cart` - show, mutate, and sync the cart
//!
//! Configuration comes from the environment (see `velvet-client`);
//! a `.env` file is loaded if present.

#![cfg_attr(not(test), forbid(unsafe_code))]
// CLI output goes to stdout.
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "velvet")]
#[command(author, version, about = "Velvet storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        /// Username
        #[arg(short, long)]
        username: String,
    },
    /// Sign out and clear local user state
    Logout,
    /// Create a new account
    Signup {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,
    },
    /// Show and manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the local cart
    Show,
    /// Add a line to the cart
    Add {
        /// Product ID
        #[arg(short, long)]
        product_id: String,

        /// Product name
        #[arg(short, long)]
        name: String,

        /// Unit price (e.g., 19.99)
        #[arg(long)]
        price: rust_decimal::Decimal,

        /// Quantity
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Size variant
        #[arg(short, long)]
        size: Option<String>,
    },
    /// Set a line's quantity (0 removes the line)
    Set {
        /// Product ID
        #[arg(short, long)]
        product_id: String,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove a line from the cart
    Rm {
        /// Product ID
        #[arg(short, long)]
        product_id: String,
    },
    /// Push the local cart to the server
    Push,
    /// Replace the local cart with the server's view
    Pull,
}

#[tokio::main]
async fn main() {
    // A missing .env is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "velvet_cli=info,velvet_client=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = velvet_client::Config::from_env()?;
    let ctx = velvet_client::ClientContext::new(config)?;

    match cli.command {
        Commands::Login { username } => commands::auth::login(&ctx, &username).await?,
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Signup { username, email } => {
            commands::auth::signup(&ctx, username, email).await?;
        }
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx),
            CartAction::Add {
                product_id,
                name,
                price,
                quantity,
                size,
            } => commands::cart::add(&ctx, product_id, name, price, quantity, size).await?,
            CartAction::Set {
                product_id,
                quantity,
            } => commands::cart::set(&ctx, &product_id, quantity).await?,
            CartAction::Rm { product_id } => commands::cart::remove(&ctx, &product_id).await?,
            CartAction::Push => commands::cart::push(&ctx).await?,
            CartAction::Pull => commands::cart::pull(&ctx).await?,
        },
    }

    Ok(())
}
