//! Cart commands.
//!
//! Mutations apply locally (and persist) even while signed out; syncing
//! requires a session. The CLI is a short-lived process, so mutating
//! commands push explicitly instead of waiting out the debounce timer.

use rust_decimal::Decimal;

use velvet_client::ClientContext;
use velvet_core::{CartLine, Price, ProductId, SyncState};

/// Print the local cart.
pub fn show(ctx: &ClientContext) {
    let cart = ctx.cart().snapshot();

    if cart.lines.is_empty() {
        println!("Cart is empty");
    } else {
        for line in &cart.lines {
            let size = line
                .size
                .as_deref()
                .map(|s| format!(" [{s}]"))
                .unwrap_or_default();
            println!(
                "{:>3} x {}{} @ {} = {}",
                line.quantity,
                line.name,
                size,
                line.unit_price.display(),
                Price::new(line.line_total()).display(),
            );
        }
        println!("Total: {}", Price::new(cart.total).display());
    }

    match cart.sync_state {
        SyncState::Failed => {
            if let Some(error) = &cart.pending_error {
                println!("Last sync failed: {error}");
            }
        }
        _ if cart.is_dirty() => println!("(not yet synced)"),
        _ => {}
    }
}

/// Add a line and sync immediately.
pub async fn add(
    ctx: &ClientContext,
    product_id: String,
    name: String,
    price: Decimal,
    quantity: u32,
    size: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    ctx.cart().add_line(CartLine {
        product_id: ProductId::new(product_id),
        name,
        unit_price: Price::new(price),
        quantity,
        size,
        image_url: None,
    });

    sync_if_signed_in(ctx).await;
    show(ctx);
    Ok(())
}

/// Set a line's quantity; zero removes it.
pub async fn set(
    ctx: &ClientContext,
    product_id: &str,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let product_id = ProductId::new(product_id);

    if ctx.session().is_authenticated() {
        ctx.cart().set_quantity_remote(&product_id, quantity).await?;
    } else {
        ctx.cart().set_quantity(&product_id, quantity);
    }

    show(ctx);
    Ok(())
}

/// Remove a line.
pub async fn remove(
    ctx: &ClientContext,
    product_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let product_id = ProductId::new(product_id);

    if ctx.session().is_authenticated() {
        ctx.cart().remove_line_remote(&product_id).await?;
    } else {
        ctx.cart().remove_line(&product_id);
    }

    show(ctx);
    Ok(())
}

/// Push the full local cart to the server.
pub async fn push(ctx: &ClientContext) -> Result<(), Box<dyn std::error::Error>> {
    ctx.cart().push().await?;
    println!("Cart synced");
    Ok(())
}

/// Replace the local cart with the server's view.
pub async fn pull(ctx: &ClientContext) -> Result<(), Box<dyn std::error::Error>> {
    ctx.cart().fetch().await?;
    show(ctx);
    Ok(())
}

async fn sync_if_signed_in(ctx: &ClientContext) {
    if !ctx.session().is_authenticated() {
        return;
    }
    if let Err(e) = ctx.cart().push().await {
        tracing::warn!("Cart saved locally; sync failed: {}", e.user_message());
    }
}
