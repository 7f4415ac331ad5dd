//! Session lifecycle commands.

use std::io::{BufRead, Write};

use secrecy::SecretString;

use velvet_client::ClientContext;
use velvet_client::api::NewUser;

/// Sign in, reading the password from `VELVET_PASSWORD` or stdin.
pub async fn login(ctx: &ClientContext, username: &str) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password()?;
    let credential = ctx.session().sign_in(username, &password).await?;

    println!("Signed in as {}", credential.user.username);

    // Warm the local cart with the server's view; a failure here is not
    // fatal to the login itself.
    if let Err(e) = ctx.cart().fetch().await {
        tracing::warn!("Could not fetch cart after sign-in: {}", e.user_message());
    }

    Ok(())
}

/// Sign out, clearing the credential and the user-scoped cart.
pub fn logout(ctx: &ClientContext) {
    ctx.sign_out();
    println!("Signed out");
}

/// Create a new account.
pub async fn signup(
    ctx: &ClientContext,
    username: String,
    email: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password()?;

    let user = ctx
        .session()
        .sign_up(&NewUser {
            username,
            email,
            password: secrecy::ExposeSecret::expose_secret(&password).to_owned(),
        })
        .await?;

    println!("Account created for {}", user.username);
    Ok(())
}

fn read_password() -> Result<SecretString, std::io::Error> {
    if let Ok(password) = std::env::var("VELVET_PASSWORD") {
        return Ok(SecretString::from(password));
    }

    print!("Password: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end().to_owned()))
}
