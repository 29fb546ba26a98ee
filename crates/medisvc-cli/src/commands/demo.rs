use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use medisvc_auth::password::generate_signing_secret;
use medisvc_auth::prelude::*;
use medisvc_auth::spawn_cleanup_task;

use crate::cli::DemoArgs;
use crate::config::AppConfig;
use crate::output::{print_field, print_success};

/// Walks one session through the in-memory backends and prints each step.
pub async fn run(cfg: &AppConfig, args: &DemoArgs) -> Result<()> {
    let mut auth = cfg.auth.clone();
    if auth.signing.is_hmac() && auth.signing.secret.is_none() {
        tracing::warn!("No signing secret configured; using an ephemeral one for this run");
        auth.signing.secret = Some(generate_signing_secret());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let revoked = Arc::new(InMemoryRevokedTokenStorage::new(
        auth.revocation.max_entries,
        clock.clone(),
    ));
    let service = AuthService::from_config(
        &auth,
        Arc::new(InMemoryUserDirectory::new()),
        revoked.clone(),
        clock,
    )
    .context("invalid auth configuration")?;
    let cleanup = spawn_cleanup_task(revoked.clone(), auth.revocation.cleanup_interval);

    let outcome = session(&service, args).await;
    cleanup.abort();
    outcome?;

    print_field("Revocations", revoked.len().await?);
    Ok(())
}

async fn session(service: &AuthService, args: &DemoArgs) -> Result<()> {
    let user = service
        .register(RegisterUser {
            username: args.username.clone(),
            email: args.email.clone(),
            password: args.password.clone(),
            nick_name: None,
            phone: None,
        })
        .await
        .context("register")?;
    print_success(&format!("Registered {} (id {})", user.username, user.id));

    let login = service
        .login(&user.email, &args.password)
        .await
        .context("login")?;
    print_success("Logged in");

    let claims = service
        .validate_access_token(&login.security.access_token)
        .await
        .context("validate")?;
    print_success(&format!("Access token valid for user {}", claims.subject_id));

    let refreshed = service
        .access_token_by_refresh_token(&login.security.refresh_token)
        .await
        .context("refresh")?;
    print_success("Refreshed tokens");

    match service
        .access_token_by_refresh_token(&login.security.refresh_token)
        .await
    {
        Err(AuthError::NotAuthorized) => print_success("Replayed refresh token rejected"),
        Ok(_) => println!("  {} replayed refresh token accepted", "note:".yellow()),
        Err(e) => return Err(e).context("refresh replay"),
    }

    let access = &refreshed.security.access_token;
    let outcome = service.logout(access).await.context("logout")?;
    print_success(&format!("Logged out ({})", serde_json::to_string(&outcome)?));

    match service.validate_access_token(access).await {
        Err(AuthError::NotAuthorized) => print_success("Revoked access token rejected"),
        Ok(_) => anyhow::bail!("revoked access token still validates"),
        Err(e) => return Err(e).context("validate after logout"),
    }
    Ok(())
}
