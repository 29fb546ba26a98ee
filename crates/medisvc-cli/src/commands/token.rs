use std::sync::Arc;

use anyhow::{Context, Result};
use medisvc_auth::{JwtError, JwtService, SystemClock, TokenClass};
use time::format_description::well_known::Rfc3339;

use crate::cli::{InspectTokenArgs, IssueTokenArgs};
use crate::config::AppConfig;
use crate::output::{print_field, print_json, print_success};

fn jwt_service(cfg: &AppConfig) -> Result<JwtService> {
    JwtService::from_config(&cfg.auth, Arc::new(SystemClock)).context("failed to load signing keys")
}

pub fn issue(cfg: &AppConfig, args: &IssueTokenArgs) -> Result<()> {
    let class: TokenClass = args.class.parse()?;
    let jwt = jwt_service(cfg)?;
    let issued = jwt.issue(args.user_id, class)?;

    print_success(&format!("Issued {class} token for user {}", args.user_id));
    print_field("Key", jwt.current_kid());
    print_field("Expires", issued.expires_at.format(&Rfc3339)?);
    print_field("Jti", &issued.jti);
    println!("{}", issued.token);
    Ok(())
}

pub fn inspect(cfg: &AppConfig, args: &InspectTokenArgs) -> Result<()> {
    let class: TokenClass = args.class.parse()?;
    let jwt = jwt_service(cfg)?;

    let claims = if args.allow_expired {
        jwt.decode_allow_expired(&args.token, class)?
    } else {
        match jwt.decode(&args.token, class) {
            Err(JwtError::Expired) => {
                anyhow::bail!("token expired (pass --allow-expired to show its claims)")
            }
            other => other?,
        }
    };

    print_json(&claims)?;
    if jwt.is_expired(&claims) {
        println!("  expired");
    }
    Ok(())
}
