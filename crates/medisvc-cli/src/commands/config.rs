use anyhow::Result;
use medisvc_auth::password::generate_signing_secret;

use crate::config::AppConfig;
use crate::output::print_success;

pub fn check(cfg: &AppConfig) -> Result<()> {
    print_success("Configuration is valid");
    println!();
    print!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

pub fn generate_secret() {
    println!("{}", generate_signing_secret());
}
