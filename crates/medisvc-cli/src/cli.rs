use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "medisvc")]
#[command(about = "medisvc auth: hash credentials, mint and inspect tokens, check configuration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to medisvc.toml when present)
    #[arg(short, long, global = true, env = "MEDISVC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hash a password with the configured Argon2id parameters
    HashPassword(HashPasswordArgs),
    /// Check a password against a stored digest
    VerifyPassword(VerifyPasswordArgs),
    /// Issue a signed token for a user id
    IssueToken(IssueTokenArgs),
    /// Decode and verify a token, printing its claims
    InspectToken(InspectTokenArgs),
    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
    /// Generate a random HMAC signing secret
    GenerateSecret,
    /// Run a register/login/refresh/logout session against in-memory storage
    Demo(DemoArgs),
}

#[derive(clap::Args)]
pub struct HashPasswordArgs {
    /// Password to hash (read from stdin when omitted)
    pub password: Option<String>,
}

#[derive(clap::Args)]
pub struct VerifyPasswordArgs {
    /// Stored PHC digest
    #[arg(long)]
    pub digest: String,
    /// Password to check (read from stdin when omitted)
    pub password: Option<String>,
}

#[derive(clap::Args)]
pub struct IssueTokenArgs {
    /// Subject user id
    pub user_id: i64,
    /// Token class
    #[arg(long, default_value = "access")]
    pub class: String,
}

#[derive(clap::Args)]
pub struct InspectTokenArgs {
    /// Token to inspect
    pub token: String,
    /// Expected token class
    #[arg(long, default_value = "access")]
    pub class: String,
    /// Print claims even when the token has expired
    #[arg(long)]
    pub allow_expired: bool,
}

#[derive(clap::Args)]
pub struct DemoArgs {
    /// Username to register
    #[arg(long, default_value = "demo")]
    pub username: String,
    /// Email to register
    #[arg(long, default_value = "demo@example.com")]
    pub email: String,
    /// Password to register
    #[arg(long, default_value = "correct-horse-battery")]
    pub password: String,
}
