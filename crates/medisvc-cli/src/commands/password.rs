use anyhow::Result;
use medisvc_auth::PasswordHasher;

use super::arg_or_stdin;
use crate::cli::{HashPasswordArgs, VerifyPasswordArgs};
use crate::config::AppConfig;
use crate::output::{print_error, print_success};

pub fn hash(cfg: &AppConfig, args: &HashPasswordArgs) -> Result<()> {
    let password = arg_or_stdin(args.password.as_deref(), "password")?;
    let min = cfg.auth.password.min_length;
    if password.chars().count() < min {
        anyhow::bail!("password must be at least {min} characters");
    }

    let hasher = PasswordHasher::new(&cfg.auth.password)?;
    println!("{}", hasher.hash(&password)?);
    Ok(())
}

/// Exits non-zero on mismatch so the command composes in scripts.
pub fn verify(cfg: &AppConfig, args: &VerifyPasswordArgs) -> Result<()> {
    let password = arg_or_stdin(args.password.as_deref(), "password")?;
    let hasher = PasswordHasher::new(&cfg.auth.password)?;

    if hasher.verify(&password, &args.digest)? {
        print_success("Password matches");
        if hasher.needs_rehash(&args.digest) {
            println!("  digest uses outdated parameters; rehash on next login");
        }
        Ok(())
    } else {
        print_error("Password does not match");
        std::process::exit(1);
    }
}
