pub mod config;
pub mod demo;
pub mod password;
pub mod token;

use std::io::BufRead;

use anyhow::{Context, Result};

/// Returns `arg` if given, otherwise the first line of stdin without its line ending.
pub(crate) fn arg_or_stdin(arg: Option<&str>, what: &str) -> Result<String> {
    if let Some(value) = arg {
        return Ok(value.to_string());
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .with_context(|| format!("failed to read {what} from stdin"))?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        anyhow::bail!("no {what} given");
    }
    Ok(value)
}
