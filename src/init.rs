use anyhow::Result;
use std::io::{self, Write};

const EXAMPLE: &str = include_str!("../assets/config.example.toml");

/// Print an example `config.toml`.
///
/// Intended to be redirected into place:
/// ```sh
/// git-backup init > "$(git-backup home)/config.toml"
/// ```
///
/// # Errors
/// Returns an error if writing to `stdout` fails.
pub fn cmd_init() -> Result<()> {
    io::stdout().write_all(EXAMPLE.as_bytes())?;
    Ok(())
}
