//! Authentication commands: login, logout, status.

mod login;
mod logout;
mod status;

pub use login::run as login;
pub use logout::run as logout;
pub use status::run as status;

use std::io::{self, Write};

/// Print a prompt and read one trimmed line from stdin.
fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
