//! Command implementations for the `conduit` binary.

use colored::Colorize;

pub mod config;
pub mod rm;
pub mod setup;
pub mod start;
pub mod stop;

/// Normalize a user-supplied name list: trim whitespace and drop empty
/// tokens, so `--profiles "a, b,"` reads as `[a, b]`.
pub fn sanitize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print the full error chain in red and exit non-zero.
pub fn fatal(err: &anyhow::Error) -> ! {
    eprintln!("{} {:#}", "✗".red().bold(), err);
    std::process::exit(1);
}
