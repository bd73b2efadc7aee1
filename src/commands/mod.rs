//! Command implementations for the CLI

pub mod backtest;
pub mod download;
pub mod order;
pub mod sign;
pub mod status;
pub mod watch;

/// Section separator used in command output
pub(crate) fn banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

pub(crate) fn rule() {
    println!("{}", "=".repeat(60));
}
