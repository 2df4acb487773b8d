//! Listing of stored servers

use colored::Colorize;

use crate::config::CredentialRegistry;

/// Print `index. alias` for every stored server
pub fn print(registry: &CredentialRegistry) {
    for (index, alias) in registry.list() {
        println!("{}", format_entry(index, alias));
    }
}

fn format_entry(index: usize, alias: &str) -> String {
    format!("{}      {}", format!("{}.", index).cyan(), alias)
}
