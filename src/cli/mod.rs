//! CLI command implementations

pub mod connect;
pub mod list;
pub mod seed;

use std::io::{self, BufRead, Write};

use colored::Colorize;
use secrecy::SecretString;

use crate::error::{EasySshError, Result};

/// Prompt for a secret with echo disabled
pub fn prompt_secret(prompt: &str) -> Result<SecretString> {
    let secret = rpassword::prompt_password(prompt)?;
    Ok(SecretString::new(secret))
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password() -> Result<SecretString> {
    loop {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;

        if password != confirm {
            println!("{} Passwords do not match", "Error:".red());
            continue;
        }

        return Ok(SecretString::new(password));
    }
}

/// Prompt for a registry index on stdin
pub fn prompt_index() -> Result<usize> {
    print!("Index: ");
    io::stdout().flush()?;

    read_index(&mut io::stdin().lock())
}

fn read_index(input: &mut impl BufRead) -> Result<usize> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(EasySshError::Cancelled);
    }

    let line = line.trim();
    line.parse()
        .map_err(|_| EasySshError::InvalidIndex(line.to_string()))
}
