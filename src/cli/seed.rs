//! Pre-seeding a password without connecting

use colored::Colorize;

use crate::config::{AppContext, CredentialRegistry};
use crate::crypto;
use crate::error::Result;
use crate::ssh;

use super::prompt_new_password;

/// Prompt for a password and append it for `alias` straight to the store file
pub fn run(ctx: &AppContext, alias: &str) -> Result<()> {
    // The alias must be connectable later
    ssh::parse_target_literal(alias)?;

    let password = prompt_new_password()?;
    seed(ctx, alias, &password)?;

    println!("{} Stored password for '{}'", "Success:".green().bold(), alias);
    Ok(())
}

fn seed(ctx: &AppContext, alias: &str, password: &secrecy::SecretString) -> Result<()> {
    use secrecy::ExposeSecret;

    let sealed = crypto::encrypt(password.expose_secret().as_bytes(), &ctx.key)?;
    CredentialRegistry::append_raw(alias, &sealed, &ctx.work_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tempfile::tempdir;

    #[test]
    fn test_seeded_password_is_readable_after_reopen() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::open(temp.path()).unwrap();

        seed(&ctx, "root@10.0.0.9:22", &SecretString::new("pw1".into())).unwrap();
        seed(&ctx, "root@10.0.0.9:22", &SecretString::new("pw2".into())).unwrap();
        drop(ctx);

        let ctx = AppContext::open(temp.path()).unwrap();
        assert_eq!(ctx.registry.len(), 1);

        let stored = ctx.registry.lookup("root@10.0.0.9:22").unwrap();
        assert_eq!(&*crypto::decrypt(stored, &ctx.key).unwrap(), b"pw2");
    }
}
