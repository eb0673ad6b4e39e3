//! Keypair generation command.

use std::path::Path;

use anyhow::{Context, Result};

use crate::api::TransferApi;

/// Generate a keypair for the authenticated user and either print the
/// armored private key or write it to `output`. The key id goes into the
/// credentials file by hand if the user wants unattended downloads.
pub fn run_generate(api: &dyn TransferApi, description: &str, output: Option<&Path>) -> Result<()> {
    let keypair = api.generate_keypair(description)?;
    println!("Key id: {}", keypair.key_id);
    match output {
        Some(path) => {
            std::fs::write(path, &keypair.armored_key)
                .with_context(|| format!("write private key to {}", path.display()))?;
            println!("Private key written to {}", path.display());
        }
        None => println!("{}", keypair.armored_key),
    }
    Ok(())
}
