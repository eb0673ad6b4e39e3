//! Command-line surface and drivers.
//!
//! Two entry styles over one handler layer: the menu-driven interactive
//! loop (default, no subcommand) and the flag-driven batch subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::{HttpTransferClient, TransferApi, UserInfo};
use crate::credentials::{self, Credentials};
use crate::keypair;
use crate::pipeline::{self, SendOptions};
use crate::prompt::{ConsolePrompt, Prompt};
use crate::resolve::resolve_package;
use crate::session::{Flow, SessionEngine, available_actions};

#[derive(Parser)]
#[command(name = "sendpack")]
#[command(about = "Assemble and send secure packages through a transfer service", version)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a credentials file.")]
    credentials: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Create, upload to, address and finalize a package in one pass")]
    Send(SendArgs),
    #[command(about = "List active packages, newest first, with their @N indices")]
    List,
    #[command(about = "Download every file of a package named by @N, id prefix or substring")]
    Download(DownloadArgs),
    #[command(about = "Delete a package named by @N, id prefix or substring")]
    Delete(DeleteArgs),
    #[command(name = "generate-keypair", about = "Generate a keypair for unattended use")]
    GenerateKeypair(KeypairArgs),
}

#[derive(clap::Args)]
struct SendArgs {
    #[arg(required = true, help = "Files or directories to upload; directories are zipped.")]
    files: Vec<PathBuf>,
    #[arg(
        long = "recipient",
        short = 'r',
        help = "Recipient email, repeatable. Defaults to yourself."
    )]
    recipients: Vec<String>,
    #[arg(long, conflicts_with = "message_file", help = "Message text to include.")]
    message: Option<String>,
    #[arg(long, help = "Read the message from a file.")]
    message_file: Option<PathBuf>,
}

#[derive(clap::Args)]
struct DownloadArgs {
    reference: String,
    #[arg(long, short = 'o', default_value = ".", help = "Directory to save files into.")]
    output: PathBuf,
}

#[derive(clap::Args)]
struct DeleteArgs {
    reference: String,
}

#[derive(clap::Args)]
struct KeypairArgs {
    #[arg(long, default_value = "sendpack CLI key")]
    description: String,
    #[arg(long, help = "Write the armored private key to this file instead of stdout.")]
    output: Option<PathBuf>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        init_tracing();
        let credentials = credentials::load(self.credentials.as_deref())?;
        match self.command {
            None => run_interactive(credentials),
            Some(Command::Send(args)) => {
                let (api, user) = authenticate(credentials)?;
                let options = SendOptions {
                    files: args.files,
                    recipients: args.recipients,
                    message: args.message,
                    message_file: args.message_file,
                };
                let link = pipeline::run_send(&api, &user, &options)?;
                println!("Secure link: {link}");
                Ok(())
            }
            Some(Command::List) => {
                let (api, _) = authenticate(credentials)?;
                run_list(&api)
            }
            Some(Command::Download(args)) => {
                let (api, _) = authenticate(credentials)?;
                run_download(&api, &args.reference, &args.output)
            }
            Some(Command::Delete(args)) => {
                let (api, _) = authenticate(credentials)?;
                run_delete(&api, &args.reference)
            }
            Some(Command::GenerateKeypair(args)) => {
                let (api, _) = authenticate(credentials)?;
                keypair::run_generate(&api, &args.description, args.output.as_deref())
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Batch authentication: credentials must already be on disk or in the
/// environment, there is no prompt to fall back to.
fn authenticate(credentials: Option<Credentials>) -> Result<(HttpTransferClient, UserInfo)> {
    let Some(credentials) = credentials else {
        bail!(
            "no credentials found; create {} or set SENDPACK_API_KEY and SENDPACK_API_SECRET",
            credentials::default_path()?.display()
        );
    };
    let client = HttpTransferClient::new(
        credentials.base_url().to_string(),
        credentials.api_key.clone(),
        credentials.api_secret.clone(),
    );
    client.verify_credentials()?;
    let user = client.get_user_info()?;
    Ok((client, user))
}

fn run_list(api: &dyn TransferApi) -> Result<()> {
    let packages = api.list_active_packages()?;
    if packages.is_empty() {
        println!("No active packages.");
        return Ok(());
    }
    for (index, package) in packages.iter().enumerate() {
        let message = if package.has_message { ", message" } else { "" };
        println!(
            "@{index}  {}  {}  {}  {} file(s){message}",
            package.package_id,
            package.created_at.format("%Y-%m-%d %H:%M"),
            package.state,
            package.files.len(),
        );
    }
    Ok(())
}

fn run_download(api: &dyn TransferApi, reference: &str, output: &std::path::Path) -> Result<()> {
    let packages = api.list_active_packages()?;
    let package_id = resolve_package(reference, &packages)?.to_string();
    let info = api.get_package_info(&package_id)?;
    if info.files.is_empty() {
        println!("Package {package_id} has no files.");
        return Ok(());
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("create output directory {}", output.display()))?;
    for file in &info.files {
        let dest = output.join(&file.name);
        api.download_file(&package_id, &file.file_id, &dest)?;
        println!("Saved {}", dest.display());
    }
    Ok(())
}

fn run_delete(api: &dyn TransferApi, reference: &str) -> Result<()> {
    let packages = api.list_active_packages()?;
    let package_id = resolve_package(reference, &packages)?.to_string();
    api.delete_package(&package_id)?;
    println!("Deleted package {package_id}");
    Ok(())
}

/// The menu loop. An outer pass handles login/quit; once authenticated, the
/// inner pass renders the legal action set and dispatches until logout or
/// quit.
fn run_interactive(credentials: Option<Credentials>) -> Result<()> {
    let mut prompt = ConsolePrompt::new();
    let mut stored = credentials;
    loop {
        match prompt.choice("What would you like to do?", &["Login", "Quit"])? {
            0 => {}
            _ => {
                println!("Bye!");
                return Ok(());
            }
        }
        // Stored credentials are good for one attempt; a rejection falls
        // back to prompting.
        let Some((api, user)) = attempt_login(&mut prompt, stored.take())? else {
            continue;
        };
        println!("Logged in. Welcome, {}!", user.first_name);

        let mut engine = SessionEngine::new(&api, user);
        engine.record_login();
        loop {
            let options = available_actions(&engine.session);
            let labels: Vec<&str> = options.values().copied().collect();
            let index = prompt.choice("What would you like to do?", &labels)?;
            let (action, _) = options
                .get_index(index)
                .ok_or_else(|| anyhow!("menu selection out of range"))?;
            match engine.dispatch(*action, &mut prompt)? {
                Flow::Continue => {}
                Flow::Logout => break,
                Flow::Quit => {
                    println!("Bye!");
                    return Ok(());
                }
            }
        }
    }
}

fn attempt_login(
    prompt: &mut dyn Prompt,
    stored: Option<Credentials>,
) -> Result<Option<(HttpTransferClient, UserInfo)>> {
    let credentials = match stored {
        Some(credentials) => credentials,
        None => {
            let api_key = prompt.secret("Enter api key:")?;
            let api_secret = prompt.secret("Enter api secret:")?;
            if api_key.is_empty() || api_secret.is_empty() {
                eprintln!("Invalid credentials");
                return Ok(None);
            }
            Credentials {
                api_key,
                api_secret,
                base_url: std::env::var("SENDPACK_BASE_URL").ok(),
                key_id: None,
                private_key: None,
            }
        }
    };
    let client = HttpTransferClient::new(
        credentials.base_url().to_string(),
        credentials.api_key.clone(),
        credentials.api_secret.clone(),
    );
    if let Err(err) = client.verify_credentials() {
        eprintln!("Invalid credentials: {err:#}");
        return Ok(None);
    }
    let user = match client.get_user_info() {
        Ok(user) => user,
        Err(err) => {
            eprintln!("Invalid credentials: {err:#}");
            return Ok(None);
        }
    };
    Ok(Some((client, user)))
}
