//! Non-interactive create-and-send pipeline.
//!
//! One fixed pass through the same handlers the interactive state machine
//! uses: create package, upload every file, add every recipient (yourself
//! if none given), upload the message if any, finalize. The first failure
//! aborts the rest; there is no undo stack to consult because there is no
//! interactive recovery.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::api::{TransferApi, UserInfo};
use crate::progress::ConsoleProgressBar;
use crate::session::SessionEngine;

#[derive(Debug, Default)]
pub struct SendOptions {
    /// Files or directories to upload; directories are zipped without
    /// prompting in this mode.
    pub files: Vec<PathBuf>,
    /// Recipient emails. Empty means "send to yourself".
    pub recipients: Vec<String>,
    pub message: Option<String>,
    pub message_file: Option<PathBuf>,
}

impl SendOptions {
    fn message_text(&self) -> Result<Option<String>> {
        if let Some(message) = &self.message {
            return Ok(Some(message.clone()));
        }
        if let Some(path) = &self.message_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("unable to read message file {}", path.display()))?;
            return Ok(Some(text));
        }
        Ok(None)
    }
}

/// Run the whole pipeline and return the shareable link of the finalized
/// package.
pub fn run_send(api: &dyn TransferApi, user: &UserInfo, options: &SendOptions) -> Result<String> {
    if options.files.is_empty() {
        bail!("nothing to send: no files given");
    }
    let message = options.message_text()?;

    let mut engine = SessionEngine::new(api, user.clone());
    let package_id = engine.create_package().context("create package")?;
    info!(package_id = %package_id, "batch package created");

    for path in &options.files {
        let mut bar = ConsoleProgressBar::new(format!("Uploading {}", path.display()));
        let name = engine
            .upload_path(path, &mut bar)
            .with_context(|| format!("upload {}", path.display()))?;
        println!("Uploaded '{name}'");
    }

    if options.recipients.is_empty() {
        engine
            .add_recipient(&user.email)
            .context("add yourself as recipient")?;
        println!("Added recipient '{}'", user.email);
    } else {
        for email in &options.recipients {
            engine
                .add_recipient(email)
                .with_context(|| format!("add recipient '{email}'"))?;
            println!("Added recipient '{email}'");
        }
    }

    if let Some(text) = message {
        engine.upload_message(&text).context("upload message")?;
        println!("Message uploaded");
    }

    engine.finalize().context("finalize package")
}
