//! Session state machine for the interactive package workflow.
//!
//! A [`SessionEngine`] exists only while a user is authenticated. It owns
//! the mutable session state, computes the legal action menu for the current
//! state, and dispatches actions to handlers. Every handler that mutates
//! remote state pushes exactly one compensating action on success and
//! nothing on failure, so session state never diverges from what actually
//! happened remotely.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{PackageHandle, TransferApi, UserInfo};
use crate::archive;
use crate::progress::{ConsoleProgressBar, ProgressSink};
use crate::prompt::Prompt;
use crate::undo::{CompensatingAction, CompensatingActionStack};

/// Attempts the upload prompt allows before giving up.
const FILE_PROMPT_ATTEMPTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Logout,
    CreatePackage,
    UploadFile,
    AddRecipients,
    AddYourselfAsRecipient,
    Finalize,
    Undo,
    Quit,
}

/// Dispatch of an action the menu did not offer. This is a contract
/// violation between menu and dispatch, so it terminates the run.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("action {0:?} is not currently available")]
pub struct InvalidAction(pub Action);

/// What the driver loop should do after a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Session ended; return to the login menu.
    Logout,
    Quit,
}

/// Mutable root of interactive state.
#[derive(Debug)]
pub struct Session {
    pub user: UserInfo,
    pub current_package: Option<PackageHandle>,
    pub added_recipients: BTreeSet<String>,
    pub undo: CompensatingActionStack,
}

impl Session {
    pub fn new(user: UserInfo) -> Self {
        Self {
            user,
            current_package: None,
            added_recipients: BTreeSet::new(),
            undo: CompensatingActionStack::new(),
        }
    }

    /// Drop everything tied to the open package.
    fn clear_current_package(&mut self) {
        self.current_package = None;
        self.added_recipients.clear();
    }

    /// Full reset on logout: pending reversals are intentionally discarded.
    fn reset_for_logout(&mut self) {
        self.undo.clear();
        self.clear_current_package();
    }
}

/// The legal actions for the current session state, in menu order. The
/// driver renders exactly this, so the ordering is part of the contract:
/// state-specific options, then Undo when available, then Logout and Quit.
pub fn available_actions(session: &Session) -> IndexMap<Action, &'static str> {
    let mut options = IndexMap::new();
    if session.current_package.is_some() {
        options.insert(Action::UploadFile, "Upload file");
        options.insert(Action::AddRecipients, "Add recipients");
        options.insert(Action::AddYourselfAsRecipient, "Add yourself as a recipient");
        options.insert(Action::Finalize, "Finalize package");
    } else {
        options.insert(Action::CreatePackage, "Create package");
    }
    if !session.undo.is_empty() {
        options.insert(Action::Undo, "Undo");
    }
    options.insert(Action::Logout, "Logout");
    options.insert(Action::Quit, "Quit");
    options
}

pub struct SessionEngine<'a> {
    api: &'a dyn TransferApi,
    pub session: Session,
}

impl<'a> SessionEngine<'a> {
    pub fn new(api: &'a dyn TransferApi, user: UserInfo) -> Self {
        Self {
            api,
            session: Session::new(user),
        }
    }

    /// Record a completed login so it can be undone (logout plus a return
    /// to the login menu). Batch mode never calls this.
    pub fn record_login(&mut self) {
        self.session.undo.push(CompensatingAction::Login);
    }

    /// Route one menu action. Remote and user-input failures are reported
    /// here and the loop continues; only contract violations and terminal
    /// I/O errors propagate.
    pub fn dispatch(&mut self, action: Action, prompt: &mut dyn Prompt) -> Result<Flow> {
        if !available_actions(&self.session).contains_key(&action) {
            return Err(InvalidAction(action).into());
        }
        match action {
            Action::CreatePackage => {
                match self.create_package() {
                    Ok(package_id) => println!("Created package {package_id}"),
                    Err(err) => report_failure("Failed to create package", &err),
                }
                Ok(Flow::Continue)
            }
            Action::UploadFile => {
                self.upload_interactive(prompt)?;
                Ok(Flow::Continue)
            }
            Action::AddRecipients => {
                let email = prompt.text("Enter recipient email:")?;
                self.add_recipient_reported(email.trim());
                Ok(Flow::Continue)
            }
            Action::AddYourselfAsRecipient => {
                let email = self.session.user.email.clone();
                self.add_recipient_reported(&email);
                Ok(Flow::Continue)
            }
            Action::Finalize => {
                match self.finalize() {
                    Ok(link) => println!("Secure link: {link}"),
                    Err(err) => report_failure("Failed to finalize package", &err),
                }
                Ok(Flow::Continue)
            }
            Action::Undo => Ok(self.undo()),
            Action::Logout => {
                self.session.reset_for_logout();
                println!("Logged out");
                Ok(Flow::Logout)
            }
            Action::Quit => Ok(Flow::Quit),
            Action::Login => Err(InvalidAction(action).into()),
        }
    }

    /// Create a remote package and make it current. The compensating action
    /// deletes it again.
    pub fn create_package(&mut self) -> Result<String> {
        if self.session.current_package.is_some() {
            bail!("a package is already open");
        }
        let handle = self.api.create_package()?;
        let package_id = handle.package_id.clone();
        info!(package_id = %package_id, "package created");
        self.session.undo.push(CompensatingAction::DeletePackage {
            package_id: package_id.clone(),
        });
        self.session.current_package = Some(handle);
        Ok(package_id)
    }

    /// Upload a file to the current package. Directories are staged as a
    /// zip first; the staging directory is removed on every exit path.
    /// Returns the name of the uploaded file.
    pub fn upload_path(&mut self, path: &Path, progress: &mut dyn ProgressSink) -> Result<String> {
        let (package_id, keycode, root_directory_id) = self.open_package()?;
        let staged;
        let upload_from = if path.is_dir() {
            staged = archive::stage_directory_zip(path)?;
            staged.path.as_path()
        } else {
            path
        };
        let name = upload_from
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("path {} has no file name", path.display()))?;
        let file = self
            .api
            .upload_file(&package_id, &keycode, upload_from, progress)?;
        info!(name = %name, package_id = %package_id, "file uploaded");
        self.session.undo.push(CompensatingAction::DeleteFile {
            package_id,
            root_directory_id,
            file_id: file.file_id,
            name: name.clone(),
        });
        Ok(name)
    }

    /// Add one recipient. Empty and duplicate addresses are reported
    /// no-ops; nothing is pushed for them.
    pub fn add_recipient(&mut self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            bail!("recipient cannot be empty");
        }
        if self.session.added_recipients.contains(email) {
            bail!("recipient '{email}' already added");
        }
        let (package_id, _, _) = self.open_package()?;
        let recipient = self.api.add_recipient(&package_id, email)?;
        info!(email, package_id = %package_id, "recipient added");
        self.session.added_recipients.insert(email.to_string());
        self.session.undo.push(CompensatingAction::RemoveRecipient {
            package_id,
            recipient_id: recipient.recipient_id,
            email: email.to_string(),
        });
        Ok(())
    }

    pub fn upload_message(&mut self, text: &str) -> Result<()> {
        let (package_id, keycode, _) = self.open_package()?;
        self.api.upload_message(&package_id, &keycode, text)?;
        info!(package_id = %package_id, "message uploaded");
        Ok(())
    }

    /// Seal the current package and return the shareable link. Finalizing
    /// ends reversibility: the stack is cleared and replaced with the
    /// single cannot-unfinalize sentinel.
    pub fn finalize(&mut self) -> Result<String> {
        let (package_id, keycode, _) = self.open_package()?;
        let link = self.api.finalize_package(&package_id, &keycode)?;
        info!(package_id = %package_id, "package finalized");
        self.session.undo.clear();
        self.session.undo.push(CompensatingAction::Unfinalizable);
        self.session.clear_current_package();
        Ok(link)
    }

    /// Pop and execute the most recent compensating action. An empty stack
    /// is a reported no-op. A reversal that fails is reported and never
    /// retried; it left the stack before execution.
    pub fn undo(&mut self) -> Flow {
        let Some(action) = self.session.undo.pop() else {
            println!("Nothing to undo.");
            return Flow::Continue;
        };
        debug!(action = %action.label(), "undoing previous action");
        match action {
            CompensatingAction::Login => {
                self.session.reset_for_logout();
                println!("Logged out");
                Flow::Logout
            }
            CompensatingAction::DeletePackage { package_id } => {
                match self.api.delete_package(&package_id) {
                    Ok(()) => {
                        self.session.clear_current_package();
                        println!("Deleted package {package_id}");
                    }
                    Err(err) => report_failure("Failed to delete package", &err),
                }
                Flow::Continue
            }
            CompensatingAction::DeleteFile {
                package_id,
                root_directory_id,
                file_id,
                name,
            } => {
                match self
                    .api
                    .delete_file(&package_id, &root_directory_id, &file_id)
                {
                    Ok(()) => println!("Removed file '{name}' from the package"),
                    Err(err) => report_failure("Failed to remove file", &err),
                }
                Flow::Continue
            }
            CompensatingAction::RemoveRecipient {
                package_id,
                recipient_id,
                email,
            } => {
                match self.api.remove_recipient(&package_id, &recipient_id) {
                    Ok(()) => {
                        self.session.added_recipients.remove(&email);
                        println!("Removed recipient '{email}'");
                    }
                    Err(err) => report_failure("Failed to remove recipient", &err),
                }
                Flow::Continue
            }
            CompensatingAction::Unfinalizable => {
                println!("A finalized package cannot be unfinalized.");
                Flow::Continue
            }
        }
    }

    fn add_recipient_reported(&mut self, email: &str) {
        match self.add_recipient(email) {
            Ok(()) => println!("Added recipient '{}'", email.trim()),
            Err(err) => report_failure("Failed to add recipient", &err),
        }
    }

    /// Bounded retry loop for the upload prompt: a bad path may be retried
    /// a few times, a declined directory confirmation cancels cleanly.
    fn upload_interactive(&mut self, prompt: &mut dyn Prompt) -> Result<()> {
        for attempt in 1..=FILE_PROMPT_ATTEMPTS {
            let path = match prompt.file_path("Enter the file location:") {
                Ok(path) => path,
                Err(err) => {
                    eprintln!("{err:#}");
                    if attempt == FILE_PROMPT_ATTEMPTS || !prompt.yes_no("Try a new file?")? {
                        return Ok(());
                    }
                    continue;
                }
            };
            if path.is_dir() {
                let confirmed = prompt.yes_no(&format!(
                    "'{}' is a directory. Upload it as a zip archive?",
                    path.display()
                ))?;
                if !confirmed {
                    eprintln!("Upload cancelled");
                    return Ok(());
                }
            }
            let mut bar = ConsoleProgressBar::new("File upload");
            match self.upload_path(&path, &mut bar) {
                Ok(name) => println!("File '{name}' uploaded"),
                Err(err) => report_failure("Failed to upload file", &err),
            }
            return Ok(());
        }
        Ok(())
    }

    fn open_package(&self) -> Result<(String, String, String)> {
        let handle = self
            .session
            .current_package
            .as_ref()
            .ok_or_else(|| anyhow!("no package is open"))?;
        Ok((
            handle.package_id.clone(),
            handle.keycode.clone(),
            handle.root_directory_id.clone(),
        ))
    }
}

fn report_failure(what: &str, err: &anyhow::Error) {
    warn!(error = %format!("{err:#}"), "{what}");
    eprintln!("{what}: {err:#}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(package_open: bool, undo_pending: bool) -> Session {
        let mut session = Session::new(UserInfo {
            email: "me@example.com".to_string(),
            first_name: "Me".to_string(),
        });
        if package_open {
            session.current_package = Some(PackageHandle {
                package_id: "pkg-1".to_string(),
                keycode: "kc".to_string(),
                root_directory_id: "root-1".to_string(),
            });
        }
        if undo_pending {
            session.undo.push(CompensatingAction::Login);
        }
        session
    }

    fn actions(session: &Session) -> Vec<Action> {
        available_actions(session).keys().copied().collect()
    }

    #[test]
    fn menu_without_package_or_undo() {
        assert_eq!(
            actions(&session(false, false)),
            vec![Action::CreatePackage, Action::Logout, Action::Quit]
        );
    }

    #[test]
    fn menu_without_package_with_undo() {
        assert_eq!(
            actions(&session(false, true)),
            vec![
                Action::CreatePackage,
                Action::Undo,
                Action::Logout,
                Action::Quit
            ]
        );
    }

    #[test]
    fn menu_with_package_without_undo() {
        assert_eq!(
            actions(&session(true, false)),
            vec![
                Action::UploadFile,
                Action::AddRecipients,
                Action::AddYourselfAsRecipient,
                Action::Finalize,
                Action::Logout,
                Action::Quit
            ]
        );
    }

    #[test]
    fn menu_with_package_and_undo() {
        assert_eq!(
            actions(&session(true, true)),
            vec![
                Action::UploadFile,
                Action::AddRecipients,
                Action::AddYourselfAsRecipient,
                Action::Finalize,
                Action::Undo,
                Action::Logout,
                Action::Quit
            ]
        );
    }

    #[test]
    fn menu_never_repeats_an_action() {
        let options = available_actions(&session(true, true));
        assert_eq!(options.len(), 7);
    }
}
