//! Shared scripted collaborators for the engine and pipeline tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};

use sendpack::api::{
    FileHandle, Keypair, PackageHandle, PackageSummary, RecipientHandle, TransferApi, UserInfo,
};
use sendpack::progress::ProgressSink;
use sendpack::prompt::Prompt;

pub fn test_user() -> UserInfo {
    UserInfo {
        email: "me@example.com".to_string(),
        first_name: "Me".to_string(),
    }
}

/// In-memory transfer service. Records every call in order and mirrors the
/// package state the calls imply.
#[derive(Default)]
pub struct MockApi {
    pub calls: RefCell<Vec<String>>,
    /// (file_id, name) currently in the open package.
    pub files: RefCell<Vec<(String, String)>>,
    /// Emails currently on the open package.
    pub recipients: RefCell<Vec<String>>,
    pub packages: Vec<PackageSummary>,
    /// Fail the Nth upload (1-based).
    pub fail_upload_at: Option<usize>,
    pub fail_add_recipient: bool,
    pub counter: RefCell<usize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    fn next_id(&self) -> usize {
        let mut counter = self.counter.borrow_mut();
        *counter += 1;
        *counter
    }
}

impl TransferApi for MockApi {
    fn verify_credentials(&self) -> Result<()> {
        self.record("verify_credentials");
        Ok(())
    }

    fn get_user_info(&self) -> Result<UserInfo> {
        self.record("get_user_info");
        Ok(test_user())
    }

    fn create_package(&self) -> Result<PackageHandle> {
        self.record("create_package");
        Ok(PackageHandle {
            package_id: "pkg-1".to_string(),
            keycode: "kc-test".to_string(),
            root_directory_id: "root-1".to_string(),
        })
    }

    fn delete_package(&self, package_id: &str) -> Result<()> {
        self.record(format!("delete_package {package_id}"));
        Ok(())
    }

    fn upload_file(
        &self,
        package_id: &str,
        _keycode: &str,
        path: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<FileHandle> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let upload_number = self
            .calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with("upload_file"))
            .count()
            + 1;
        self.record(format!("upload_file {package_id} {name}"));
        if self.fail_upload_at == Some(upload_number) {
            bail!("upload rejected");
        }
        let file_id = format!("f-{}", self.next_id());
        self.files.borrow_mut().push((file_id.clone(), name));
        progress.on_progress(1.0);
        progress.on_complete();
        Ok(FileHandle { file_id })
    }

    fn delete_file(&self, package_id: &str, _root_directory_id: &str, file_id: &str) -> Result<()> {
        self.record(format!("delete_file {package_id} {file_id}"));
        self.files.borrow_mut().retain(|(id, _)| id != file_id);
        Ok(())
    }

    fn add_recipient(&self, package_id: &str, email: &str) -> Result<RecipientHandle> {
        self.record(format!("add_recipient {package_id} {email}"));
        if self.fail_add_recipient {
            bail!("recipient rejected");
        }
        self.recipients.borrow_mut().push(email.to_string());
        Ok(RecipientHandle {
            recipient_id: format!("r-{}", self.next_id()),
        })
    }

    fn remove_recipient(&self, package_id: &str, recipient_id: &str) -> Result<()> {
        self.record(format!("remove_recipient {package_id} {recipient_id}"));
        self.recipients.borrow_mut().pop();
        Ok(())
    }

    fn upload_message(&self, package_id: &str, _keycode: &str, _text: &str) -> Result<()> {
        self.record(format!("upload_message {package_id}"));
        Ok(())
    }

    fn finalize_package(&self, package_id: &str, _keycode: &str) -> Result<String> {
        self.record(format!("finalize_package {package_id}"));
        Ok(format!("https://app.sendpack.io/receive/{package_id}"))
    }

    fn list_active_packages(&self) -> Result<Vec<PackageSummary>> {
        self.record("list_active_packages");
        Ok(self.packages.clone())
    }

    fn get_package_info(&self, package_id: &str) -> Result<PackageSummary> {
        self.record(format!("get_package_info {package_id}"));
        self.packages
            .iter()
            .find(|package| package.package_id == package_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown package {package_id}"))
    }

    fn download_file(&self, package_id: &str, file_id: &str, dest: &Path) -> Result<()> {
        self.record(format!("download_file {package_id} {file_id}"));
        std::fs::write(dest, b"data")?;
        Ok(())
    }

    fn generate_keypair(&self, description: &str) -> Result<Keypair> {
        self.record(format!("generate_keypair {description}"));
        Ok(Keypair {
            key_id: "key-1".to_string(),
            armored_key: "-----BEGIN TEST KEY-----".to_string(),
        })
    }
}

/// Prompt whose answers are queued up front.
#[derive(Default)]
pub struct ScriptedPrompt {
    pub texts: VecDeque<String>,
    pub secrets: VecDeque<String>,
    pub choices: VecDeque<usize>,
    pub yes_nos: VecDeque<bool>,
    pub paths: VecDeque<PathBuf>,
}

impl Prompt for ScriptedPrompt {
    fn text(&mut self, _message: &str) -> Result<String> {
        self.texts
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted text answer"))
    }

    fn secret(&mut self, _message: &str) -> Result<String> {
        self.secrets
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted secret answer"))
    }

    fn choice(&mut self, _message: &str, _options: &[&str]) -> Result<usize> {
        self.choices
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted choice answer"))
    }

    fn yes_no(&mut self, _message: &str) -> Result<bool> {
        self.yes_nos
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted yes/no answer"))
    }

    fn file_path(&mut self, _message: &str) -> Result<PathBuf> {
        let path = self
            .paths
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted path answer"))?;
        if !path.exists() {
            return Err(anyhow!("no file exists at '{}'", path.display()));
        }
        Ok(path)
    }
}
