//! Transfer-service client: the abstract contract the session engine and
//! batch pipeline drive, plus the HTTP implementation.
//!
//! Every call that fails means "the operation did not happen" as far as the
//! caller is concerned; no compensating action is recorded for it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::progress::ProgressSink;

pub const DEFAULT_BASE_URL: &str = "https://app.sendpack.io/api/v2";

/// The package currently being assembled. Owned exclusively by one session;
/// the keycode is client-side key material and never leaves the process
/// except on calls that need it.
#[derive(Clone, Debug)]
pub struct PackageHandle {
    pub package_id: String,
    pub keycode: String,
    pub root_directory_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileHandle {
    #[serde(rename = "fileId")]
    pub file_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecipientHandle {
    #[serde(rename = "recipientId")]
    pub recipient_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PackageFile {
    #[serde(rename = "fileId")]
    pub file_id: String,
    pub name: String,
}

/// Read-only projection of a remote package, used for listing and for
/// resolving fuzzy references.
#[derive(Clone, Debug, Deserialize)]
pub struct PackageSummary {
    #[serde(rename = "packageId")]
    pub package_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<PackageFile>,
    #[serde(rename = "hasMessage", default)]
    pub has_message: bool,
    pub state: String,
}

#[cfg(test)]
impl PackageSummary {
    pub fn stub(package_id: &str) -> Self {
        Self {
            package_id: package_id.to_string(),
            created_at: Utc::now(),
            files: Vec::new(),
            has_message: false,
            state: "active".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Keypair {
    #[serde(rename = "keyId")]
    pub key_id: String,
    #[serde(rename = "armoredKey")]
    pub armored_key: String,
}

/// Contract between the orchestration core and the remote transfer service.
pub trait TransferApi {
    fn verify_credentials(&self) -> Result<()>;
    fn get_user_info(&self) -> Result<UserInfo>;
    fn create_package(&self) -> Result<PackageHandle>;
    fn delete_package(&self, package_id: &str) -> Result<()>;
    fn upload_file(
        &self,
        package_id: &str,
        keycode: &str,
        path: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<FileHandle>;
    fn delete_file(&self, package_id: &str, root_directory_id: &str, file_id: &str) -> Result<()>;
    fn add_recipient(&self, package_id: &str, email: &str) -> Result<RecipientHandle>;
    fn remove_recipient(&self, package_id: &str, recipient_id: &str) -> Result<()>;
    fn upload_message(&self, package_id: &str, keycode: &str, text: &str) -> Result<()>;
    fn finalize_package(&self, package_id: &str, keycode: &str) -> Result<String>;
    fn list_active_packages(&self) -> Result<Vec<PackageSummary>>;
    fn get_package_info(&self, package_id: &str) -> Result<PackageSummary>;
    fn download_file(&self, package_id: &str, file_id: &str, dest: &Path) -> Result<()>;
    fn generate_keypair(&self, description: &str) -> Result<Keypair>;
}

/// HTTP client for the transfer service.
pub struct HttpTransferClient {
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct CreatePackageResponse {
    #[serde(rename = "packageId")]
    package_id: String,
    #[serde(rename = "rootDirectoryId")]
    root_directory_id: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    #[serde(rename = "secureLink")]
    secure_link: String,
}

#[derive(Debug, Deserialize)]
struct PackageListResponse {
    packages: Vec<PackageSummary>,
}

#[derive(Debug, Serialize)]
struct RecipientRequest<'a> {
    email: &'a str,
}

impl HttpTransferClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth<Body>(&self, request: ureq::RequestBuilder<Body>) -> ureq::RequestBuilder<Body> {
        request
            .header("ss-api-key", &self.api_key)
            .header("ss-api-secret", &self.api_secret)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<T> {
    let body = response
        .body_mut()
        .read_to_string()
        .context("read response body")?;
    serde_json::from_str(&body).with_context(|| format!("unexpected response body: {body}"))
}

/// Fresh client-side key material for a new package.
fn generate_keycode() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Reader wrapper that reports upload progress as a fraction of the total.
struct ProgressReader<'a, R> {
    inner: R,
    sent: u64,
    total: u64,
    sink: &'a mut dyn ProgressSink,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.sent += read as u64;
        if self.total > 0 {
            self.sink.on_progress(self.sent as f64 / self.total as f64);
        }
        Ok(read)
    }
}

impl TransferApi for HttpTransferClient {
    fn verify_credentials(&self) -> Result<()> {
        debug!("GET /user/verify");
        self.auth(ureq::get(self.url("/user/verify")))
            .call()
            .context("credential verification rejected")?;
        Ok(())
    }

    fn get_user_info(&self) -> Result<UserInfo> {
        debug!("GET /user");
        let response = self.auth(ureq::get(self.url("/user"))).call().context("fetch user info")?;
        read_json(response)
    }

    fn create_package(&self) -> Result<PackageHandle> {
        debug!("PUT /package");
        let response = self.auth(ureq::put(self.url("/package")))
            .send_json(json!({}))
            .context("create package")?;
        let created: CreatePackageResponse = read_json(response)?;
        Ok(PackageHandle {
            package_id: created.package_id,
            keycode: generate_keycode(),
            root_directory_id: created.root_directory_id,
        })
    }

    fn delete_package(&self, package_id: &str) -> Result<()> {
        debug!(package_id, "DELETE /package");
        self.auth(ureq::delete(self.url(&format!("/package/{package_id}"))))
            .call()
            .with_context(|| format!("delete package {package_id}"))?;
        Ok(())
    }

    fn upload_file(
        &self,
        package_id: &str,
        keycode: &str,
        path: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<FileHandle> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("path {} has no file name", path.display()))?;
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let total = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        debug!(package_id, name = %name, total, "POST /package/.../file");

        let mut reader = ProgressReader {
            inner: file,
            sent: 0,
            total,
            sink: progress,
        };
        let response = self.auth(ureq::post(self.url(&format!("/package/{package_id}/file"))))
            .header("ss-file-name", &name)
            .header("ss-keycode", keycode)
            .header("Content-Type", "application/octet-stream")
            .send(ureq::SendBody::from_reader(&mut reader))
            .with_context(|| format!("upload {}", path.display()))?;
        let handle: FileHandle = read_json(response)?;
        reader.sink.on_complete();
        Ok(handle)
    }

    fn delete_file(&self, package_id: &str, root_directory_id: &str, file_id: &str) -> Result<()> {
        debug!(package_id, file_id, "DELETE /package/.../file");
        self.auth(ureq::delete(self.url(&format!(
            "/package/{package_id}/directory/{root_directory_id}/file/{file_id}"
        ))))
        .call()
        .with_context(|| format!("delete file {file_id} from package {package_id}"))?;
        Ok(())
    }

    fn add_recipient(&self, package_id: &str, email: &str) -> Result<RecipientHandle> {
        debug!(package_id, email, "PUT /package/.../recipient");
        let response = self.auth(ureq::put(self.url(&format!("/package/{package_id}/recipient"))))
            .send_json(RecipientRequest { email })
            .with_context(|| format!("add recipient '{email}'"))?;
        read_json(response)
    }

    fn remove_recipient(&self, package_id: &str, recipient_id: &str) -> Result<()> {
        debug!(package_id, recipient_id, "DELETE /package/.../recipient");
        self.auth(ureq::delete(self.url(&format!("/package/{package_id}/recipient/{recipient_id}"))))
            .call()
            .with_context(|| format!("remove recipient {recipient_id}"))?;
        Ok(())
    }

    fn upload_message(&self, package_id: &str, keycode: &str, text: &str) -> Result<()> {
        debug!(package_id, "PUT /package/.../message");
        self.auth(ureq::put(self.url(&format!("/package/{package_id}/message"))))
            .header("ss-keycode", keycode)
            .send_json(json!({ "message": text }))
            .context("upload message")?;
        Ok(())
    }

    fn finalize_package(&self, package_id: &str, keycode: &str) -> Result<String> {
        debug!(package_id, "POST /package/.../finalize");
        let response = self.auth(ureq::post(self.url(&format!("/package/{package_id}/finalize"))))
            .header("ss-keycode", keycode)
            .send_json(json!({}))
            .with_context(|| format!("finalize package {package_id}"))?;
        let finalized: FinalizeResponse = read_json(response)?;
        Ok(finalized.secure_link)
    }

    fn list_active_packages(&self) -> Result<Vec<PackageSummary>> {
        debug!("GET /package?state=active");
        let response = self.auth(ureq::get(self.url("/package?state=active")))
            .call()
            .context("list active packages")?;
        let list: PackageListResponse = read_json(response)?;
        Ok(list.packages)
    }

    fn get_package_info(&self, package_id: &str) -> Result<PackageSummary> {
        debug!(package_id, "GET /package/:id");
        let response = self.auth(ureq::get(self.url(&format!("/package/{package_id}"))))
            .call()
            .with_context(|| format!("fetch package {package_id}"))?;
        read_json(response)
    }

    fn download_file(&self, package_id: &str, file_id: &str, dest: &Path) -> Result<()> {
        debug!(package_id, file_id, "GET /package/.../file/:id");
        let mut response = self.auth(ureq::get(self.url(&format!("/package/{package_id}/file/{file_id}"))))
            .call()
            .with_context(|| format!("download file {file_id}"))?;
        let mut out =
            File::create(dest).with_context(|| format!("create {}", dest.display()))?;
        io::copy(&mut response.body_mut().as_reader(), &mut out)
            .with_context(|| format!("write {}", dest.display()))?;
        Ok(())
    }

    fn generate_keypair(&self, description: &str) -> Result<Keypair> {
        debug!(description, "PUT /public-key");
        let response = self.auth(ureq::put(self.url("/public-key")))
            .send_json(json!({ "description": description }))
            .context("generate keypair")?;
        read_json(response)
    }
}
