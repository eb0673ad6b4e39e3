//! Credentials file, read once at startup.
//!
//! Lookup order: explicit `--credentials` path, `SENDPACK_API_KEY` /
//! `SENDPACK_API_SECRET` env vars, `SENDPACK_CREDENTIALS` path override,
//! then the per-user config directory. Absence is not an error; interactive
//! mode falls back to prompting.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
}

impl Credentials {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

/// Load credentials, preferring `explicit` when given.
pub fn load(explicit: Option<&Path>) -> Result<Option<Credentials>> {
    if let Some(path) = explicit {
        return read_file(path).map(Some);
    }
    if let (Ok(api_key), Ok(api_secret)) = (
        std::env::var("SENDPACK_API_KEY"),
        std::env::var("SENDPACK_API_SECRET"),
    ) {
        return Ok(Some(Credentials {
            api_key,
            api_secret,
            base_url: std::env::var("SENDPACK_BASE_URL").ok(),
            key_id: None,
            private_key: None,
        }));
    }
    let path = default_path()?;
    if !path.exists() {
        return Ok(None);
    }
    read_file(&path).map(Some)
}

fn read_file(path: &Path) -> Result<Credentials> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read credentials file {}", path.display()))?;
    let credentials: Credentials = serde_yaml_bw::from_str(&contents)
        .with_context(|| format!("failed to parse credentials file {}", path.display()))?;
    Ok(credentials)
}

pub fn default_path() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("SENDPACK_CREDENTIALS") {
        return Ok(PathBuf::from(value));
    }
    let dirs = ProjectDirs::from("", "sendpack", "sendpack")
        .ok_or_else(|| anyhow::anyhow!("unable to determine config directory"))?;
    Ok(dirs.config_dir().join("credentials.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_credentials_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("credentials.yaml");
        std::fs::write(&path, "api_key: key-1\napi_secret: secret-1\n").unwrap();

        let credentials = read_file(&path).unwrap();
        assert_eq!(credentials.api_key, "key-1");
        assert_eq!(credentials.api_secret, "secret-1");
        assert_eq!(credentials.base_url(), DEFAULT_BASE_URL);
        assert!(credentials.key_id.is_none());
    }

    #[test]
    fn base_url_override_wins() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("credentials.yaml");
        std::fs::write(
            &path,
            "api_key: key-1\napi_secret: secret-1\nbase_url: https://transfer.internal/api\n",
        )
        .unwrap();

        let credentials = read_file(&path).unwrap();
        assert_eq!(credentials.base_url(), "https://transfer.internal/api");
    }

    #[test]
    fn unreadable_file_reports_the_path() {
        let missing = Path::new("/definitely/not/here.yaml");
        let err = read_file(missing).unwrap_err();
        assert!(format!("{err:#}").contains("not/here.yaml"));
    }
}
