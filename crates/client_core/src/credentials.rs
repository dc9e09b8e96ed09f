//! Persistent slot for the session token.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};

pub const TOKEN_KEY: &str = "token";

/// Key-value slot that outlives the controller. The token stored under
/// [`TOKEN_KEY`] is the only record of whether a session is active.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Result<Option<String>>;
    fn store_token(&self, token: &str) -> Result<()>;
    fn clear_token(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Result<Option<String>> {
        let slot = self
            .token
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn store_token(&self, token: &str) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// JSON object on disk, e.g. `{"token": "..."}`. Unknown keys are preserved.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read credentials '{}'", self.path.display())
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed credentials file '{}'", self.path.display()))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create credentials directory '{}'",
                    parent.display()
                )
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(entries)?;
        write_private(&tmp, &body)
            .with_context(|| format!("failed to write credentials '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace credentials '{}'", self.path.display()))?;
        Ok(())
    }
}

/// Writes `body` readable by the owner only; the file holds a bearer token.
fn write_private(path: &Path, body: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let mut file = options.open(path)?;
    // `mode` only applies on creation; a leftover tmp file keeps its bits.
    #[cfg(unix)]
    file.set_permissions(<fs::Permissions as std::os::unix::fs::PermissionsExt>::from_mode(0o600))?;
    file.write_all(body.as_bytes())?;
    file.sync_all()
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(TOKEN_KEY))
    }

    fn store_token(&self, token: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.write_entries(&entries)
    }

    fn clear_token(&self) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        env::temp_dir().join(format!("articles_client_{label}_{suffix}"))
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.token().expect("read"), None);
        store.store_token("abc").expect("store");
        assert_eq!(store.token().expect("read").as_deref(), Some("abc"));
        store.clear_token().expect("clear");
        assert_eq!(store.token().expect("read"), None);
    }

    #[test]
    fn file_store_survives_a_new_instance() {
        let root = temp_root("survive");
        let path = root.join("nested").join("credentials.json");

        FileCredentialStore::new(&path)
            .store_token("persisted-token")
            .expect("store");
        let reopened = FileCredentialStore::new(&path);
        assert_eq!(
            reopened.token().expect("read").as_deref(),
            Some("persisted-token")
        );

        reopened.clear_token().expect("clear");
        assert_eq!(FileCredentialStore::new(&path).token().expect("read"), None);

        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn file_store_keeps_unrelated_keys() {
        let root = temp_root("keys");
        fs::create_dir_all(&root).expect("root");
        let path = root.join("credentials.json");
        fs::write(&path, r#"{"theme":"dark","token":"old"}"#).expect("seed");

        let store = FileCredentialStore::new(&path);
        store.clear_token().expect("clear");
        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("\"theme\""));
        assert!(!raw.contains("\"token\""));

        fs::remove_dir_all(root).expect("cleanup");
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let root = temp_root("private");
        fs::create_dir_all(&root).expect("root");
        let path = root.join("credentials.json");
        fs::write(root.join("credentials.json.tmp"), "{}").expect("stale tmp");

        FileCredentialStore::new(&path)
            .store_token("secret")
            .expect("store");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn missing_file_reads_as_logged_out() {
        let store = FileCredentialStore::new(temp_root("missing").join("none.json"));
        assert_eq!(store.token().expect("read"), None);
        store.clear_token().expect("clearing nothing is fine");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let root = temp_root("malformed");
        fs::create_dir_all(&root).expect("root");
        let path = root.join("credentials.json");
        fs::write(&path, "not json").expect("seed");

        let err = FileCredentialStore::new(&path)
            .token()
            .expect_err("must fail");
        assert!(err.to_string().contains("malformed credentials file"));

        fs::remove_dir_all(root).expect("cleanup");
    }
}
