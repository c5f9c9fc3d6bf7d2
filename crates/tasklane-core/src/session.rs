use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// State that survives between runs: who is signed in, and the bearer
/// token when the backend issued one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: Option<String>) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }
}

/// Session storage injected into the gateway in place of ambient browser
/// storage.
pub trait SessionContext: Send + Sync {
    fn get(&self) -> Option<Credentials>;
    fn set(&self, credentials: Credentials);
    fn clear(&self);

    fn token(&self) -> Option<String> {
        self.get().and_then(|creds| creds.token)
    }
}

#[derive(Debug, Default)]
pub struct MemorySession {
    inner: RwLock<Option<Credentials>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

impl SessionContext for MemorySession {
    fn get(&self) -> Option<Credentials> {
        self.inner.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        *self.inner.write() = Some(credentials);
    }

    fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// JSON-file backed session. The file is read once on open and rewritten
/// atomically on every change; write failures are logged, not raised.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    cached: RwLock<Option<Credentials>>,
}

impl FileSession {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let cached = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if raw.trim().is_empty() {
                None
            } else {
                Some(
                    serde_json::from_str::<Credentials>(&raw)
                        .with_context(|| format!("failed parsing {}", path.display()))?,
                )
            }
        } else {
            None
        };

        debug!(
            file = %path.display(),
            signed_in = cached.is_some(),
            "opened session file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, credentials: Option<&Credentials>) -> anyhow::Result<()> {
        let Some(credentials) = credentials else {
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .with_context(|| format!("failed to remove {}", self.path.display()))?;
            }
            return Ok(());
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(credentials)?;
        writeln!(temp, "{serialized}")?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }
}

impl SessionContext for FileSession {
    fn get(&self) -> Option<Credentials> {
        self.cached.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        if let Err(err) = self.persist(Some(&credentials)) {
            warn!(file = %self.path.display(), error = %err, "failed to save session");
        }
        *self.cached.write() = Some(credentials);
    }

    fn clear(&self) {
        if let Err(err) = self.persist(None) {
            warn!(file = %self.path.display(), error = %err, "failed to clear session");
        }
        *self.cached.write() = None;
    }
}
