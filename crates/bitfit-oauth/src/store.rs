//! Durable single-record token storage.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{OAuthError, Result};
use crate::token::{self, TokenRecord};

/// Default token file name, relative to the working directory.
pub const TOKEN_FILE: &str = "tokens.json";

// ============================================================================
// TokenStore Trait
// ============================================================================

/// Persistence for exactly one [`TokenRecord`].
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Load the stored record.
    async fn load(&self) -> Result<TokenRecord>;

    /// Replace the stored record.
    async fn save(&self, record: &TokenRecord) -> Result<()>;

    /// Whether a record has been stored.
    async fn exists(&self) -> bool;
}

// ============================================================================
// FileTokenStore
// ============================================================================

/// JSON file storage. Saves go through a uniquely named temp file in the same
/// directory and a rename, so a concurrent reader sees either the old or the
/// new document and concurrent writers never share a temp file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `bytes` to a fresh temp file beside `path`, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".tokens")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| OAuthError::io(dir, e))?;
    let temp_path = temp.path().to_path_buf();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| OAuthError::io(&temp_path, e))?;
    }

    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| OAuthError::io(&temp_path, e))?;

    temp.persist(path).map_err(|e| OAuthError::io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<TokenRecord> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| OAuthError::io(&self.path, e))?;

        token::decode(&bytes).map_err(|e| match e {
            OAuthError::Decode(msg) => OAuthError::Decode(format!(
                "could not decode tokens at '{}': {}",
                self.path.display(),
                msg
            )),
            other => other,
        })
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OAuthError::io(parent, e))?;
        }

        let bytes = token::encode(record)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| OAuthError::Internal(format!("token write task failed: {}", e)))??;

        tracing::info!(path = %self.path.display(), "Tokens saved");
        Ok(())
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

// ============================================================================
// MemoryTokenStore (for testing)
// ============================================================================

/// In-memory store that counts writes.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<Option<TokenRecord>>,
    save_count: AtomicU32,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
            save_count: AtomicU32::new(0),
        }
    }

    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    pub async fn current(&self) -> Option<TokenRecord> {
        self.record.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<TokenRecord> {
        self.record.read().await.clone().ok_or_else(|| OAuthError::Io {
            path: "<memory>".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no stored tokens"),
        })
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.record.write().await = Some(record.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self) -> bool {
        self.record.read().await.is_some()
    }
}
