//! Error surface for the update engine.
//!
//! Modeled as a single `thiserror`-derived enum rather than the hand-written
//! `Display` impls the rest of this crate's ancestry favors, because several
//! variants below carry structured fields (expected/actual signatures, the
//! commit index a rollback started from) that read better through
//! `#[error("...")]` templates than through manual `write!` calls.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    #[error("another updater instance holds the lock at {0}")]
    LockHeld(PathBuf),

    #[error("failed to fetch manifest from {url}: {source}")]
    ManifestFetchFailed { url: String, #[source] source: anyhow::Error },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("manifest signature verification failed")]
    ManifestSignatureInvalid,

    #[error("failed to download {path}: {source}")]
    DownloadFailed { path: String, #[source] source: anyhow::Error },

    #[error("downloaded file {path} failed signature verification")]
    DownloadCorrupt { path: String },

    #[error("commit failed at entry {index} ({path}): {source}")]
    CommitFailed {
        index: usize,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the embedded public key is malformed: {0}")]
    InvalidPublicKey(String),

    #[error("filesystem operation failed")]
    Io(#[from] std::io::Error),
}
