//! The transaction executor: download, pre-commit cleanup, commit, rollback,
//! finalize. This is the state machine that owns the safety property that
//! either the whole new version lands or the previous one is left runnable.

use std::path::Path;

use reqwest::blocking::Client;

use crate::config::Config;
use crate::download::{self, build_client};
use crate::error::{Result, UpdaterError};
use crate::fs_ops::FsOps;
use crate::manifest::{self, CheckResult, ManifestEntry};
use crate::verify::SignatureVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Checking,
    Downloading,
    Committing,
    RollingBack,
    Finalized,
    Failed,
    UpToDate,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The new version was downloaded, committed, and finalized.
    Installed { version: u64 },
    /// `--do-not-install` stopped the transaction after staging.
    Staged { version: u64 },
    /// The installed version was already current, or nothing was left to do.
    UpToDate,
}

/// Drives one update transaction against a filesystem capability `T`.
pub struct TransactionExecutor<'a, T: FsOps> {
    config: &'a Config,
    fs: &'a T,
    client: Client,
    state: State,
}

impl<'a, T: FsOps> TransactionExecutor<'a, T> {
    pub fn new(config: &'a Config, fs: &'a T) -> anyhow::Result<Self> {
        Ok(TransactionExecutor { config, fs, client: build_client()?, state: State::Idle })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs one transaction: check, download, (unless `do_not_install`)
    /// commit and finalize.
    pub fn run(&mut self, do_not_install: bool) -> Result<Outcome> {
        self.state = State::Checking;
        let current_version = self.read_current_version();

        let body = self.fetch_manifest_body()?;
        let check = manifest::parse_and_verify(&body[..], current_version, &self.config.public_key, |path, sig| {
            self.already_installed(path, sig)
        })?;

        let (manifest, work_set) = match check {
            CheckResult::UpToDate => {
                self.state = State::UpToDate;
                log::info!("update not needed, installed version is current");
                return Ok(Outcome::UpToDate);
            }
            CheckResult::NothingToDo { version } => {
                self.state = State::UpToDate;
                log::info!("manifest version {version} has no files left to install");
                return Ok(Outcome::UpToDate);
            }
            CheckResult::Update { manifest, work_set } => (manifest, work_set),
        };

        self.download_phase(&work_set)?;

        if do_not_install {
            log::info!("--do-not-install set, leaving {} staged file(s) in place", work_set.len());
            return Ok(Outcome::Staged { version: manifest.version });
        }

        self.precommit_cleanup()?;
        self.commit_phase(&work_set)?;
        self.finalize_phase(manifest.version)?;

        log::info!("update successfully installed, version {}", manifest.version);
        Ok(Outcome::Installed { version: manifest.version })
    }

    fn fetch_manifest_body(&self) -> Result<Vec<u8>> {
        let url = self.config.manifest_url.clone();
        download::retry_loop(
            || -> anyhow::Result<Vec<u8>> {
                let busted = download::with_cache_buster(&url);
                let response = self.client.get(&busted).send()?;
                if !response.status().is_success() {
                    anyhow::bail!("GET {busted} returned status {}", response.status());
                }
                Ok(response.bytes()?.to_vec())
            },
            5,
        )
        .map_err(|source| UpdaterError::ManifestFetchFailed { url: self.config.manifest_url.clone(), source })
    }

    fn read_current_version(&self) -> u64 {
        self.fs
            .read_to_vec(&self.config.version_file())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    fn file_signature_matches(&self, path: &str, sig_b64: &str) -> bool {
        match self.fs.read_to_vec(path) {
            Ok(data) => {
                let mut verifier = SignatureVerifier::new(&self.config.public_key);
                verifier.add(&data);
                verifier.verify(sig_b64)
            }
            Err(_) => false,
        }
    }

    fn already_installed(&self, relative_path: &str, sig_b64: &str) -> bool {
        self.file_signature_matches(&join(&self.config.app_dir, relative_path), sig_b64)
    }

    fn already_downloaded(&self, relative_path: &str, sig_b64: &str) -> bool {
        self.file_signature_matches(&join(&self.config.update_dir(), relative_path), sig_b64)
    }

    fn download_phase(&mut self, work_set: &[ManifestEntry]) -> Result<()> {
        self.state = State::Downloading;
        for entry in work_set {
            let staging_path = join(&self.config.update_dir(), &entry.relative_path);
            ensure_parent(self.fs, &staging_path)?;

            if !self.already_downloaded(&entry.relative_path, &entry.signature_b64) {
                if self.fs.exists(&staging_path) {
                    self.fs.remove_file(&staging_path)?;
                }

                download::fetch_to_file(&self.client, &entry.url, Path::new(&staging_path))?;

                if !self.file_signature_matches(&staging_path, &entry.signature_b64) {
                    return Err(UpdaterError::DownloadCorrupt { path: staging_path });
                }
            }
            log::info!("staged {}", entry.relative_path);
        }
        Ok(())
    }

    fn precommit_cleanup(&self) -> Result<()> {
        self.fs.remove_tree(&self.config.backup_dir())?;
        Ok(())
    }

    fn commit_phase(&mut self, work_set: &[ManifestEntry]) -> Result<()> {
        self.state = State::Committing;
        for (index, entry) in work_set.iter().enumerate() {
            if let Err(err) = self.commit_one(entry) {
                self.rollback(work_set, index);
                self.state = State::Failed;
                return Err(UpdaterError::CommitFailed { index, path: entry.relative_path.clone(), source: err });
            }
        }
        Ok(())
    }

    fn commit_one(&self, entry: &ManifestEntry) -> std::io::Result<()> {
        let app_path = join(&self.config.app_dir, &entry.relative_path);
        let backup_path = join(&self.config.backup_dir(), &entry.relative_path);
        let staging_path = join(&self.config.update_dir(), &entry.relative_path);

        ensure_parent(self.fs, &backup_path)?;
        match self.fs.rename(&app_path, &backup_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        match self.fs.file_size(&staging_path) {
            Some(size) if size > 0 => {
                ensure_parent(self.fs, &app_path)?;
                if let Some(parent) = Path::new(&app_path).parent() {
                    apply_mega_permissions(self.fs, &parent.to_string_lossy());
                }
                self.fs.rename(&staging_path, &app_path)?;
                apply_mega_permissions(self.fs, &app_path);
            }
            _ => {
                // Zero-size or absent staged file: this entry is a
                // deletion, so app_path stays absent.
            }
        }
        Ok(())
    }

    /// Walks entries `failed_index..=0` in reverse, best-effort restoring
    /// each from backup. Errors here are swallowed: the state is already
    /// inconsistent and this is the recovery path, not a new transaction.
    fn rollback(&mut self, work_set: &[ManifestEntry], failed_index: usize) {
        self.state = State::RollingBack;
        for entry in work_set[..=failed_index].iter().rev() {
            let app_path = join(&self.config.app_dir, &entry.relative_path);
            let backup_path = join(&self.config.backup_dir(), &entry.relative_path);
            let staging_path = join(&self.config.update_dir(), &entry.relative_path);

            let _ = self.fs.rename(&app_path, &staging_path);
            let _ = self.fs.rename(&backup_path, &app_path);
        }
        log::warn!("rolled back {} entr{} after a commit failure", failed_index + 1, if failed_index == 0 { "y" } else { "ies" });
    }

    fn finalize_phase(&mut self, version: u64) -> Result<()> {
        self.fs.remove_tree(&self.config.update_dir())?;
        self.fs.write_bytes(&self.config.version_file(), format!("{version}\n").as_bytes())?;
        self.state = State::Finalized;
        Ok(())
    }
}

fn join(dir: &str, relative: &str) -> String {
    format!("{dir}/{relative}")
}

fn ensure_parent<T: FsOps>(fs: &T, path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs.mkdir_recursive(&parent.to_string_lossy())?;
    }
    Ok(())
}

/// The source's permission hook keys off a `mega-` substring in the file
/// name; whether that's deliberate or a historical shortcut is unclear, but
/// it is wire-compatible with the deployed fleet, so it stays exactly as is.
fn apply_mega_permissions<T: FsOps>(fs: &T, path: &str) {
    let is_mega_file = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains("mega-"))
        .unwrap_or(false);
    if is_mega_file {
        let _ = fs.set_executable(path);
    }
}
