//! Manifest parsing and authentication.
//!
//! The manifest is a line-oriented text file, not XML or a binary framing --
//! a new version integer, a manifest-level signature, then a run of
//! `(url, relative_path, file_signature)` triples terminated by the first
//! empty `url` line. Every field's raw bytes feed the same running
//! signature context, in the order they appear on the wire.

use std::io::{BufRead, BufReader, Read};

use crate::error::{Result, UpdaterError};
use crate::verify::{PublicKey, SignatureVerifier};

/// Manifest lines longer than this are rejected outright; a bounded line
/// reader keeps a truncated or hostile manifest from forcing unbounded
/// buffering.
const MAX_LINE_LEN: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub url: String,
    pub relative_path: String,
    pub signature_b64: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub version: u64,
    pub manifest_signature_b64: String,
    pub entries: Vec<ManifestEntry>,
}

/// Outcome of parsing and authenticating a manifest against the currently
/// installed version and the already-installed files on disk.
pub enum CheckResult {
    /// `manifest.version <= current_version`.
    UpToDate,
    /// Newer version, but every entry is already installed.
    NothingToDo { version: u64 },
    /// Newer version with at least one file left to fetch.
    Update { manifest: Manifest, work_set: Vec<ManifestEntry> },
}

struct BoundedLineReader<R> {
    inner: BufReader<R>,
}

impl<R: Read> BoundedLineReader<R> {
    fn new(inner: R) -> Self {
        BoundedLineReader { inner: BufReader::new(inner) }
    }

    /// Reads one line, stripping the trailing `\n`/`\r\n`. Returns `None` at
    /// EOF with no bytes read.
    fn read_line_capped(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.inner.by_ref().take(MAX_LINE_LEN as u64 + 1).read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if buf.len() > MAX_LINE_LEN {
            return Err(UpdaterError::MalformedManifest(format!(
                "line exceeds {MAX_LINE_LEN} bytes"
            )));
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| UpdaterError::MalformedManifest("line is not valid UTF-8".into()))
    }
}

fn to_host_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.to_string()
    }
}

/// Parses and authenticates a manifest read from `reader`, filtering out
/// entries whose `already_installed` callback reports them as already in
/// place (their bytes still feed the signature, they are just dropped from
/// the returned work set).
pub fn parse_and_verify<R, F>(
    reader: R,
    current_version: u64,
    key: &PublicKey,
    mut already_installed: F,
) -> Result<CheckResult>
where
    R: Read,
    F: FnMut(&str, &str) -> bool,
{
    let mut lines = BoundedLineReader::new(reader);

    let version_line = non_empty_line(&mut lines, "version")?;
    let version: u64 = version_line
        .parse()
        .map_err(|_| UpdaterError::MalformedManifest("version is not an integer".into()))?;

    let manifest_signature_b64 = non_empty_line(&mut lines, "manifest signature")?;

    if version <= current_version {
        return Ok(CheckResult::UpToDate);
    }

    let mut verifier = SignatureVerifier::new(key);
    verifier.add(version_line.as_bytes());

    let mut entries = Vec::new();
    let mut work_set = Vec::new();

    loop {
        let url = match lines.read_line_capped()? {
            Some(s) if !s.is_empty() => s,
            _ => break,
        };
        let relative_path = non_empty_line(&mut lines, "relative path")?;
        let file_signature = non_empty_line(&mut lines, "file signature")?;

        verifier.add(url.as_bytes());
        verifier.add(relative_path.as_bytes());
        verifier.add(file_signature.as_bytes());

        let host_path = to_host_separators(&relative_path);
        let entry = ManifestEntry {
            url,
            relative_path: host_path.clone(),
            signature_b64: file_signature.clone(),
        };

        if !already_installed(&host_path, &file_signature) {
            work_set.push(entry.clone());
        }
        entries.push(entry);
    }

    if !verifier.verify(&manifest_signature_b64) {
        return Err(UpdaterError::ManifestSignatureInvalid);
    }

    if work_set.is_empty() {
        return Ok(CheckResult::NothingToDo { version });
    }

    Ok(CheckResult::Update {
        manifest: Manifest { version, manifest_signature_b64, entries },
        work_set,
    })
}

fn non_empty_line<R: Read>(lines: &mut BoundedLineReader<R>, what: &str) -> Result<String> {
    match lines.read_line_capped()? {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(UpdaterError::MalformedManifest(format!("missing {what}"))),
    }
}
