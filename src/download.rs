//! HTTP transport: a bounded-retry fetch over `reqwest::blocking`, tuned
//! for a synchronous, single-shot updater rather than a long-running
//! resumable downloader.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use rand::Rng;
use reqwest::blocking::Client;

use crate::error::{Result, UpdaterError};

const HTTP_CONN_TIMEOUT: Duration = Duration::from_secs(20);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);
const MAX_DOWNLOAD_RETRY: u32 = 5;
const RETRY_INTERVAL_MSEC: u64 = 1000;

pub fn build_client() -> anyhow::Result<Client> {
    Client::builder()
        .connect_timeout(HTTP_CONN_TIMEOUT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("building HTTP client")
}

/// Retries `func` up to `max_tries` times, sleeping `interval` between
/// attempts, returning the last error if every attempt fails.
pub fn retry_loop_with_interval<F, T>(mut func: F, max_tries: u32, interval: Duration) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
{
    let mut tries = 0;
    loop {
        match func() {
            Ok(value) => return Ok(value),
            Err(err) => {
                tries += 1;
                if tries >= max_tries {
                    return Err(err);
                }
                std::thread::sleep(interval);
            }
        }
    }
}

/// Retries `func` up to `max_tries` times with the updater's standard
/// one-second backoff.
pub fn retry_loop<F, T>(func: F, max_tries: u32) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
{
    retry_loop_with_interval(func, max_tries, Duration::from_millis(RETRY_INTERVAL_MSEC))
}

/// Appends an 11-character cache-busting query (`?` + 10 random uppercase
/// ASCII letters) to `url`.
pub fn with_cache_buster(url: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10).map(|_| (b'A' + rng.gen_range(0..26)) as char).collect();
    format!("{url}?{suffix}")
}

/// Fetches `url` to `dest`, retrying transient failures.
pub fn fetch_to_file(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let dest_display = dest.display().to_string();
    retry_loop(|| do_fetch(client, url, dest), MAX_DOWNLOAD_RETRY)
        .map_err(|source| UpdaterError::DownloadFailed { path: dest_display.clone(), source })
}

fn do_fetch(client: &Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    let busted_url = with_cache_buster(url);
    let mut response = client.get(&busted_url).send().context("sending GET request")?;
    if !response.status().is_success() {
        bail!("GET {busted_url} returned status {}", response.status());
    }
    let mut file = File::create(dest).context("creating destination file")?;
    response.copy_to(&mut file).context("copying response body to disk")?;
    Ok(())
}
