// src/fetch/mod.rs

//! Source fetching and integrity verification
//!
//! Downloads a formula's source archive into a digest-keyed cache and
//! verifies it against the declared SHA-256. A formula without a digest is
//! refused before any network activity; a cached artifact satisfies a fetch
//! without touching the transport at all.

mod transport;

pub use transport::{HttpTransport, SourceTransport};

use crate::digest;
use crate::error::{Error, Result};
use crate::formula::Formula;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches and verifies source archives
pub struct Fetcher {
    cache_dir: PathBuf,
    transport: Box<dyn SourceTransport>,
    max_attempts: u32,
    retry_base: Duration,
    show_progress: bool,
}

impl Fetcher {
    pub fn new(
        cache_dir: PathBuf,
        transport: Box<dyn SourceTransport>,
        max_attempts: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            cache_dir,
            transport,
            max_attempts,
            retry_base,
            show_progress: false,
        }
    }

    /// Draw a progress bar per download (hidden automatically off-terminal)
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, name: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg:<18} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(name.to_string());
        Some(bar)
    }

    /// Path an artifact with this digest occupies in the cache
    pub fn cached_path(&self, sha256: &str) -> PathBuf {
        self.cache_dir.join(sha256.to_lowercase())
    }

    /// Fetch the formula's source archive, returning the verified local path
    ///
    /// Cache hits are re-verified before being trusted; a corrupt cache
    /// entry is discarded and re-downloaded. Integrity mismatches on a fresh
    /// download are hard failures and never retried.
    pub fn fetch(&self, formula: &Formula) -> Result<PathBuf> {
        if formula.source.sha256.is_empty() {
            return Err(Error::MissingIntegrityDigest {
                formula: formula.name.clone(),
            });
        }

        let expected = formula.source.sha256.to_lowercase();
        let cached = self.cached_path(&expected);

        if cached.is_file() {
            let actual = digest::sha256_file(&cached)?;
            if digest::digests_match(&expected, &actual) {
                debug!("'{}': source cache hit ({expected})", formula.name);
                return Ok(cached);
            }
            warn!(
                "'{}': cached artifact is corrupt, re-downloading",
                formula.name
            );
            fs::remove_file(&cached)?;
        }

        fs::create_dir_all(&self.cache_dir)?;
        let tmp = self.cache_dir.join(format!("{expected}.part"));
        let bar = self.progress_bar(&formula.name);
        let downloaded = self.download_with_retry(formula, &tmp, bar.as_ref());
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }
        downloaded?;

        let actual = digest::sha256_file(&tmp)?;
        if !digest::digests_match(&expected, &actual) {
            // Never leave an unverified artifact behind
            let _ = fs::remove_file(&tmp);
            return Err(Error::IntegrityMismatch {
                formula: formula.name.clone(),
                expected,
                actual,
            });
        }

        fs::rename(&tmp, &cached)?;
        info!("'{}': fetched and verified {}", formula.name, cached.display());
        Ok(cached)
    }

    /// Download with bounded exponential backoff on transport errors
    fn download_with_retry(
        &self,
        formula: &Formula,
        dest: &Path,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let url = &formula.source.url;
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            if let Some(bar) = progress {
                bar.set_position(0);
            }
            match self.transport.download(url, dest, progress) {
                Ok(()) => return Ok(()),
                Err(Error::DownloadError(reason)) => {
                    warn!(
                        "'{}': download attempt {attempt}/{} failed: {reason}",
                        formula.name, self.max_attempts
                    );
                    last_reason = reason;
                    let _ = fs::remove_file(dest);
                    if attempt < self.max_attempts {
                        let delay = self.retry_base * 2u32.pow(attempt - 1);
                        thread::sleep(delay);
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(Error::FetchFailed {
            formula: formula.name.clone(),
            url: url.clone(),
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}
