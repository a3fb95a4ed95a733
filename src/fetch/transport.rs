// src/fetch/transport.rs

//! Source transport abstraction
//!
//! The fetcher talks to the network through this trait so tests can swap in
//! an in-memory transport and assert on exactly when downloads happen.

use crate::error::{Error, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Downloads a source archive URL to a local file
pub trait SourceTransport: Send + Sync {
    /// Download `url` into `dest`, overwriting any existing file
    fn download(&self, url: &str, dest: &Path, progress: Option<&ProgressBar>) -> Result<()>;
}

/// HTTP transport backed by a blocking reqwest client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("cellar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl SourceTransport for HttpTransport {
    fn download(&self, url: &str, dest: &Path, progress: Option<&ProgressBar>) -> Result<()> {
        debug!("downloading {url}");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        if let (Some(pb), Some(len)) = (progress, response.content_length()) {
            pb.set_length(len);
        }

        let mut file = File::create(dest)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| Error::DownloadError(format!("read from {url} failed: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            if let Some(pb) = progress {
                pb.inc(n as u64);
            }
        }
        file.flush()?;
        Ok(())
    }
}
